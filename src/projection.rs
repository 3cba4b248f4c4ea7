use crate::schedule::schedule_months;
use crate::schemas::{Credit, Participant, PaymentObligation, UserId};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub const PAID_LABEL: &str = "Payé";
pub const UNPAID_LABEL: &str = "Non payé";

/// Calendar months between two dates, ignoring the day of month.
pub fn months_between(start: NaiveDate, now: NaiveDate) -> i64 {
    (now.year() as i64 - start.year() as i64) * 12 + (now.month() as i64 - start.month() as i64)
}

pub fn elapsed_months(start_date: NaiveDate, months_to_repay: u32, today: NaiveDate) -> u32 {
    months_between(start_date, today).clamp(0, months_to_repay as i64) as u32
}

pub fn paid_count(statuses: &[PaymentObligation]) -> usize {
    statuses.iter().filter(|s| s.confirmed).count()
}

pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0)
}

/// Share of one month's payment per participant, rounded down.
pub fn individual_payment(monthly_payment: f64, participants: usize) -> f64 {
    if participants == 0 {
        return 0.0;
    }
    (monthly_payment / participants as f64).floor()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatus {
    pub user_id: UserId,
    pub name: String,
    pub confirmed: bool,
    pub label: &'static str,
}

/// One row per participant; a participant with no stored row is unpaid.
pub fn participant_statuses(
    participants: &[Participant],
    statuses: &[PaymentObligation],
) -> Vec<ParticipantStatus> {
    participants
        .iter()
        .map(|p| {
            let confirmed = statuses
                .iter()
                .any(|s| s.user_id == p.id && s.confirmed);
            ParticipantStatus {
                user_id: p.id,
                name: p.name.clone(),
                confirmed,
                label: if confirmed { PAID_LABEL } else { UNPAID_LABEL },
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOption {
    pub month: u32,
    pub year: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub credit_id: i64,
    pub month: u32,
    pub year: i32,
    pub months_to_repay: u32,
    pub elapsed_months: u32,
    pub remaining_months: u32,
    pub time_progress: f64,
    pub monthly_payment: f64,
    pub individual_payment: f64,
    pub paid_count: usize,
    pub participant_count: usize,
    pub paid_ratio: f64,
    pub participants: Vec<ParticipantStatus>,
    pub available_months: Vec<MonthOption>,
}

pub fn summarize(
    credit: &Credit,
    participants: &[Participant],
    statuses: &[PaymentObligation],
    (month, year): (u32, i32),
    today: NaiveDate,
) -> CreditSummary {
    let elapsed = elapsed_months(credit.start_date, credit.months_to_repay, today);
    let participants = participant_statuses(participants, statuses);
    let paid = paid_count(statuses);
    CreditSummary {
        credit_id: credit.id,
        month,
        year,
        months_to_repay: credit.months_to_repay,
        elapsed_months: elapsed,
        remaining_months: credit.months_to_repay - elapsed,
        time_progress: ratio(elapsed as usize, credit.months_to_repay as usize),
        monthly_payment: credit.monthly_payment,
        individual_payment: individual_payment(credit.monthly_payment, participants.len()),
        paid_count: paid,
        participant_count: participants.len(),
        paid_ratio: ratio(paid, participants.len()),
        available_months: schedule_months(credit.start_date, credit.months_to_repay)
            .into_iter()
            .map(|(month, year)| MonthOption { month, year })
            .collect(),
        participants,
    }
}

/// Time-based completion of a project in percent, clamped to 0..=100.
pub fn project_progress(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> f64 {
    if today >= end {
        return 100.0;
    }
    if today <= start {
        return 0.0;
    }
    let total = (end - start).num_days() as f64;
    let done = (today - start).num_days() as f64;
    (done / total * 100.0).clamp(0.0, 100.0)
}
