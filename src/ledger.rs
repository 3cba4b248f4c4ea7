use crate::error::{AppError, Result};
use crate::schedule;
use crate::schemas::{Credit, CreditWithParticipants, NewCredit, Participant, UserId};
use crate::store::{CreditStore, ParticipantDirectory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Longest accepted repayment term, in months.
pub const MAX_MONTHS: u32 = 1200;

pub const MISSING_FIELDS: &str = "Champs requis manquants";

/// Body of a credit creation request. Every field is optional so that a
/// missing one can be answered with a readable message.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredit {
    pub amount: Option<f64>,
    pub months_to_repay: Option<i64>,
    pub start_date: Option<String>,
    pub participants_ids: Option<Vec<UserId>>,
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM` and RFC 3339 timestamps.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

pub fn monthly_payment(amount: f64, months_to_repay: u32) -> f64 {
    amount / months_to_repay as f64
}

fn dedup_preserving_order(ids: Vec<UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidCredit {
    pub amount: f64,
    pub months_to_repay: u32,
    pub start_date: NaiveDate,
    pub participant_ids: Vec<UserId>,
}

pub fn validate(request: CreateCredit) -> Result<ValidCredit> {
    let (Some(amount), Some(months), Some(start_date), Some(ids)) = (
        request.amount,
        request.months_to_repay,
        request.start_date,
        request.participants_ids,
    ) else {
        return Err(AppError::validation(MISSING_FIELDS));
    };
    if ids.is_empty() || start_date.trim().is_empty() {
        return Err(AppError::validation(MISSING_FIELDS));
    }
    if amount <= 0.0 || !amount.is_finite() {
        return Err(AppError::validation(
            "Le montant doit être supérieur à zéro",
        ));
    }
    if months < 1 {
        return Err(AppError::validation("Le nombre de mois doit être au moins 1"));
    }
    let months_to_repay = u32::try_from(months)
        .ok()
        .filter(|m| *m <= MAX_MONTHS)
        .ok_or_else(|| {
            AppError::validation(format!(
                "Le nombre de mois doit être compris entre 1 et {}",
                MAX_MONTHS
            ))
        })?;
    let start_date = parse_start_date(&start_date)
        .ok_or_else(|| AppError::validation("Date de début invalide"))?;
    Ok(ValidCredit {
        amount,
        months_to_repay,
        start_date,
        participant_ids: dedup_preserving_order(ids),
    })
}

/// Validates the request, checks every participant exists, then stores the
/// credit with its full schedule in one atomic write.
pub async fn create<S>(store: &S, request: CreateCredit, now: DateTime<Utc>) -> Result<Credit>
where
    S: CreditStore + ParticipantDirectory + ?Sized,
{
    let valid = validate(request)?;
    let known: HashSet<UserId> = store
        .find_participants(&valid.participant_ids)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if let Some(missing) = valid.participant_ids.iter().find(|id| !known.contains(id)) {
        return Err(AppError::not_found(format!(
            "Participant introuvable : {}",
            missing
        )));
    }

    let schedule = schedule::generate(
        valid.start_date,
        valid.months_to_repay,
        &valid.participant_ids,
    );
    let credit = NewCredit {
        amount: valid.amount,
        months_to_repay: valid.months_to_repay,
        start_date: valid.start_date,
        monthly_payment: monthly_payment(valid.amount, valid.months_to_repay),
        participant_ids: valid.participant_ids,
        created_at: now,
    };
    let credit = store.insert_credit_with_schedule(credit, schedule).await?;
    log::info!(
        "created credit {} for {} participants over {} months",
        credit.id,
        credit.participant_ids.len(),
        credit.months_to_repay
    );
    Ok(credit)
}

/// Joins each credit with the `{id, name}` of its participants, keeping the
/// credit's own participant order.
pub async fn with_participants<S>(
    store: &S,
    credits: Vec<Credit>,
) -> Result<Vec<CreditWithParticipants>>
where
    S: ParticipantDirectory + ?Sized,
{
    let ids: Vec<UserId> = credits
        .iter()
        .flat_map(|c| c.participant_ids.iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let directory: HashMap<UserId, Participant> = store
        .find_participants(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    Ok(credits
        .into_iter()
        .map(|credit| {
            let participants = credit
                .participant_ids
                .iter()
                .filter_map(|id| directory.get(id).cloned())
                .collect();
            CreditWithParticipants {
                credit,
                participants,
            }
        })
        .collect())
}

pub async fn list_for_participant<S>(
    store: &S,
    user_id: UserId,
) -> Result<Vec<CreditWithParticipants>>
where
    S: CreditStore + ParticipantDirectory + ?Sized,
{
    let credits = store.credits_for_participant(user_id).await?;
    with_participants(store, credits).await
}
