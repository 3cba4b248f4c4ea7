use crate::schemas::{ScheduleEntry, UserId};
use chrono::{Datelike, NaiveDate};

/// Calendar (month, year) that lies `offset` months after
/// `start_month`/`start_year`. Months are 1-indexed.
pub fn month_at(start_month: u32, start_year: i32, offset: u32) -> (u32, i32) {
    let zero_based = u64::from(start_month.saturating_sub(1)) + u64::from(offset);
    let month = (zero_based % 12) as u32 + 1;
    let year = i64::from(start_year) + (zero_based / 12) as i64;
    (month, year.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// Every (month, year) a credit starting at `start_date` covers.
pub fn schedule_months(start_date: NaiveDate, months_to_repay: u32) -> Vec<(u32, i32)> {
    (0..months_to_repay)
        .map(|i| month_at(start_date.month(), start_date.year(), i))
        .collect()
}

/// One entry per participant per repayment month, ordered by month and
/// then by the order of `participant_ids`.
pub fn generate(
    start_date: NaiveDate,
    months_to_repay: u32,
    participant_ids: &[UserId],
) -> Vec<ScheduleEntry> {
    schedule_months(start_date, months_to_repay)
        .into_iter()
        .flat_map(|(month, year)| {
            participant_ids.iter().map(move |&user_id| ScheduleEntry {
                user_id,
                month,
                year,
            })
        })
        .collect()
}
