use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type CreditId = i64;
pub type ProjectId = i64;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
}

/// A shared loan. Immutable once stored; `monthly_payment` is derived at
/// creation and never recomputed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub id: CreditId,
    pub amount: f64,
    pub months_to_repay: u32,
    pub start_date: NaiveDate,
    pub monthly_payment: f64,
    pub participant_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A credit before the store has allocated its id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewCredit {
    pub amount: f64,
    pub months_to_repay: u32,
    pub start_date: NaiveDate,
    pub monthly_payment: f64,
    pub participant_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl NewCredit {
    pub fn with_id(self, id: CreditId) -> Credit {
        Credit {
            id,
            amount: self.amount,
            months_to_repay: self.months_to_repay,
            start_date: self.start_date,
            monthly_payment: self.monthly_payment,
            participant_ids: self.participant_ids,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditWithParticipants {
    #[serde(flatten)]
    pub credit: Credit,
    pub participants: Vec<Participant>,
}

/// One cell of a repayment schedule, keyed by (user, credit, month, year).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentObligation {
    pub credit_id: CreditId,
    pub user_id: UserId,
    pub month: u32,
    pub year: i32,
    pub confirmed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub user_id: UserId,
    pub month: u32,
    pub year: i32,
}

impl ScheduleEntry {
    pub fn pending(&self, credit_id: CreditId) -> PaymentObligation {
        PaymentObligation {
            credit_id,
            user_id: self.user_id,
            month: self.month,
            year: self.year,
            confirmed: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    #[serde(flatten)]
    pub payment: PaymentObligation,
    pub user: Option<Participant>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub estimated_cost: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i64,
    pub project_id: ProjectId,
    pub description: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub project_id: ProjectId,
    pub name: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub is_completed: bool,
}
