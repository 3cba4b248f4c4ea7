//! Storage seams. Domain code only talks to these traits; `mongo` is the
//! production backend and `memory` backs the tests.

use crate::error::Result;
use crate::schemas::{
    Credit, CreditId, Expense, NewCredit, Participant, PaymentObligation, Project, ProjectId,
    ScheduleEntry, Task, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[cfg(test)]
pub mod memory;
pub mod mongo;

#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn find_participants(&self, ids: &[UserId]) -> Result<Vec<Participant>>;

    async fn find_participant_by_name(&self, name: &str) -> Result<Option<Participant>>;

    async fn list_participants(&self) -> Result<Vec<Participant>>;
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Persists the credit and its whole schedule atomically. Either both
    /// are visible afterwards or neither is.
    async fn insert_credit_with_schedule(
        &self,
        credit: NewCredit,
        schedule: Vec<ScheduleEntry>,
    ) -> Result<Credit>;

    async fn find_credit(&self, id: CreditId) -> Result<Option<Credit>>;

    async fn credits_for_participant(&self, user_id: UserId) -> Result<Vec<Credit>>;

    /// Insert-or-update of a single cell to `confirmed = true`, performed
    /// as one conditional write.
    async fn confirm_payment(
        &self,
        credit_id: CreditId,
        user_id: UserId,
        month: u32,
        year: i32,
    ) -> Result<PaymentObligation>;

    async fn payments_for_month(
        &self,
        credit_id: CreditId,
        month: u32,
        year: i32,
    ) -> Result<Vec<PaymentObligation>>;

    async fn payments_for_credit(&self, credit_id: CreditId) -> Result<Vec<PaymentObligation>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectFields {
    pub name: String,
    pub estimated_cost: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseFields {
    pub description: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskFields {
    pub project_id: ProjectId,
    pub name: String,
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, fields: ProjectFields, created_at: DateTime<Utc>)
        -> Result<Project>;

    async fn update_project(&self, id: ProjectId, fields: ProjectFields) -> Result<Option<Project>>;

    /// Removes the project with its expenses and tasks in one unit.
    /// Returns false when no such project exists.
    async fn delete_project(&self, id: ProjectId) -> Result<bool>;

    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn insert_expense(
        &self,
        project_id: ProjectId,
        fields: ExpenseFields,
        created_at: DateTime<Utc>,
    ) -> Result<Expense>;

    async fn update_expense(&self, id: i64, fields: ExpenseFields) -> Result<Option<Expense>>;

    async fn delete_expense(&self, id: i64) -> Result<bool>;

    /// Newest first.
    async fn expenses_for_project(&self, project_id: ProjectId) -> Result<Vec<Expense>>;

    async fn all_expenses(&self) -> Result<Vec<Expense>>;

    async fn insert_task(&self, fields: TaskFields) -> Result<Task>;

    async fn complete_task(&self, id: i64) -> Result<Option<Task>>;

    async fn delete_task(&self, id: i64) -> Result<bool>;

    async fn all_tasks(&self) -> Result<Vec<Task>>;
}

pub trait Store: ParticipantDirectory + CreditStore + ProjectStore {}

impl<T: ParticipantDirectory + CreditStore + ProjectStore> Store for T {}
