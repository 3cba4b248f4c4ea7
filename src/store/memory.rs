use super::{
    CreditStore, ExpenseFields, ParticipantDirectory, ProjectFields, ProjectStore, TaskFields,
};
use crate::error::{AppError, Result};
use crate::schemas::{
    Credit, CreditId, Expense, NewCredit, Participant, PaymentObligation, Project, ProjectId,
    ScheduleEntry, Task, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    users: Vec<Participant>,
    credits: Vec<Credit>,
    payments: Vec<PaymentObligation>,
    projects: Vec<Project>,
    expenses: Vec<Expense>,
    tasks: Vec<Task>,
    last_id: i64,
    fail_writes: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(AppError::Storage("writes disabled".to_string()));
        }
        Ok(())
    }
}

/// Whole-state lock: every operation is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_users(users: &[(UserId, &str)]) -> Self {
        let mut store = MemoryStore::default();
        store.state.get_mut().users = users
            .iter()
            .map(|&(id, name)| Participant {
                id,
                name: name.to_string(),
            })
            .collect();
        store
    }

    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    pub async fn credit_count(&self) -> usize {
        self.state.lock().await.credits.len()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

fn same_cell(
    p: &PaymentObligation,
    credit_id: CreditId,
    user_id: UserId,
    month: u32,
    year: i32,
) -> bool {
    p.credit_id == credit_id && p.user_id == user_id && p.month == month && p.year == year
}

#[async_trait]
impl ParticipantDirectory for MemoryStore {
    async fn find_participants(&self, ids: &[UserId]) -> Result<Vec<Participant>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_participant_by_name(&self, name: &str) -> Result<Option<Participant>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.name == name).cloned())
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        Ok(self.state.lock().await.users.clone())
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn insert_credit_with_schedule(
        &self,
        credit: NewCredit,
        schedule: Vec<ScheduleEntry>,
    ) -> Result<Credit> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let id = state.next_id();
        let credit = credit.with_id(id);

        let mut seen = HashSet::new();
        if !schedule.iter().all(|entry| seen.insert(entry)) {
            return Err(AppError::Storage("duplicate key in payments".to_string()));
        }
        state
            .payments
            .extend(schedule.iter().map(|entry| entry.pending(id)));
        state.credits.push(credit.clone());
        Ok(credit)
    }

    async fn find_credit(&self, id: CreditId) -> Result<Option<Credit>> {
        let state = self.state.lock().await;
        Ok(state.credits.iter().find(|c| c.id == id).cloned())
    }

    async fn credits_for_participant(&self, user_id: UserId) -> Result<Vec<Credit>> {
        let state = self.state.lock().await;
        Ok(state
            .credits
            .iter()
            .filter(|c| c.participant_ids.contains(&user_id))
            .cloned()
            .collect())
    }

    async fn confirm_payment(
        &self,
        credit_id: CreditId,
        user_id: UserId,
        month: u32,
        year: i32,
    ) -> Result<PaymentObligation> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        if let Some(existing) = state
            .payments
            .iter_mut()
            .find(|p| same_cell(p, credit_id, user_id, month, year))
        {
            existing.confirmed = true;
            return Ok(existing.clone());
        }
        let payment = PaymentObligation {
            credit_id,
            user_id,
            month,
            year,
            confirmed: true,
        };
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn payments_for_month(
        &self,
        credit_id: CreditId,
        month: u32,
        year: i32,
    ) -> Result<Vec<PaymentObligation>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.credit_id == credit_id && p.month == month && p.year == year)
            .cloned()
            .collect())
    }

    async fn payments_for_credit(&self, credit_id: CreditId) -> Result<Vec<PaymentObligation>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.credit_id == credit_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(
        &self,
        fields: ProjectFields,
        created_at: DateTime<Utc>,
    ) -> Result<Project> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let project = Project {
            id: state.next_id(),
            name: fields.name,
            estimated_cost: fields.estimated_cost,
            start_date: fields.start_date,
            end_date: fields.end_date,
            description: fields.description,
            created_at,
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: ProjectId, fields: ProjectFields) -> Result<Option<Project>> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        Ok(state.projects.iter_mut().find(|p| p.id == id).map(|p| {
            p.name = fields.name;
            p.estimated_cost = fields.estimated_cost;
            p.start_date = fields.start_date;
            p.end_date = fields.end_date;
            p.description = fields.description;
            p.clone()
        }))
    }

    async fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        state.expenses.retain(|e| e.project_id != id);
        state.tasks.retain(|t| t.project_id != id);
        Ok(state.projects.len() < before)
    }

    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let state = self.state.lock().await;
        Ok(state.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.state.lock().await.projects.clone())
    }

    async fn insert_expense(
        &self,
        project_id: ProjectId,
        fields: ExpenseFields,
        created_at: DateTime<Utc>,
    ) -> Result<Expense> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let expense = Expense {
            id: state.next_id(),
            project_id,
            description: fields.description,
            unit_price: fields.unit_price,
            quantity: fields.quantity,
            total: fields.total,
            created_at,
        };
        state.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn update_expense(&self, id: i64, fields: ExpenseFields) -> Result<Option<Expense>> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        Ok(state.expenses.iter_mut().find(|e| e.id == id).map(|e| {
            e.description = fields.description;
            e.unit_price = fields.unit_price;
            e.quantity = fields.quantity;
            e.total = fields.total;
            e.clone()
        }))
    }

    async fn delete_expense(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let before = state.expenses.len();
        state.expenses.retain(|e| e.id != id);
        Ok(state.expenses.len() < before)
    }

    async fn expenses_for_project(&self, project_id: ProjectId) -> Result<Vec<Expense>> {
        let state = self.state.lock().await;
        let mut expenses: Vec<_> = state
            .expenses
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect();
        expenses.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(expenses)
    }

    async fn all_expenses(&self) -> Result<Vec<Expense>> {
        Ok(self.state.lock().await.expenses.clone())
    }

    async fn insert_task(&self, fields: TaskFields) -> Result<Task> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let task = Task {
            id: state.next_id(),
            project_id: fields.project_id,
            name: fields.name,
            date: fields.date,
            description: fields.description,
            is_completed: false,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn complete_task(&self, id: i64) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        Ok(state.tasks.iter_mut().find(|t| t.id == id).map(|t| {
            t.is_completed = true;
            t.clone()
        }))
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        Ok(state.tasks.len() < before)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.state.lock().await.tasks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_credit() -> NewCredit {
        NewCredit {
            amount: 300.0,
            months_to_repay: 3,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            monthly_payment: 100.0,
            participant_ids: vec![1],
            created_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn duplicate_schedule_cells_leave_nothing_behind() {
        let store = MemoryStore::with_users(&[(1, "Awa")]);
        let cell = ScheduleEntry {
            user_id: 1,
            month: 1,
            year: 2024,
        };
        let result = store
            .insert_credit_with_schedule(new_credit(), vec![cell.clone(), cell])
            .await;
        assert!(result.is_err());
        assert_eq!(store.credit_count().await, 0);
        assert_eq!(store.payment_count().await, 0);
    }

    #[actix_web::test]
    async fn deleting_a_project_removes_its_children() {
        let store = MemoryStore::default();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let project = store
            .insert_project(
                ProjectFields {
                    name: "Toiture".into(),
                    estimated_cost: 500.0,
                    start_date: today,
                    end_date: today,
                    description: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        store
            .insert_expense(
                project.id,
                ExpenseFields {
                    description: "Tuiles".into(),
                    unit_price: 2.0,
                    quantity: 10,
                    total: 20.0,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        store
            .insert_task(TaskFields {
                project_id: project.id,
                name: "Commander".into(),
                date: today,
                description: None,
            })
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.all_expenses().await.unwrap().is_empty());
        assert!(store.all_tasks().await.unwrap().is_empty());
        assert!(!store.delete_project(project.id).await.unwrap());
    }
}
