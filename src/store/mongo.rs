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
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client, ClientSession, Collection, Database, IndexModel,
};

const USERS: &str = "Users";
const CREDITS: &str = "Credits";
const PAYMENTS: &str = "Payments";
const PROJECTS: &str = "Projects";
const EXPENSES: &str = "Expenses";
const TASKS: &str = "Tasks";
const COUNTERS: &str = "Counters";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    is_duplicate_key_kind(err.kind.as_ref())
}

fn is_duplicate_key_kind(kind: &ErrorKind) -> bool {
    match kind {
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn after_upsert() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build()
}

fn after_update() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn sorted_by_id(direction: i32) -> FindOptions {
    FindOptions::builder().sort(doc! { "id": direction }).build()
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        Ok(MongoStore { client, db })
    }

    /// Creates the indexes the store relies on. The compound unique index
    /// on payments is what makes confirmation a single-row upsert.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        self.payments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "creditId": 1, "month": 1, "year": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.payments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "creditId": 1, "year": 1, "month": 1 })
                    .build(),
                None,
            )
            .await?;
        self.credits()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "participantIds": 1 })
                    .build(),
                None,
            )
            .await?;
        for name in [CREDITS, PROJECTS, EXPENSES, TASKS] {
            self.db
                .collection::<Document>(name)
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { "id": 1 })
                        .options(unique())
                        .build(),
                    None,
                )
                .await?;
        }
        Ok(())
    }

    fn users(&self) -> Collection<Participant> {
        self.db.collection(USERS)
    }

    fn credits(&self) -> Collection<Credit> {
        self.db.collection(CREDITS)
    }

    fn payments(&self) -> Collection<PaymentObligation> {
        self.db.collection(PAYMENTS)
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection(PROJECTS)
    }

    fn expenses(&self) -> Collection<Expense> {
        self.db.collection(EXPENSES)
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection(TASKS)
    }

    async fn next_id(&self, sequence: &str) -> Result<i64> {
        let counter = self
            .db
            .collection::<Document>(COUNTERS)
            .find_one_and_update(
                doc! { "_id": sequence },
                doc! { "$inc": { "seq": 1_i64 } },
                after_upsert(),
            )
            .await?
            .ok_or_else(|| AppError::Storage(format!("sequence {} unavailable", sequence)))?;
        Ok(counter.get_i64("seq")?)
    }

    async fn commit_or_abort(
        mut session: ClientSession,
        written: std::result::Result<(), mongodb::error::Error>,
    ) -> Result<()> {
        match written {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    log::warn!("failed to abort transaction: {}", abort_err);
                }
                Err(err.into())
            }
        }
    }

    async fn upsert_confirmed(
        &self,
        filter: Document,
    ) -> mongodb::error::Result<Option<PaymentObligation>> {
        self.payments()
            .find_one_and_update(
                filter,
                doc! { "$set": { "confirmed": true } },
                after_upsert(),
            )
            .await
    }
}

#[async_trait]
impl ParticipantDirectory for MongoStore {
    async fn find_participants(&self, ids: &[UserId]) -> Result<Vec<Participant>> {
        let cursor = self
            .users()
            .find(doc! { "id": { "$in": ids.to_vec() } }, sorted_by_id(1))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_participant_by_name(&self, name: &str) -> Result<Option<Participant>> {
        Ok(self.users().find_one(doc! { "name": name }, None).await?)
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        let cursor = self.users().find(None, sorted_by_id(1)).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl CreditStore for MongoStore {
    async fn insert_credit_with_schedule(
        &self,
        credit: NewCredit,
        schedule: Vec<ScheduleEntry>,
    ) -> Result<Credit> {
        let credit = credit.with_id(self.next_id(CREDITS).await?);
        let payments: Vec<PaymentObligation> =
            schedule.iter().map(|entry| entry.pending(credit.id)).collect();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let written = async {
            self.credits()
                .insert_one_with_session(&credit, None, &mut session)
                .await?;
            self.payments()
                .insert_many_with_session(&payments, None, &mut session)
                .await?;
            Ok::<(), mongodb::error::Error>(())
        }
        .await;
        Self::commit_or_abort(session, written).await?;
        Ok(credit)
    }

    async fn find_credit(&self, id: CreditId) -> Result<Option<Credit>> {
        Ok(self.credits().find_one(doc! { "id": id }, None).await?)
    }

    async fn credits_for_participant(&self, user_id: UserId) -> Result<Vec<Credit>> {
        let cursor = self
            .credits()
            .find(doc! { "participantIds": user_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn confirm_payment(
        &self,
        credit_id: CreditId,
        user_id: UserId,
        month: u32,
        year: i32,
    ) -> Result<PaymentObligation> {
        let filter = doc! {
            "userId": user_id,
            "creditId": credit_id,
            "month": i64::from(month),
            "year": year,
        };
        // Two concurrent upserts can both miss and race on the unique index;
        // the loser finds the winner's row on the second attempt.
        let payment = match self.upsert_confirmed(filter.clone()).await {
            Err(err) if is_duplicate_key(&err) => self.upsert_confirmed(filter).await?,
            other => other?,
        };
        payment.ok_or_else(|| AppError::Storage("upsert returned no document".to_string()))
    }

    async fn payments_for_month(
        &self,
        credit_id: CreditId,
        month: u32,
        year: i32,
    ) -> Result<Vec<PaymentObligation>> {
        let cursor = self
            .payments()
            .find(
                doc! { "creditId": credit_id, "month": i64::from(month), "year": year },
                None,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn payments_for_credit(&self, credit_id: CreditId) -> Result<Vec<PaymentObligation>> {
        let cursor = self
            .payments()
            .find(doc! { "creditId": credit_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

fn project_changes(fields: &ProjectFields) -> Result<Document> {
    Ok(doc! {
        "name": fields.name.as_str(),
        "estimatedCost": fields.estimated_cost,
        "startDate": bson::to_bson(&fields.start_date)?,
        "endDate": bson::to_bson(&fields.end_date)?,
        "description": fields.description.clone(),
    })
}

fn expense_changes(fields: &ExpenseFields) -> Document {
    doc! {
        "description": fields.description.as_str(),
        "unitPrice": fields.unit_price,
        "quantity": i64::from(fields.quantity),
        "total": fields.total,
    }
}

#[async_trait]
impl ProjectStore for MongoStore {
    async fn insert_project(
        &self,
        fields: ProjectFields,
        created_at: DateTime<Utc>,
    ) -> Result<Project> {
        let project = Project {
            id: self.next_id(PROJECTS).await?,
            name: fields.name,
            estimated_cost: fields.estimated_cost,
            start_date: fields.start_date,
            end_date: fields.end_date,
            description: fields.description,
            created_at,
        };
        self.projects().insert_one(&project, None).await?;
        Ok(project)
    }

    async fn update_project(&self, id: ProjectId, fields: ProjectFields) -> Result<Option<Project>> {
        Ok(self
            .projects()
            .find_one_and_update(
                doc! { "id": id },
                doc! { "$set": project_changes(&fields)? },
                after_update(),
            )
            .await?)
    }

    async fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let mut deleted = false;
        let written = async {
            self.expenses()
                .delete_many_with_session(doc! { "projectId": id }, None, &mut session)
                .await?;
            self.tasks()
                .delete_many_with_session(doc! { "projectId": id }, None, &mut session)
                .await?;
            let result = self
                .projects()
                .delete_one_with_session(doc! { "id": id }, None, &mut session)
                .await?;
            deleted = result.deleted_count > 0;
            Ok::<(), mongodb::error::Error>(())
        }
        .await;
        Self::commit_or_abort(session, written).await?;
        Ok(deleted)
    }

    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects().find_one(doc! { "id": id }, None).await?)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let cursor = self.projects().find(None, sorted_by_id(1)).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_expense(
        &self,
        project_id: ProjectId,
        fields: ExpenseFields,
        created_at: DateTime<Utc>,
    ) -> Result<Expense> {
        let expense = Expense {
            id: self.next_id(EXPENSES).await?,
            project_id,
            description: fields.description,
            unit_price: fields.unit_price,
            quantity: fields.quantity,
            total: fields.total,
            created_at,
        };
        self.expenses().insert_one(&expense, None).await?;
        Ok(expense)
    }

    async fn update_expense(&self, id: i64, fields: ExpenseFields) -> Result<Option<Expense>> {
        Ok(self
            .expenses()
            .find_one_and_update(
                doc! { "id": id },
                doc! { "$set": expense_changes(&fields) },
                after_update(),
            )
            .await?)
    }

    async fn delete_expense(&self, id: i64) -> Result<bool> {
        let result = self.expenses().delete_one(doc! { "id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn expenses_for_project(&self, project_id: ProjectId) -> Result<Vec<Expense>> {
        let cursor = self
            .expenses()
            .find(doc! { "projectId": project_id }, sorted_by_id(-1))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn all_expenses(&self) -> Result<Vec<Expense>> {
        let cursor = self.expenses().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_task(&self, fields: TaskFields) -> Result<Task> {
        let task = Task {
            id: self.next_id(TASKS).await?,
            project_id: fields.project_id,
            name: fields.name,
            date: fields.date,
            description: fields.description,
            is_completed: false,
        };
        self.tasks().insert_one(&task, None).await?;
        Ok(task)
    }

    async fn complete_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self
            .tasks()
            .find_one_and_update(
                doc! { "id": id },
                doc! { "$set": { "isCompleted": true } },
                after_update(),
            )
            .await?)
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let result = self.tasks().delete_one(doc! { "id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let cursor = self.tasks().find(None, sorted_by_id(1)).await?;
        Ok(cursor.try_collect().await?)
    }
}
