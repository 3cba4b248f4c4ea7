use crate::error::{AppError, Result};
use crate::ledger::{parse_start_date, MISSING_FIELDS};
use crate::projection::project_progress;
use crate::schemas::{Expense, Project, ProjectId, Task};
use crate::store::{ExpenseFields, ProjectFields, ProjectStore, TaskFields};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub name: Option<String>,
    pub estimated_cost: Option<f64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    pub description: Option<String>,
    pub unit_price: Option<f64>,
    pub quantity: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub project_id: Option<ProjectId>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverview {
    #[serde(flatten)]
    pub project: Project,
    pub progress: f64,
    pub is_overdue: bool,
    pub total_expenses: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
}

fn required_text(value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(MISSING_FIELDS))
}

fn required_date(value: Option<String>) -> Result<NaiveDate> {
    let raw = required_text(value)?;
    parse_start_date(&raw).ok_or_else(|| AppError::validation("Date invalide"))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn project_fields(input: ProjectInput) -> Result<ProjectFields> {
    let name = required_text(input.name)?;
    let estimated_cost = input
        .estimated_cost
        .ok_or_else(|| AppError::validation(MISSING_FIELDS))?;
    if estimated_cost < 0.0 || !estimated_cost.is_finite() {
        return Err(AppError::validation("Le coût estimé doit être positif"));
    }
    let start_date = required_date(input.start_date)?;
    let end_date = required_date(input.end_date)?;
    if end_date < start_date {
        return Err(AppError::validation(
            "La date de fin doit suivre la date de début",
        ));
    }
    Ok(ProjectFields {
        name,
        estimated_cost,
        start_date,
        end_date,
        description: optional_text(input.description),
    })
}

/// Validates an expense and derives `total = unit_price × quantity`.
pub fn expense_fields(input: ExpenseInput) -> Result<ExpenseFields> {
    let description = required_text(input.description)?;
    let (Some(unit_price), Some(quantity)) = (input.unit_price, input.quantity) else {
        return Err(AppError::validation(MISSING_FIELDS));
    };
    if unit_price < 0.0 || !unit_price.is_finite() {
        return Err(AppError::validation("Le prix unitaire doit être positif"));
    }
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::validation("La quantité doit être au moins 1"))?;
    Ok(ExpenseFields {
        description,
        unit_price,
        quantity,
        total: unit_price * quantity as f64,
    })
}

async fn existing_project<S>(store: &S, id: ProjectId) -> Result<Project>
where
    S: ProjectStore + ?Sized,
{
    store
        .find_project(id)
        .await?
        .ok_or_else(|| AppError::not_found("Projet introuvable"))
}

pub async fn overview<S>(store: &S, today: NaiveDate) -> Result<Vec<ProjectOverview>>
where
    S: ProjectStore + ?Sized,
{
    let mut totals: HashMap<ProjectId, f64> = HashMap::new();
    for expense in store.all_expenses().await? {
        *totals.entry(expense.project_id).or_insert(0.0) += expense.total;
    }
    Ok(store
        .list_projects()
        .await?
        .into_iter()
        .map(|project| ProjectOverview {
            progress: project_progress(project.start_date, project.end_date, today),
            is_overdue: today > project.end_date,
            total_expenses: totals.get(&project.id).copied().unwrap_or(0.0),
            project,
        })
        .collect())
}

pub async fn with_tasks<S>(store: &S) -> Result<Vec<ProjectWithTasks>>
where
    S: ProjectStore + ?Sized,
{
    let mut by_project: HashMap<ProjectId, Vec<Task>> = HashMap::new();
    for task in store.all_tasks().await? {
        by_project.entry(task.project_id).or_default().push(task);
    }
    Ok(store
        .list_projects()
        .await?
        .into_iter()
        .map(|project| ProjectWithTasks {
            tasks: by_project.remove(&project.id).unwrap_or_default(),
            project,
        })
        .collect())
}

pub async fn create_project<S>(store: &S, input: ProjectInput, now: DateTime<Utc>) -> Result<Project>
where
    S: ProjectStore + ?Sized,
{
    let project = store.insert_project(project_fields(input)?, now).await?;
    log::info!("created project {} ({})", project.id, project.name);
    Ok(project)
}

pub async fn edit_project<S>(store: &S, id: ProjectId, input: ProjectInput) -> Result<Project>
where
    S: ProjectStore + ?Sized,
{
    store
        .update_project(id, project_fields(input)?)
        .await?
        .ok_or_else(|| AppError::not_found("Projet introuvable"))
}

pub async fn delete_project<S>(store: &S, id: ProjectId) -> Result<()>
where
    S: ProjectStore + ?Sized,
{
    if !store.delete_project(id).await? {
        return Err(AppError::not_found("Projet introuvable"));
    }
    log::info!("deleted project {} with its expenses and tasks", id);
    Ok(())
}

pub async fn add_expense<S>(
    store: &S,
    project_id: ProjectId,
    input: ExpenseInput,
    now: DateTime<Utc>,
) -> Result<Expense>
where
    S: ProjectStore + ?Sized,
{
    let fields = expense_fields(input)?;
    existing_project(store, project_id).await?;
    store.insert_expense(project_id, fields, now).await
}

pub async fn expenses_for<S>(store: &S, project_id: ProjectId) -> Result<Vec<Expense>>
where
    S: ProjectStore + ?Sized,
{
    existing_project(store, project_id).await?;
    store.expenses_for_project(project_id).await
}

pub async fn edit_expense<S>(store: &S, id: i64, input: ExpenseInput) -> Result<Expense>
where
    S: ProjectStore + ?Sized,
{
    store
        .update_expense(id, expense_fields(input)?)
        .await?
        .ok_or_else(|| AppError::not_found("Dépense introuvable"))
}

pub async fn delete_expense<S>(store: &S, id: i64) -> Result<()>
where
    S: ProjectStore + ?Sized,
{
    if store.delete_expense(id).await? {
        Ok(())
    } else {
        Err(AppError::not_found("Dépense introuvable"))
    }
}

pub async fn add_task<S>(store: &S, input: TaskInput) -> Result<Task>
where
    S: ProjectStore + ?Sized,
{
    let project_id = input
        .project_id
        .ok_or_else(|| AppError::validation(MISSING_FIELDS))?;
    let fields = TaskFields {
        project_id,
        name: required_text(input.name)?,
        date: required_date(input.date)?,
        description: optional_text(input.description),
    };
    existing_project(store, project_id).await?;
    store.insert_task(fields).await
}

pub async fn complete_task<S>(store: &S, id: i64) -> Result<Task>
where
    S: ProjectStore + ?Sized,
{
    store
        .complete_task(id)
        .await?
        .ok_or_else(|| AppError::not_found("Tâche introuvable"))
}

pub async fn delete_task<S>(store: &S, id: i64) -> Result<()>
where
    S: ProjectStore + ?Sized,
{
    if store.delete_task(id).await? {
        Ok(())
    } else {
        Err(AppError::not_found("Tâche introuvable"))
    }
}
