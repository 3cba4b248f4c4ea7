use crate::error::AppError;
use crate::projects::{self, ExpenseInput, ProjectInput, TaskInput};
use crate::schemas::ProjectId;
use crate::store::Store;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct IdQuery {
    id: Option<i64>,
}

impl IdQuery {
    fn required(&self, message: &str) -> Result<i64, AppError> {
        self.id.ok_or_else(|| AppError::validation(message))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditProject {
    id: Option<ProjectId>,
    #[serde(flatten)]
    fields: ProjectInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewExpense {
    project_id: Option<ProjectId>,
    #[serde(flatten)]
    fields: ExpenseInput,
}

#[derive(Deserialize)]
struct EditExpense {
    id: Option<i64>,
    #[serde(flatten)]
    fields: ExpenseInput,
}

#[get("/api/projects")]
async fn list_projects(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let today = Utc::now().date_naive();
    Ok(HttpResponse::Ok().json(projects::overview(store.get_ref(), today).await?))
}

#[post("/api/projects")]
async fn create_project(
    store: web::Data<dyn Store>,
    json: web::Json<ProjectInput>,
) -> Result<HttpResponse, AppError> {
    let project = projects::create_project(store.get_ref(), json.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Projet ajouté avec succès",
        "project": project
    })))
}

#[put("/api/projects/edit")]
async fn edit_project(
    store: web::Data<dyn Store>,
    json: web::Json<EditProject>,
) -> Result<HttpResponse, AppError> {
    let EditProject { id, fields } = json.into_inner();
    let id = id.ok_or_else(|| AppError::validation("Identifiant de projet invalide"))?;
    let project = projects::edit_project(store.get_ref(), id, fields).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[delete("/api/projects/delete")]
async fn delete_project(
    store: web::Data<dyn Store>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, AppError> {
    let id = query.required("Identifiant de projet invalide")?;
    projects::delete_project(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Projet, tâches, et dépenses supprimés avec succès"
    })))
}

#[get("/api/projects-with-tasks")]
async fn projects_with_tasks(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(projects::with_tasks(store.get_ref()).await?))
}

#[post("/api/expenses")]
async fn create_expense(
    store: web::Data<dyn Store>,
    json: web::Json<NewExpense>,
) -> Result<HttpResponse, AppError> {
    let NewExpense { project_id, fields } = json.into_inner();
    let project_id =
        project_id.ok_or_else(|| AppError::validation(crate::ledger::MISSING_FIELDS))?;
    let expense = projects::add_expense(store.get_ref(), project_id, fields, Utc::now()).await?;
    Ok(HttpResponse::Created().json(expense))
}

#[put("/api/expenses/edit")]
async fn edit_expense(
    store: web::Data<dyn Store>,
    json: web::Json<EditExpense>,
) -> Result<HttpResponse, AppError> {
    let EditExpense { id, fields } = json.into_inner();
    let id = id.ok_or_else(|| AppError::validation("Identifiant de dépense invalide"))?;
    Ok(HttpResponse::Ok().json(projects::edit_expense(store.get_ref(), id, fields).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseIdQuery {
    expense_id: Option<i64>,
}

#[patch("/api/expenses/update")]
async fn update_expense(
    store: web::Data<dyn Store>,
    query: web::Query<ExpenseIdQuery>,
    json: web::Json<ExpenseInput>,
) -> Result<HttpResponse, AppError> {
    let id = query
        .expense_id
        .ok_or_else(|| AppError::validation("Identifiant de dépense invalide"))?;
    let expense = projects::edit_expense(store.get_ref(), id, json.into_inner()).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[delete("/api/expenses/delete")]
async fn delete_expense(
    store: web::Data<dyn Store>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, AppError> {
    let id = query.required("Identifiant de dépense invalide")?;
    projects::delete_expense(store.get_ref(), id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/api/expenses/{project_id}")]
async fn expenses_for_project(
    store: web::Data<dyn Store>,
    project_id: web::Path<ProjectId>,
) -> Result<HttpResponse, AppError> {
    let expenses = projects::expenses_for(store.get_ref(), project_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(expenses))
}

#[post("/api/tasks")]
async fn create_task(
    store: web::Data<dyn Store>,
    json: web::Json<TaskInput>,
) -> Result<HttpResponse, AppError> {
    let task = projects::add_task(store.get_ref(), json.into_inner()).await?;
    Ok(HttpResponse::Created().json(task))
}

#[patch("/api/tasks/{task_id}/complete")]
async fn complete_task(
    store: web::Data<dyn Store>,
    task_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let task = projects::complete_task(store.get_ref(), task_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[delete("/api/tasks/{task_id}")]
async fn delete_task(
    store: web::Data<dyn Store>,
    task_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    projects::delete_task(store.get_ref(), task_id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
