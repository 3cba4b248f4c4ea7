use crate::error::AppError;
use crate::store::{ParticipantDirectory, Store};
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
struct NameQuery {
    name: Option<String>,
}

#[get("/api/users")]
async fn list_users(
    store: web::Data<dyn Store>,
    query: web::Query<NameQuery>,
) -> Result<HttpResponse, AppError> {
    match query.name.as_deref().map(str::trim) {
        Some(name) => match store.find_participant_by_name(name).await? {
            Some(user) => Ok(HttpResponse::Ok().json(user)),
            None => Err(AppError::not_found("Utilisateur introuvable")),
        },
        None => Ok(HttpResponse::Ok().json(store.list_participants().await?)),
    }
}
