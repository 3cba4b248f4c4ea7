use crate::auth::Caller;
use crate::confirmation::{self, ConfirmPayment};
use crate::error::AppError;
use crate::schemas::CreditId;
use crate::store::Store;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery {
    credit_id: Option<CreditId>,
    month: Option<u32>,
    year: Option<i32>,
}

#[post("/api/payments/confirm")]
async fn confirm_payment(
    store: web::Data<dyn Store>,
    caller: Caller,
    json: web::Json<ConfirmPayment>,
) -> Result<HttpResponse, AppError> {
    let payment = confirmation::confirm(store.get_ref(), caller, json.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "payment": payment })))
}

#[get("/api/payments/status")]
async fn payment_status(
    store: web::Data<dyn Store>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
    let (Some(month), Some(year)) = (query.month, query.year) else {
        return Err(AppError::validation("Le mois et l'année sont requis"));
    };
    let credit_id = query
        .credit_id
        .ok_or_else(|| AppError::validation("L'identifiant du crédit est requis"))?;
    let statuses = confirmation::status_for(store.get_ref(), credit_id, month, year).await?;
    Ok(HttpResponse::Ok().json(statuses))
}
