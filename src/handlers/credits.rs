use crate::error::AppError;
use crate::ledger::{self, CreateCredit};
use crate::projection;
use crate::schemas::{CreditId, UserId};
use crate::store::{CreditStore, Store};
use actix_web::{get, post, web, HttpResponse};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<UserId>,
}

#[derive(Deserialize)]
struct MonthQuery {
    month: Option<u32>,
    year: Option<i32>,
}

#[post("/api/credits/create")]
async fn create_credit(
    store: web::Data<dyn Store>,
    json: web::Json<CreateCredit>,
) -> Result<HttpResponse, AppError> {
    let credit = ledger::create(store.get_ref(), json.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Created().json(json!({ "credit": credit })))
}

#[get("/api/credits/user")]
async fn credits_for_user(
    store: web::Data<dyn Store>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::validation("L'identifiant utilisateur est requis"))?;
    let credits = ledger::list_for_participant(store.get_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(credits))
}

#[get("/api/credits/{id}/summary")]
async fn credit_summary(
    store: web::Data<dyn Store>,
    id: web::Path<CreditId>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AppError> {
    let store = store.get_ref();
    let credit = store
        .find_credit(id.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Crédit introuvable"))?;
    let today = Utc::now().date_naive();
    let month = query.month.unwrap_or_else(|| today.month());
    let year = query.year.unwrap_or_else(|| today.year());
    crate::confirmation::check_month(month)?;

    let participants = ledger::with_participants(store, vec![credit.clone()])
        .await?
        .pop()
        .map(|c| c.participants)
        .unwrap_or_default();
    let statuses = store.payments_for_month(credit.id, month, year).await?;
    let summary = projection::summarize(&credit, &participants, &statuses, (month, year), today);
    Ok(HttpResponse::Ok().json(summary))
}

/// Every obligation of the credit, in schedule order.
#[get("/api/credits/{id}/payments")]
async fn credit_payments(
    store: web::Data<dyn Store>,
    id: web::Path<CreditId>,
) -> Result<HttpResponse, AppError> {
    let store = store.get_ref();
    let credit = store
        .find_credit(id.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Crédit introuvable"))?;
    let mut payments = store.payments_for_credit(credit.id).await?;
    let order = &credit.participant_ids;
    payments.sort_by_key(|p| {
        let rank = order.iter().position(|id| *id == p.user_id).unwrap_or(order.len());
        (p.year, p.month, rank)
    });
    Ok(HttpResponse::Ok().json(payments))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::{app, users};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[actix_web::test]
    async fn create_then_list_credit() {
        let store = Arc::new(users());
        let app = test::init_service(app(store.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/credits/create")
            .set_json(json!({
                "amount": 1200000,
                "monthsToRepay": 12,
                "startDate": "2024-01-01",
                "participantsIds": [1, 2, 3]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["credit"]["monthlyPayment"], json!(100000.0));
        assert_eq!(body["credit"]["startDate"], json!("2024-01-01"));
        assert_eq!(store.payment_count().await, 36);

        let req = test::TestRequest::get()
            .uri("/api/credits/user?userId=2")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let credits = body.as_array().unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0]["participants"][1], json!({ "id": 2, "name": "Bako" }));
    }

    #[actix_web::test]
    async fn missing_fields_answer_400_with_message() {
        let app = test::init_service(app(Arc::new(users()))).await;
        let req = test::TestRequest::post()
            .uri("/api/credits/create")
            .set_json(json!({ "amount": 1000, "monthsToRepay": 2 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("Champs requis manquants"));
    }

    #[actix_web::test]
    async fn unknown_participant_answers_404() {
        let app = test::init_service(app(Arc::new(users()))).await;
        let req = test::TestRequest::post()
            .uri("/api/credits/create")
            .set_json(json!({
                "amount": 1000,
                "monthsToRepay": 2,
                "startDate": "2024-01-01",
                "participantsIds": [1, 77]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn storage_failure_answers_500_without_details() {
        let store = Arc::new(users());
        store.fail_writes(true).await;
        let app = test::init_service(app(store)).await;
        let req = test::TestRequest::post()
            .uri("/api/credits/create")
            .set_json(json!({
                "amount": 1000,
                "monthsToRepay": 2,
                "startDate": "2024-01-01",
                "participantsIds": [1]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("Erreur interne du serveur"));
    }

    #[actix_web::test]
    async fn user_without_credits_gets_empty_array() {
        let app = test::init_service(app(Arc::new(users()))).await;
        let req = test::TestRequest::get()
            .uri("/api/credits/user?userId=3")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([]));

        let req = test::TestRequest::get().uri("/api/credits/user").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn summary_reports_month_status() {
        let store = Arc::new(users());
        let app = test::init_service(app(store)).await;
        let req = test::TestRequest::post()
            .uri("/api/credits/create")
            .set_json(json!({
                "amount": 900,
                "monthsToRepay": 3,
                "startDate": "2024-11-01",
                "participantsIds": [1, 2]
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["credit"]["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/credits/{}/summary?month=1&year=2025", id))
            .to_request();
        let summary: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary["paidCount"], json!(0));
        assert_eq!(summary["participantCount"], json!(2));
        assert_eq!(summary["individualPayment"], json!(150.0));
        assert_eq!(summary["participants"][0]["label"], json!("Non payé"));
        assert_eq!(
            summary["availableMonths"],
            json!([
                { "month": 11, "year": 2024 },
                { "month": 12, "year": 2024 },
                { "month": 1, "year": 2025 }
            ])
        );

        let req = test::TestRequest::get()
            .uri(&format!("/api/credits/{}/payments", id))
            .to_request();
        let payments: Value = test::call_and_read_body_json(&app, req).await;
        let cells: Vec<_> = payments
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["userId"].as_i64().unwrap(), p["month"].as_i64().unwrap()))
            .collect();
        assert_eq!(cells, vec![(1, 11), (2, 11), (1, 12), (2, 12), (1, 1), (2, 1)]);

        let req = test::TestRequest::get()
            .uri("/api/credits/999/summary")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
