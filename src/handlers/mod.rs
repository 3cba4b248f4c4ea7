use crate::error::AppError;
use actix_web::{get, web, HttpResponse};

mod credits;
mod payments;
mod projects;
mod users;

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Backend is running")
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Requête invalide : {}", err)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Paramètres invalides : {}", err)).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(health)
        .service(users::list_users)
        .service(credits::create_credit)
        .service(credits::credits_for_user)
        .service(credits::credit_summary)
        .service(credits::credit_payments)
        .service(payments::confirm_payment)
        .service(payments::payment_status)
        .service(projects::list_projects)
        .service(projects::create_project)
        .service(projects::edit_project)
        .service(projects::delete_project)
        .service(projects::projects_with_tasks)
        .service(projects::create_expense)
        .service(projects::edit_expense)
        .service(projects::update_expense)
        .service(projects::delete_expense)
        .service(projects::expenses_for_project)
        .service(projects::create_task)
        .service(projects::complete_task)
        .service(projects::delete_task);
}
