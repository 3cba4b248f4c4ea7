use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

mod auth;
mod config;
mod confirmation;
mod error;
mod handlers;
mod ledger;
mod logging;
mod projection;
mod projects;
mod schedule;
mod schemas;
mod store;

use auth::AuthSecret;
use config::Config;
use store::{mongo::MongoStore, Store};

fn cors(config: &Config) -> Cors {
    match &config.cors_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allow_any_header()
            .max_age(3600),
        None => Cors::permissive(),
    }
}

/// `cofinance sign-token <userId>` prints a bearer token for that user.
fn sign_token(config: &Config, raw_id: &str) -> anyhow::Result<()> {
    let user_id: schemas::UserId = raw_id
        .parse()
        .with_context(|| format!("invalid user id: {}", raw_id))?;
    let secret = AuthSecret::new(config.auth_secret.clone());
    println!("{}.{}", user_id, secret.sign(user_id));
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 && args[1] == "sign-token" {
        return sign_token(&config, &args[2]);
    }

    logging::init_logging(&config.log_level)?;
    log::info!("Using database {}", config.database_name);

    let mongo = MongoStore::connect(&config.mongodb_uri, &config.database_name)
        .await
        .context("failed to connect")?;
    mongo
        .ensure_indexes()
        .await
        .context("failed to create indexes")?;
    log::info!("Connected");

    let store: Arc<dyn Store> = Arc::new(mongo);
    let store = web::Data::from(store);
    let secret = web::Data::new(AuthSecret::new(config.auth_secret.clone()));

    log::info!("Listening on {}:{}", config.host, config.port);
    let server_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(&server_config))
            .app_data(store.clone())
            .app_data(secret.clone())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;
    Ok(())
}
