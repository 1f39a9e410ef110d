use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder, Result};
use chrono::Utc;
use log::{error, info};
use pitchside_engine::config::config::Config;
use pitchside_engine::controller;
use pitchside_engine::model::response::MessageResponse;
use pitchside_engine::repository::database::Database;
use pitchside_engine::service::ScoringService;
use pitchside_engine::AppState;
use std::time::Duration;

#[get("/health")]
async fn health_check() -> impl Responder {
    let response = MessageResponse {
        status: "success".to_string(),
        message: "Everything is working as expected".to_string(),
    };
    HttpResponse::Ok().json(response)
}

async fn not_found() -> Result<HttpResponse> {
    Ok(HttpResponse::NotFound().json(MessageResponse::failed("Resource not found")))
}

/// Expires unanswered challenges on a fixed interval for the life of the
/// process.
fn spawn_challenge_sweep(service: ScoringService<Database>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = service.expire_challenges(Utc::now()).await {
                error!("An error occurred in the challenge expiry sweep. The error: {:?}", err);
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("./log-config.yml", Default::default()).expect("Log config file not found.");
    let config = Config::init();
    let db = Database::new(&config).expect("Failed to create pool.");
    let service = ScoringService::from_config(db, &config);

    spawn_challenge_sweep(
        service.clone(),
        Duration::from_secs(config.challenge_sweep_interval_secs.max(1)),
    );

    let bind = (config.server_host.clone(), config.server_port);
    let app_data = web::Data::new(AppState { service, config });

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(5)
        .finish()
        .expect("Invalid rate limit configuration.");

    info!("Listening on {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .configure(controller::handler::config)
            .service(health_check)
            .default_service(web::route().to(not_found))
            .wrap(actix_web::middleware::Logger::default())
            .wrap(Governor::new(&governor_conf))
    })
    .bind(bind)?
    .run()
    .await
}
