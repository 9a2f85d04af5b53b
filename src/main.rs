use actix_cors::Cors;
use actix_web::{http, middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use std::io;
use std::sync::Arc;

use watch_history_backend::config::AppConfig;
use watch_history_backend::metrics::Metrics;
use watch_history_backend::store::{PostgresSessionStore, PostgresWatchHistoryStore};
use watch_history_backend::{handlers, scheduler, services, AppState};

fn startup_error<E>(context: &str, err: E) -> io::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, err)
}

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let db_pool = services::init_db_pool(&config)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;
    services::run_migrations(&db_pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let metrics = Arc::new(Metrics::new());
    let _scheduler = scheduler::start_scheduler(&config.scheduled_tasks, metrics.clone())
        .await
        .map_err(|e| startup_error("Failed to start scheduler", e))?;

    let bind_addr = (config.bind_host.clone(), config.bind_port);
    let max_body_bytes = config.max_body_bytes;
    let app_state = web::Data::new(AppState {
        watch_history: Arc::new(PostgresWatchHistoryStore::new(db_pool.clone())),
        sessions: Arc::new(PostgresSessionStore::new(db_pool)),
        metrics,
        config,
    });

    info!("Starting HTTP server on {}:{}", bind_addr.0, bind_addr.1);
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
            .supports_credentials();

        for origin in &app_state.config.cors_allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .configure(handlers::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
