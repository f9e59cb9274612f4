use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod pipeline;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool::connect_to_db;
use infrastructure::queue::rabbitmq::QueueService;
use infrastructure::storage::s3::StorageService;
use pipeline::DubbingPipeline;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting dubbing service...");

    let config = AppConfig::new().expect("Missing required environment variables");

    let db = connect_to_db(&config.database_url)
        .await
        .expect("Failed to connect to PostgreSQL");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");

    let queue = QueueService::new(&config.amqp_url, &config.queue_prefix)
        .await
        .expect("Failed to connect to RabbitMQ");

    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_public_url,
        &config.minio_access_key,
        &config.minio_secret_key,
    )
    .await;

    let pipeline = Arc::new(DubbingPipeline::from_config(&config, storage));

    let state = AppState::new(config.clone(), db, queue, pipeline);

    tokio::spawn(workers::dubbing::run(state.clone()));
    tokio::spawn(workers::reaper::run(state.clone()));

    let app = app::create_app(state).await;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await.unwrap();
}
