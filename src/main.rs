mod classifier;
mod config;
mod error;
mod handlers;
mod models;
mod preprocess;

use std::io;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use env_logger::Env;

use crate::config::Config;
use crate::handlers::AppState;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let state = web::Data::new(AppState {
        model: classifier::load_model(&config.model_path),
        max_upload_bytes: config.max_upload_bytes,
    });

    log::info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
