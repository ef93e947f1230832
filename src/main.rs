#[macro_use]
extern crate lazy_static;

use std::sync::Arc;

use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    http::Method,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use log::info;

mod bills;
mod config;
mod db;
mod errors;
mod navigation;
mod new_bill;
mod routes;
mod session;
mod store;
mod structs;
mod utils;
mod views;

use config::Config;
use db::{SqliteStore, UPLOADS_ROUTE};
use errors::AppError;
use store::BillStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn BillStore>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("FATAL: {}", e);
        e
    })?;

    let db_pool = db::connect(&config.database_url).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let state = AppState {
        store: Arc::new(SqliteStore::new(db_pool, config.upload_dir.clone())),
    };
    let key = config.key();
    let upload_dir = config.upload_dir.clone();

    info!("Starting HTTP server on http://{}:{}/", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            .wrap(SessionMiddleware::new(CookieSessionStore::default(), key.clone()))
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .service(Files::new(UPLOADS_ROUTE, upload_dir.clone()))
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

/// Unknown pages get the error panel with a 404. Other methods are refused.
async fn default_handler(req_method: Method) -> Result<HttpResponse, AppError> {
    match req_method {
        Method::GET => Err(AppError::NotFound),
        _ => Ok(HttpResponse::MethodNotAllowed().finish()),
    }
}
