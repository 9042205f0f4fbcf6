pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::{
    attempt_listing_service::AttemptListingService,
    reset_service::{ResetPolicy, ResetService},
};
use sqlx::SqlitePool;

pub use routes::create_router;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub reset_service: ResetService,
    pub listing_service: AttemptListingService,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let reset_service = ResetService::new(pool.clone(), ResetPolicy::from_config(&config));
        let listing_service = AttemptListingService::new(pool.clone(), config.attempt_list_limit);

        Self {
            pool,
            config,
            reset_service,
            listing_service,
        }
    }
}
