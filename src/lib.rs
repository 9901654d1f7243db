use std::sync::Arc;

use config::Config;
use infrastructure::{drive::DriveClient, email::Mailer, storage::ObjectStorage};
use redis::Client as RedisClient;
use sqlx::PgPool;

pub mod cache;
pub mod common;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub storage: ObjectStorage,
    pub mailer: Mailer,
    pub drive: DriveClient,
}
