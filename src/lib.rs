pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use std::sync::Arc;

use crate::config::tunables::Tunables;
use crate::config::AppConfig;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub paseto_access_key: [u8; 32],
    pub tunables: Arc<Tunables>,
}

impl AppState {
    pub fn new(db: Db, config: &AppConfig) -> Self {
        Self {
            db,
            paseto_access_key: config.paseto_access_key,
            tunables: Arc::new(config.tunables.clone()),
        }
    }
}
