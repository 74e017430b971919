pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::VapidKeys;
use crate::database::Database;
use crate::services::StatsService;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub keys: Arc<VapidKeys>,
    pub stats_service: Arc<StatsService>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(database: Arc<Database>, keys: Arc<VapidKeys>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stats_service: Arc::new(StatsService::new(database.clone())),
            database,
            keys,
            clock,
        }
    }
}
