use std::sync::Arc;

use config::Config;
use location::LocationService;
use proximity::{AlertService, ProximityEngine};
use store::Backends;

pub mod background;
pub mod config;
pub mod error;
pub mod location;
pub mod membership;
pub mod middleware;
pub mod notify;
pub mod proximity;
pub mod recorder;
pub mod store;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub locations: Arc<LocationService>,
    pub alerts: Arc<AlertService>,
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> Self {
        let engine = Arc::new(ProximityEngine::new(&backends));
        let locations = Arc::new(LocationService::new(
            &backends,
            engine,
            config.background_policy(),
        ));
        let alerts = Arc::new(AlertService::new(&backends));

        Self {
            config,
            locations,
            alerts,
        }
    }
}
