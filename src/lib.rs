pub mod api;
pub mod config;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use config::Config;
use std::sync::Arc;

use crate::identity::{AuthEvents, AuthListener, IdentityService};
use crate::pipeline::Pipeline;

pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityService>,
    pub pipeline: Pipeline,
    pub events: AuthEvents,
    pub auth_listener: AuthListener,
}

impl AppState {
    pub fn new(config: Config, identity: Arc<dyn IdentityService>, events: AuthEvents) -> Self {
        let pipeline = Pipeline::standard(&config, identity.clone());
        let auth_listener = AuthListener::new(events.clone());
        Self {
            config,
            identity,
            pipeline,
            events,
            auth_listener,
        }
    }
}
