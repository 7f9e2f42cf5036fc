use std::sync::Arc;

use crate::{
    config::Config,
    repositories::Repositories,
    services::{ControllerSettings, DashboardService, SessionController},
    utils::time::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repos: Repositories,
    pub controller: SessionController,
    pub dashboards: DashboardService,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Config, repos: Repositories, clock: Arc<dyn Clock>) -> Self {
        let controller = SessionController::new(
            &repos,
            clock.clone(),
            ControllerSettings::from_config(&config),
        );
        let dashboards = DashboardService::new(repos.clone(), controller.clone());
        Self {
            config,
            repos,
            controller,
            dashboards,
            clock,
        }
    }
}
