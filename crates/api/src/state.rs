use std::sync::Arc;

use crate::{config::Config, dispatch::Dispatcher, services::Notifier, stores::Stores};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Redis stores.
    pub stores: Stores,
    /// Chat command dispatcher, also used for login/logout notices.
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, notifier: Arc<dyn Notifier>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(&stores, notifier, config.clone()));
        Self {
            config,
            stores,
            dispatcher,
        }
    }
}
