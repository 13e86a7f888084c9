use std::sync::Arc;

use crate::{config::AppConfig, store::CrmStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CrmStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn CrmStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
