use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::LlmProvider;
use crate::shared::utils::DbPool;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub llm_provider: Arc<dyn LlmProvider>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            llm_provider: Arc::clone(&self.llm_provider),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .field("llm_provider", &"Arc<dyn LlmProvider>")
            .finish()
    }
}
