use std::sync::Arc;

use super::auth::TokenService;
use crate::config::AppConfig;
use crate::facade::StoreFacade;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreFacade,
    pub tokens: Arc<TokenService>,
    pub bcrypt_cost: u32,
    /// 500 responses carry error details unless running in production.
    pub expose_errors: bool,
}

impl AppState {
    pub fn new(store: StoreFacade, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            bcrypt_cost,
            expose_errors: true,
        }
    }

    pub fn from_config(store: StoreFacade, config: &AppConfig) -> Self {
        let mut state = Self::new(
            store,
            TokenService::new(&config.jwt_secret, config.jwt_ttl_days),
            config.bcrypt_cost,
        );
        state.expose_errors = !config.is_production();
        state
    }
}
