//! Combines the per-module REST routers into the unified `/api` surface.

use std::sync::Arc;

use axum::Router;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::support::configure_support_routes())
        .merge(crate::kb::configure_help_routes())
        .merge(crate::admin::configure_admin_routes())
        .merge(crate::heatmap::configure_restaurant_routes())
}
