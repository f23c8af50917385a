//! sfl-api library - read-only HTTP API over the impressions store

use axum::Router;
use chrono::NaiveDate;
use sfl_common::time::LocalTime;
use sfl_common::TimeSeriesStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TimeSeriesStore>,
    /// Days between today and the most recent complete day in the store
    pub day_offset: u32,
    pub local: LocalTime,
    fixed_today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(store: Arc<dyn TimeSeriesStore>, day_offset: u32, local: LocalTime) -> Self {
        Self {
            store,
            day_offset,
            local,
            fixed_today: None,
        }
    }

    /// Pin "today" to a fixed date
    pub fn with_fixed_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| self.local.today())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .nest("/api/v1/impressions", api::impressions_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
