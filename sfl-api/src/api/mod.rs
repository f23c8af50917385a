//! HTTP API handlers for sfl-api

pub mod health;
pub mod impressions;

pub use health::health_routes;
pub use impressions::impressions_routes;
