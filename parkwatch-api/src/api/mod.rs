//! HTTP API handlers for parkwatch-api

pub mod health;
pub mod ingest;
pub mod settings;
pub mod spots;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use settings::settings_routes;
pub use spots::spot_routes;
