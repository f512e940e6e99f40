//! HTTP API handlers for the pairing service

pub mod health;
pub mod recipes;

pub use health::health_routes;
pub use recipes::recipe_routes;
