// Feedline - post publication, timeline fan-out, engagement and notifications

// Core types and primitives
pub mod core;

// Infrastructure - database, ids, background work, request viewer
pub mod infrastructure;

// Domain records
pub mod models;

// Business logic
pub mod services;

// HTTP boundary
pub mod api;

// Application wiring
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
