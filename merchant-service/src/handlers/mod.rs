mod app;
mod health;

pub use app::{app, AppState};
pub use health::HealthResponse;
