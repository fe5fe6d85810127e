mod health;
mod identity;

pub use health::{HealthResponse, health_check};
pub use identity::{WhoAmIResponse, whoami};
