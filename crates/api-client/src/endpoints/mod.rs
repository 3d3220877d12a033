//! Endpoint-specific API implementations
//!
//! | Module | Backend route | Description |
//! |--------|---------------|-------------|
//! | `health` | `GET /health` | Connectivity probe outside the versioned API |

pub mod health;

pub use health::{HealthApi, HealthResponse, HealthStatus};
