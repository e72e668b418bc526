//! Application layer - Use cases and application services
//!
//! This module contains the services that drive deposit sessions, schedule
//! polling and publish settlements to the rest of the dashboard.

pub mod services;

pub use services::*;
