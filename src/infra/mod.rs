//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod graphql;
pub mod http;
pub mod sdk;
pub mod telemetry;
pub mod tracking;
