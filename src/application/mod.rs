//! Application services layer: the native render pipeline and its ports.

pub mod error;
pub mod native;
pub mod ports;
pub mod query;
pub mod request;
pub mod response;
pub mod sdk;
