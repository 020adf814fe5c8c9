//! Native checkout popup and fallback renderer.
//!
//! Each renderer validates the embedding `parentDomain`, resolves the live
//! smart-payment-buttons SDK version and answers with either the rendered
//! HTML document or a plain-text 400.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
