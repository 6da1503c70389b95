//! # IO Module
//!
//! Everything that crosses the process boundary.
//!
//! - **rest**: axum handlers for the `/api` surface
//! - **clients**: outbound HTTP clients (identity service, REST backend, Zoho Books)

pub mod clients;
pub mod rest;
