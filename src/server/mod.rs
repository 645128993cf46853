//! HTTP server exposing the cache and conversation dispatch.
//!
//! - [`api`]: Request/response types and route handlers

pub mod api;
