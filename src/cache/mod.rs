//! Namespaced field storage.
//!
//! This module contains the layer between callers and the whole-value store:
//! - [`key`]: Namespace, EntityKey and Scope derivation
//! - [`dictionary`]: The per-entity field dictionary
//! - [`ttl`]: Default vs explicit TTL resolution
//! - [`field_store`]: Read-modify-write field operations
//! - [`report`]: Failure reporting

pub mod dictionary;
pub mod field_store;
pub mod key;
pub mod report;
pub mod ttl;
