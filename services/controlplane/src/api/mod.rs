//! Control-plane HTTP API module.
//!
//! # Purpose
//! Shared error helpers, wire types, the OpenAPI document and the system
//! endpoints. Service handlers live next to their services
//! (`identity`, `sts`, `flags`, `provision`).
pub mod error;
pub mod openapi;
pub mod system;
pub mod types;
