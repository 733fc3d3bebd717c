//! # housectl-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - `POST /send` — publish an arbitrary `{topic, message}` through the
//!   broker session, so devices can be driven from plain HTTP clients
//! - `GET /api/status` — latest aggregate snapshot of every device
//! - `GET /health` — liveness check
//!
//! ## Dependency rule
//! Depends on `housectl-app` (for port traits) and `housectl-domain`
//! (for the status types it serves). Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
