//! Marquee - Movie Catalogue API
//!
//! A JSON HTTP service for a movie catalogue. Every request passes a
//! per-client token-bucket rate limiter, list reads are validated against a
//! safelist of sort keys before they touch storage, and writes are guarded by
//! optimistic concurrency control on a per-record version.

pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod query;
pub mod ratelimit;
pub mod store;
pub mod validator;
