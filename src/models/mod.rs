//! Core data models for the bucket gateway.
//!
//! `bucket` and `object` map onto the local provider's SQLite tables via
//! `sqlx::FromRow`; `token` holds the bearer-token claims and wire shapes.

pub mod bucket;
pub mod object;
pub mod token;
