//! Shared configuration, error and data types for ReviewHerald.

pub mod config;
pub mod error;
pub mod types;
