//! Persistent storage for console configuration.

pub mod config;
