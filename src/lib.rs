//! Forro Backend Library
//!
//! Signup/login with JWT access tokens, registry-backed silent refresh,
//! and per-user contact lists. Exposed as a library for the binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod contacts;
pub mod error;
pub mod middleware;
