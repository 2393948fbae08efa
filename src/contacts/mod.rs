//! Contacts Module
//! Mission: Per-user contact lists behind the protected contacts route

pub mod api;
pub mod service;
pub mod store;

pub use service::{ContactError, ContactService};
pub use store::{Contact, ContactStore, SqliteContactStore};
