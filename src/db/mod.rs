//! Database connection management

pub mod context;

pub use context::DbContext;
