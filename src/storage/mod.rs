mod repository;

pub use repository::*;

/// SQL schema applied when a database is initialised
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
