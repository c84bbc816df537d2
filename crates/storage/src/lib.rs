pub mod db;
pub mod store;

pub use db::{create_db, create_memory_db, seed_default_categories, DbPool};
pub use store::SqliteStore;
