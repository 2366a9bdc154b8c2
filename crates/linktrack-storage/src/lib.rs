//! Storage backends for links and clicks.
//!
//! - [`InMemoryRepository`]: process-local, for tests and throwaway servers.
//! - [`SqliteRepository`]: single-file database, the default.
//! - [`MySqlRepository`]: shared database for multi-instance deployments.

pub mod memory;
pub mod mysql;
pub mod sqlite;

mod sql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use sqlite::SqliteRepository;
