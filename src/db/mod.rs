//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through
//! `database.driver`. Repositories take a [`DynDatabasePool`] and branch on
//! [`DatabasePool::backend`] for dialect-specific SQL.
//!
//! ```ignore
//! use plaza::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
