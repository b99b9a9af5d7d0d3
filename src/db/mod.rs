//! Database module: driver seam, statement templating and transactions.
//!
//! Layout:
//! - `provider.rs`: traits for connections and transactions
//! - `sqlx_any.rs`: `sqlx` any-driver implementation of those traits
//! - `template.rs`: statement splitting and placeholder rendering
//! - `transaction.rs`: commit-or-rollback execution of rendered statements
//! - `schema.rs`: built-in HANA statements

pub mod provider;
pub mod schema;
pub mod sqlx_any;
pub mod template;
pub mod transaction;

pub use provider::{ConnectionProvider, SqlConnection, SqlTransaction};
pub use sqlx_any::{SqlxConnection, SqlxProvider};
pub use template::{StatementSource, Substitutions, split_statements};
pub use transaction::Transaction;
