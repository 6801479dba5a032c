//! This module contains base types that are used across Squall.
use serde::{Deserialize, Serialize};

mod error;
mod utils;

pub use error::*;
pub use utils::*;

/// Identity of a table, carried by permits for diagnostics.
///
/// The semaphore never looks inside a schema; it only needs a stable
/// identity to group permits by, and the two names to print. Reads that
/// span no particular table (system maintenance, tests) carry no
/// `TableDesc` at all and show up as `*.*` in diagnostics.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{}.{}", db_name, table_name)]
pub struct TableDesc {
    db_name: String,
    table_name: String,
}

impl TableDesc {
    pub fn new(db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            table_name: table_name.into(),
        }
    }

    #[inline]
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}
