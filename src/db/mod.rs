//! Download counter store.
//!
//! - `model`: rows returned by the queries.
//! - `repo`: SQL-only functions over the `downloads` table.
//!
//! Catalog validation lives one layer up, in `crate::downloads`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::DownloadRecord;
