//! Row types for the `downloads` table.

use chrono::NaiveDateTime;

/// One append-only download event.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DownloadRecord {
    pub id: i64,
    pub name: String,
    pub ip_address: String,
    pub downloaded_at: Option<NaiveDateTime>,
}
