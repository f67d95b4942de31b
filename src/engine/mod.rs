//! Synchronous core of the diary engine. Every function takes a
//! `rusqlite::Connection` and does no I/O beyond it.

pub mod albums;
pub mod diary;
pub mod locations;
pub mod photos;
pub mod recommend;
pub mod trash;
pub mod types;

use rusqlite::{params, Connection};

use crate::error::DiaryResult;

/// Write an entry to the diary_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    entity_id: i64,
    details: Option<&serde_json::Value>,
) -> DiaryResult<()> {
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO diary_log (operation, entity_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, entity_id, details_json, crate::db::now_timestamp()],
    )?;
    Ok(())
}
