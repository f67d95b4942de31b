//! Soft delete, restore, and permanent purge of diaries.
//!
//! Soft delete only stamps `deleted_at`; album links survive so a restore puts
//! the diary straight back. Purge removes the diary, its photos and its album
//! links in one transaction and hands the photo URLs back for storage cleanup.
//! [`purge_expired_trash`] is the retention sweep; it is a pure function of the
//! store and `now`, and the schedule that drives it lives outside the engine.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::diary::get_diary;
use super::types::Diary;
use super::write_audit_log;
use crate::db;
use crate::error::{DiaryError, DiaryResult};

/// A diary removed by a purge, with the storage objects left to delete.
#[derive(Debug, Clone, Serialize)]
pub struct PurgedDiary {
    pub diary_id: i64,
    pub owner_id: i64,
    pub photo_urls: Vec<String>,
    pub unlinked_albums: usize,
}

/// A trashed diary past the retention window.
#[derive(Debug, Clone, Serialize)]
pub struct TrashCandidate {
    pub diary_id: i64,
    pub owner_id: i64,
    pub title: String,
    pub deleted_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub diary_id: i64,
    pub error: String,
}

/// Outcome of one retention sweep.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub purged: Vec<PurgedDiary>,
    pub failed: Vec<SweepFailure>,
}

/// Move a diary to the trash. Already-trashed diaries are returned unchanged.
pub fn soft_delete_diary(conn: &Connection, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
    let diary = get_diary(conn, owner_id, diary_id)?;
    if diary.is_deleted() {
        return Ok(diary);
    }

    let now = db::now_timestamp();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE diaries SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        params![now, diary_id],
    )?;
    write_audit_log(&tx, "soft_delete", diary_id, None)?;
    tx.commit()?;
    tracing::info!(owner_id, diary_id, "diary moved to trash");

    get_diary(conn, owner_id, diary_id)
}

/// Take a diary out of the trash. Active diaries are returned unchanged.
pub fn restore_diary(conn: &Connection, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
    let diary = get_diary(conn, owner_id, diary_id)?;
    if !diary.is_deleted() {
        return Ok(diary);
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE diaries SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
        params![db::now_timestamp(), diary_id],
    )?;
    write_audit_log(&tx, "restore", diary_id, None)?;
    tx.commit()?;
    tracing::info!(owner_id, diary_id, "diary restored");

    get_diary(conn, owner_id, diary_id)
}

/// Permanently remove one of the owner's diaries, trashed or not.
pub fn purge_diary(conn: &mut Connection, owner_id: i64, diary_id: i64) -> DiaryResult<PurgedDiary> {
    get_diary(conn, owner_id, diary_id)?;
    purge_one(conn, diary_id, None)?.ok_or_else(|| DiaryError::not_found("diary", diary_id))
}

/// Delete a diary with its photos and links in one transaction.
///
/// With `expired_before`, the diary is only removed if it is still trashed
/// before that instant; otherwise `Ok(None)` is returned and nothing changes.
fn purge_one(
    conn: &mut Connection,
    diary_id: i64,
    expired_before: Option<&str>,
) -> DiaryResult<Option<PurgedDiary>> {
    let tx = conn.transaction()?;

    let row: Option<(i64, Option<String>)> = tx
        .query_row(
            "SELECT owner_id, deleted_at FROM diaries WHERE id = ?1",
            params![diary_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((owner_id, deleted_at)) = row else {
        return Ok(None);
    };
    if let Some(cutoff) = expired_before {
        match deleted_at.as_deref() {
            Some(at) if at < cutoff => {}
            _ => return Ok(None),
        }
    }

    let photo_urls: Vec<String> = {
        let mut stmt = tx.prepare("SELECT url FROM photos WHERE diary_id = ?1 ORDER BY sequence")?;
        let collected = stmt
            .query_map(params![diary_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let unlinked_albums = tx.execute("DELETE FROM diary_albums WHERE diary_id = ?1", params![diary_id])?;
    tx.execute("DELETE FROM photos WHERE diary_id = ?1", params![diary_id])?;
    tx.execute("DELETE FROM diaries WHERE id = ?1", params![diary_id])?;

    write_audit_log(
        &tx,
        "purge",
        diary_id,
        Some(&serde_json::json!({
            "photos": photo_urls.len(),
            "albums": unlinked_albums,
        })),
    )?;
    tx.commit()?;

    tracing::info!(owner_id, diary_id, photos = photo_urls.len(), "diary purged");

    Ok(Some(PurgedDiary {
        diary_id,
        owner_id,
        photo_urls,
        unlinked_albums,
    }))
}

/// Stored form of `now - retention_days`. Windows too large to represent are
/// rejected instead of wrapping.
fn retention_cutoff(now: DateTime<Utc>, retention_days: u64) -> DiaryResult<String> {
    i64::try_from(retention_days)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|window| now.checked_sub_signed(window))
        .map(db::timestamp)
        .ok_or_else(|| {
            DiaryError::validation(format!("trash retention of {retention_days} days is out of range"))
        })
}

/// Trashed diaries whose `deleted_at` is older than `now - retention_days`.
pub fn find_expired_trash(
    conn: &Connection,
    now: DateTime<Utc>,
    retention_days: u64,
) -> DiaryResult<Vec<TrashCandidate>> {
    let cutoff = retention_cutoff(now, retention_days)?;
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, title, deleted_at FROM diaries \
         WHERE deleted_at IS NOT NULL AND deleted_at < ?1 \
         ORDER BY deleted_at, id",
    )?;
    let candidates = stmt
        .query_map(params![cutoff], |row| {
            Ok(TrashCandidate {
                diary_id: row.get(0)?,
                owner_id: row.get(1)?,
                title: row.get(2)?,
                deleted_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(candidates)
}

/// Purge every diary trashed before `now - retention_days`.
///
/// Each diary is purged in its own transaction. A failure is logged and
/// recorded in the report, and the sweep moves on. Running it again right
/// away finds nothing to do.
pub fn purge_expired_trash(
    conn: &mut Connection,
    now: DateTime<Utc>,
    retention_days: u64,
) -> DiaryResult<SweepReport> {
    let cutoff = retention_cutoff(now, retention_days)?;
    let candidates = find_expired_trash(conn, now, retention_days)?;
    let mut report = SweepReport::default();

    for candidate in candidates {
        match purge_one(conn, candidate.diary_id, Some(&cutoff)) {
            Ok(Some(purged)) => report.purged.push(purged),
            Ok(None) => {
                tracing::debug!(diary_id = candidate.diary_id, "diary left the trash before purge");
            }
            Err(e) => {
                tracing::warn!(diary_id = candidate.diary_id, error = %e, "failed to purge diary, continuing");
                report.failed.push(SweepFailure {
                    diary_id: candidate.diary_id,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        purged = report.purged.len(),
        failed = report.failed.len(),
        "trash sweep complete"
    );
    Ok(report)
}
