//! Deferred location resolution.
//!
//! Photos arrive with raw coordinates; the hierarchy is filled in later by the
//! geocoder. A photo is pending while `country IS NULL` and it still has
//! coordinates and attempts left. A geocoder with no answer stores an empty
//! hierarchy, which the album rule maps to the fallback album.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::types::ResolvedLocation;
use super::write_audit_log;
use crate::error::DiaryResult;

/// A photo waiting for the geocoder.
#[derive(Debug, Clone, Serialize)]
pub struct PendingLocation {
    pub photo_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Totals for one resolution pass.
#[derive(Debug, Default, Serialize)]
pub struct LocationReport {
    pub resolved: usize,
    /// Geocoder answered but knew nothing about the coordinates.
    pub unknown: usize,
    pub failed: usize,
    /// Diaries whose album links changed as a result.
    pub diaries_updated: Vec<i64>,
}

pub fn pending_locations(conn: &Connection, limit: usize, max_attempts: u32) -> DiaryResult<Vec<PendingLocation>> {
    let mut stmt = conn.prepare(
        "SELECT id, latitude, longitude FROM photos \
         WHERE country IS NULL AND latitude IS NOT NULL AND longitude IS NOT NULL \
           AND geocode_attempts < ?1 \
         ORDER BY id LIMIT ?2",
    )?;
    let pending = stmt
        .query_map(params![max_attempts, limit as i64], |row| {
            Ok(PendingLocation {
                photo_id: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pending)
}

/// Store the geocoder's answer for a photo. `None` stores an empty hierarchy.
///
/// Returns the photo's diary when it is attached, so the caller can
/// reconcile it. Photos that vanished or were resolved meanwhile are skipped.
pub fn apply_location(
    conn: &Connection,
    photo_id: i64,
    location: Option<&ResolvedLocation>,
) -> DiaryResult<Option<i64>> {
    let location = location.cloned().unwrap_or_default();
    let tx = conn.unchecked_transaction()?;
    let rows = tx.execute(
        "UPDATE photos SET country = ?1, admin1 = ?2, locality = ?3, \
                           geocode_attempts = geocode_attempts + 1 \
         WHERE id = ?4 AND country IS NULL",
        params![location.country, location.admin1, location.locality, photo_id],
    )?;
    if rows == 0 {
        return Ok(None);
    }

    write_audit_log(
        &tx,
        "locate",
        photo_id,
        Some(&serde_json::to_value(&location)?),
    )?;

    let diary_id: Option<i64> = tx
        .query_row(
            "SELECT diary_id FROM photos WHERE id = ?1",
            params![photo_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    tx.commit()?;
    Ok(diary_id)
}

/// Count a failed geocoder call against the photo's attempt budget.
pub fn record_geocode_failure(conn: &Connection, photo_id: i64) -> DiaryResult<()> {
    conn.execute(
        "UPDATE photos SET geocode_attempts = geocode_attempts + 1 WHERE id = ?1",
        params![photo_id],
    )?;
    Ok(())
}
