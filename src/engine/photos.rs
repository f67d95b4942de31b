//! Photo lifecycle: upload records, temporary listing, finalize, and delete.
//!
//! A photo is *temporary* while `diary_id IS NULL`. [`finalize_selection`]
//! orders the caller's chosen temporaries and discards the rest; the discarded
//! storage objects are returned to the caller for best-effort cleanup once the
//! transaction has committed.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::types::{PhotoAsset, ResolvedLocation, UploadMeta};
use super::write_audit_log;
use crate::db;
use crate::error::{DiaryError, DiaryResult};

pub(crate) const PHOTO_COLUMNS: &str = "id, owner_id, url, captured_at, latitude, longitude, \
     country, admin1, locality, sequence, diary_id, created_at";

/// Map a row selected with [`PHOTO_COLUMNS`].
pub(crate) fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoAsset> {
    let country: Option<String> = row.get(6)?;
    let location = country.map(|country| -> rusqlite::Result<ResolvedLocation> {
        Ok(ResolvedLocation {
            country,
            admin1: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            locality: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        })
    });

    Ok(PhotoAsset {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        url: row.get(2)?,
        captured_at: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        location: location.transpose()?,
        sequence: row.get(9)?,
        diary_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// A temporary photo removed by [`finalize_selection`].
#[derive(Debug, Clone, Serialize)]
pub struct DiscardedPhoto {
    pub id: i64,
    pub url: String,
}

/// Result of a finalize: the ordered selection plus what was thrown away.
#[derive(Debug, Serialize)]
pub struct FinalizeOutcome {
    pub photos: Vec<PhotoAsset>,
    pub discarded: Vec<DiscardedPhoto>,
}

/// Record a freshly stored upload as a temporary photo.
pub fn insert_photo(
    conn: &Connection,
    owner_id: i64,
    url: &str,
    meta: &UploadMeta,
) -> DiaryResult<PhotoAsset> {
    let now = db::now_timestamp();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO photos (owner_id, url, captured_at, latitude, longitude, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            owner_id,
            url,
            meta.captured_at.map(db::timestamp),
            meta.latitude,
            meta.longitude,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();
    write_audit_log(&tx, "upload", id, Some(&serde_json::json!({ "owner_id": owner_id })))?;
    tx.commit()?;

    get_photo(conn, id)?.ok_or_else(|| DiaryError::not_found("photo", id))
}

pub fn get_photo(conn: &Connection, photo_id: i64) -> DiaryResult<Option<PhotoAsset>> {
    let photo = conn
        .query_row(
            &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
            params![photo_id],
            photo_from_row,
        )
        .optional()?;
    Ok(photo)
}

/// Load a photo and check that `owner_id` owns it.
pub fn owned_photo(conn: &Connection, owner_id: i64, photo_id: i64) -> DiaryResult<PhotoAsset> {
    let photo = get_photo(conn, photo_id)?.ok_or_else(|| DiaryError::not_found("photo", photo_id))?;
    if photo.owner_id != owner_id {
        return Err(DiaryError::forbidden("photo", photo_id));
    }
    Ok(photo)
}

/// All of the owner's photos that are not attached to a diary.
pub fn list_temporary(conn: &Connection, owner_id: i64) -> DiaryResult<Vec<PhotoAsset>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PHOTO_COLUMNS} FROM photos \
         WHERE owner_id = ?1 AND diary_id IS NULL \
         ORDER BY sequence IS NULL, sequence, id"
    ))?;
    let photos = stmt
        .query_map(params![owner_id], photo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(photos)
}

/// Photos attached to a diary, in sequence order.
pub fn photos_for_diary(conn: &Connection, diary_id: i64) -> DiaryResult<Vec<PhotoAsset>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PHOTO_COLUMNS} FROM photos WHERE diary_id = ?1 ORDER BY sequence, id"
    ))?;
    let photos = stmt
        .query_map(params![diary_id], photo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(photos)
}

/// Load the owner's temporary photos among `ids`, in the order given.
///
/// Unknown ids, other users' photos, attached photos and repeated ids are
/// skipped silently.
pub fn load_owned_temporary(
    conn: &Connection,
    owner_id: i64,
    ids: &[i64],
) -> DiaryResult<Vec<PhotoAsset>> {
    let mut seen = HashSet::new();
    let mut photos = Vec::new();
    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        if let Some(photo) = get_photo(conn, id)? {
            if photo.owner_id == owner_id && photo.is_temporary() {
                photos.push(photo);
            }
        }
    }
    Ok(photos)
}

/// Fix the order of the caller's selection and discard every other temporary photo.
///
/// Validation runs before any write: the selection must be non-empty, at most
/// `max_selection` long, free of repeats, and made of the caller's temporary
/// photos. Sequences are assigned `1..=N` in the given order.
pub fn finalize_selection(
    conn: &mut Connection,
    owner_id: i64,
    ordered_ids: &[i64],
    max_selection: usize,
) -> DiaryResult<FinalizeOutcome> {
    if ordered_ids.is_empty() {
        return Err(DiaryError::validation("photo selection is empty"));
    }
    if ordered_ids.len() > max_selection {
        return Err(DiaryError::validation(format!(
            "photo selection has {} photos, at most {max_selection} allowed",
            ordered_ids.len()
        )));
    }
    let selected: HashSet<i64> = ordered_ids.iter().copied().collect();
    if selected.len() != ordered_ids.len() {
        return Err(DiaryError::validation("photo selection contains duplicate ids"));
    }

    let tx = conn.transaction()?;

    for &id in ordered_ids {
        let photo = owned_photo(&tx, owner_id, id)?;
        if !photo.is_temporary() {
            return Err(DiaryError::validation(format!(
                "photo {id} is already attached to a diary"
            )));
        }
    }

    for (index, &id) in ordered_ids.iter().enumerate() {
        tx.execute(
            "UPDATE photos SET sequence = ?1 WHERE id = ?2",
            params![index as u32 + 1, id],
        )?;
    }

    let discarded: Vec<DiscardedPhoto> = list_temporary(&tx, owner_id)?
        .into_iter()
        .filter(|p| !selected.contains(&p.id))
        .map(|p| DiscardedPhoto { id: p.id, url: p.url })
        .collect();

    for photo in &discarded {
        tx.execute("DELETE FROM photos WHERE id = ?1", params![photo.id])?;
        write_audit_log(&tx, "discard", photo.id, None)?;
    }

    write_audit_log(
        &tx,
        "finalize",
        owner_id,
        Some(&serde_json::json!({
            "selected": ordered_ids,
            "discarded": discarded.iter().map(|p| p.id).collect::<Vec<_>>(),
        })),
    )?;

    let mut photos = Vec::with_capacity(ordered_ids.len());
    for &id in ordered_ids {
        photos.push(owned_photo(&tx, owner_id, id)?);
    }

    tx.commit()?;

    tracing::info!(
        owner_id,
        selected = photos.len(),
        discarded = discarded.len(),
        "photo selection finalized"
    );

    Ok(FinalizeOutcome { photos, discarded })
}

/// Check that the owner may delete this photo right now: it must exist, be
/// theirs, and still be temporary.
pub fn authorize_photo_delete(
    conn: &Connection,
    owner_id: i64,
    photo_id: i64,
) -> DiaryResult<PhotoAsset> {
    let photo = owned_photo(conn, owner_id, photo_id)?;
    if !photo.is_temporary() {
        return Err(DiaryError::validation(format!(
            "photo {photo_id} belongs to a diary and cannot be deleted on its own"
        )));
    }
    Ok(photo)
}

/// Remove a temporary photo record. Run after its storage object is gone.
pub fn delete_photo_record(conn: &Connection, owner_id: i64, photo_id: i64) -> DiaryResult<()> {
    let tx = conn.unchecked_transaction()?;
    let rows = tx.execute(
        "DELETE FROM photos WHERE id = ?1 AND owner_id = ?2 AND diary_id IS NULL",
        params![photo_id, owner_id],
    )?;
    if rows == 0 {
        return Err(DiaryError::not_found("photo", photo_id));
    }
    write_audit_log(&tx, "delete_photo", photo_id, None)?;
    tx.commit()?;
    Ok(())
}
