//! Diary write and read paths.
//!
//! Two ways to create a diary: [`create_diary_manual`] stores inline photo
//! descriptors together with the entry, [`create_diary_auto`] adopts photos the
//! owner already uploaded. Both run in one transaction; album reconciliation
//! is the caller's post-commit step.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::photos::{load_owned_temporary, photos_for_diary};
use super::types::{Diary, DiaryDraft, NewPhoto, PhotoAsset};
use super::write_audit_log;
use crate::db;
use crate::error::{DiaryError, DiaryResult};

pub(crate) const DIARY_COLUMNS: &str =
    "id, owner_id, title, content, mood, favorite, created_at, updated_at, deleted_at";

fn diary_from_row(row: &Row<'_>) -> rusqlite::Result<Diary> {
    Ok(Diary {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        mood: row.get(4)?,
        favorite: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        deleted_at: row.get(8)?,
        photos: Vec::new(),
    })
}

/// Load a diary with its photos, regardless of owner or trash state.
pub fn load_diary(conn: &Connection, diary_id: i64) -> DiaryResult<Option<Diary>> {
    let diary = conn
        .query_row(
            &format!("SELECT {DIARY_COLUMNS} FROM diaries WHERE id = ?1"),
            params![diary_id],
            diary_from_row,
        )
        .optional()?;

    match diary {
        Some(mut diary) => {
            diary.photos = photos_for_diary(conn, diary.id)?;
            Ok(Some(diary))
        }
        None => Ok(None),
    }
}

/// Load a diary and check that `owner_id` owns it. Trashed diaries are returned too.
pub fn get_diary(conn: &Connection, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
    let diary = load_diary(conn, diary_id)?.ok_or_else(|| DiaryError::not_found("diary", diary_id))?;
    if diary.owner_id != owner_id {
        return Err(DiaryError::forbidden("diary", diary_id));
    }
    Ok(diary)
}

fn list_where(conn: &Connection, owner_id: i64, trashed: bool) -> DiaryResult<Vec<Diary>> {
    let filter = if trashed {
        "deleted_at IS NOT NULL ORDER BY deleted_at DESC, id DESC"
    } else {
        "deleted_at IS NULL ORDER BY created_at DESC, id DESC"
    };
    let mut diaries = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {DIARY_COLUMNS} FROM diaries WHERE owner_id = ?1 AND {filter}"
        ))?;
        let collected = stmt
            .query_map(params![owner_id], diary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };
    for diary in &mut diaries {
        diary.photos = photos_for_diary(conn, diary.id)?;
    }
    Ok(diaries)
}

/// The owner's active diaries, newest first.
pub fn list_diaries(conn: &Connection, owner_id: i64) -> DiaryResult<Vec<Diary>> {
    list_where(conn, owner_id, false)
}

/// The owner's trashed diaries, most recently deleted first.
pub fn list_trash(conn: &Connection, owner_id: i64) -> DiaryResult<Vec<Diary>> {
    list_where(conn, owner_id, true)
}

pub fn set_favorite(conn: &Connection, owner_id: i64, diary_id: i64, favorite: bool) -> DiaryResult<Diary> {
    get_diary(conn, owner_id, diary_id)?;
    conn.execute(
        "UPDATE diaries SET favorite = ?1, updated_at = ?2 WHERE id = ?3",
        params![favorite, db::now_timestamp(), diary_id],
    )?;
    get_diary(conn, owner_id, diary_id)
}

fn insert_diary(conn: &Connection, owner_id: i64, draft: &DiaryDraft) -> DiaryResult<i64> {
    let now = db::now_timestamp();
    conn.execute(
        "INSERT INTO diaries (owner_id, title, content, mood, favorite, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![owner_id, draft.title, draft.content, draft.mood, now],
    )?;
    Ok(conn.last_insert_rowid())
}

fn validate_new_photo(index: usize, photo: &NewPhoto) -> DiaryResult<()> {
    if photo.url.trim().is_empty() {
        return Err(DiaryError::validation(format!("photo {} has no url", index + 1)));
    }
    match (photo.latitude, photo.longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
            Ok(())
        }
        _ => Err(DiaryError::validation(format!(
            "photo {} has invalid coordinates",
            index + 1
        ))),
    }
}

/// Create a diary together with its photos, given inline.
///
/// Photos are attached in the order given with sequences `1..=N`.
pub fn create_diary_manual(
    conn: &mut Connection,
    owner_id: i64,
    draft: &DiaryDraft,
    photos: &[NewPhoto],
    max_photos: usize,
) -> DiaryResult<Diary> {
    if photos.len() > max_photos {
        return Err(DiaryError::validation(format!(
            "diary has {} photos, at most {max_photos} allowed",
            photos.len()
        )));
    }
    for (index, photo) in photos.iter().enumerate() {
        validate_new_photo(index, photo)?;
    }

    let tx = conn.transaction()?;
    let diary_id = insert_diary(&tx, owner_id, draft)?;
    let now = db::now_timestamp();

    for (index, photo) in photos.iter().enumerate() {
        let location = photo.location.as_ref();
        tx.execute(
            "INSERT INTO photos (owner_id, url, captured_at, latitude, longitude, \
                                 country, admin1, locality, sequence, diary_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                owner_id,
                photo.url.trim(),
                photo.captured_at.map(db::timestamp),
                photo.latitude,
                photo.longitude,
                location.map(|l| l.country.as_str()),
                location.map(|l| l.admin1.as_str()),
                location.map(|l| l.locality.as_str()),
                index as u32 + 1,
                diary_id,
                now,
            ],
        )?;
    }

    write_audit_log(
        &tx,
        "create",
        diary_id,
        Some(&serde_json::json!({ "mode": "manual", "photos": photos.len() })),
    )?;
    tx.commit()?;

    tracing::info!(owner_id, diary_id, photos = photos.len(), "diary created");
    load_diary(conn, diary_id)?.ok_or_else(|| DiaryError::not_found("diary", diary_id))
}

/// Pick the photos an auto-created diary would adopt.
///
/// Only the owner's temporary photos are eligible. Photos sharing a storage
/// URL with an earlier one are dropped, keeping the first in caller order.
pub fn collect_auto_photos(conn: &Connection, owner_id: i64, photo_ids: &[i64]) -> DiaryResult<Vec<PhotoAsset>> {
    let mut seen_urls = HashSet::new();
    let photos = load_owned_temporary(conn, owner_id, photo_ids)?
        .into_iter()
        .filter(|photo| seen_urls.insert(photo.url.clone()))
        .collect();
    Ok(photos)
}

/// Create a diary that adopts already-uploaded photos, with `draft.content`
/// holding the generated (or fallback) text.
///
/// Each photo is re-checked inside the transaction; if any was attached or
/// deleted since [`collect_auto_photos`] ran, nothing is written.
pub fn create_diary_auto(
    conn: &mut Connection,
    owner_id: i64,
    draft: &DiaryDraft,
    photos: &[PhotoAsset],
    max_photos: usize,
) -> DiaryResult<Diary> {
    if photos.is_empty() {
        return Err(DiaryError::validation("no eligible photos for an automatic diary"));
    }
    if photos.len() > max_photos {
        return Err(DiaryError::validation(format!(
            "diary has {} photos, at most {max_photos} allowed",
            photos.len()
        )));
    }

    let tx = conn.transaction()?;
    let diary_id = insert_diary(&tx, owner_id, draft)?;

    for (index, photo) in photos.iter().enumerate() {
        let rows = tx.execute(
            "UPDATE photos SET diary_id = ?1, sequence = ?2 \
             WHERE id = ?3 AND owner_id = ?4 AND diary_id IS NULL",
            params![diary_id, index as u32 + 1, photo.id, owner_id],
        )?;
        if rows == 0 {
            return Err(DiaryError::validation(format!(
                "photo {} is no longer available",
                photo.id
            )));
        }
    }

    write_audit_log(
        &tx,
        "create",
        diary_id,
        Some(&serde_json::json!({
            "mode": "auto",
            "photos": photos.iter().map(|p| p.id).collect::<Vec<_>>(),
        })),
    )?;
    tx.commit()?;

    tracing::info!(owner_id, diary_id, photos = photos.len(), "diary created from uploads");
    load_diary(conn, diary_id)?.ok_or_else(|| DiaryError::not_found("diary", diary_id))
}
