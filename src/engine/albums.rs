//! Location albums and diary/album reconciliation.
//!
//! Album membership is derived data: every diary belongs to exactly the albums
//! named by its photos' resolved locations. [`reconcile`] diffs the current
//! links against that set and applies the difference. Albums are created on
//! first use and never removed here, even when they end up empty.

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::diary::load_diary;
use super::photos::photos_for_diary;
use super::types::{Album, AlbumSummary, Diary, PhotoAsset, ResolvedLocation};
use super::write_audit_log;
use crate::config::AlbumConfig;
use crate::db;
use crate::error::{DiaryError, DiaryResult};

/// Deterministic album name for one resolved location.
///
/// Home-country photos group by the most specific level available
/// (locality, then admin1, then country). Foreign photos group by
/// `"{country} - {admin1}"`, or just the country. No country at all falls
/// back to `config.fallback_name`.
pub fn canonical_album_name(location: &ResolvedLocation, config: &AlbumConfig) -> String {
    let country = location.country.trim();
    let admin1 = location.admin1.trim();
    let locality = location.locality.trim();

    if country.is_empty() {
        return config.fallback_name.clone();
    }

    if country == config.home_country.trim() {
        [locality, admin1, country]
            .into_iter()
            .find(|level| !level.is_empty())
            .unwrap_or(country)
            .to_string()
    } else if !admin1.is_empty() {
        format!("{country} - {admin1}")
    } else {
        country.to_string()
    }
}

/// The set of album names a diary with these photos should belong to.
/// Photos whose location is still unresolved contribute nothing.
pub fn desired_album_names(photos: &[PhotoAsset], config: &AlbumConfig) -> BTreeSet<String> {
    photos
        .iter()
        .filter_map(|p| p.location.as_ref())
        .map(|location| canonical_album_name(location, config))
        .filter(|name| !name.is_empty())
        .collect()
}

/// What a [`reconcile`] run changed.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub diary_id: i64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// `true` when the diary is in the trash or has no photos.
    pub skipped: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Bring a diary's album links in line with its photos.
///
/// Idempotent: a second run over an unchanged photo set touches nothing.
pub fn reconcile(conn: &mut Connection, diary_id: i64, config: &AlbumConfig) -> DiaryResult<ReconcileReport> {
    let tx = conn.transaction()?;

    let (owner_id, deleted_at): (i64, Option<String>) = tx
        .query_row(
            "SELECT owner_id, deleted_at FROM diaries WHERE id = ?1",
            params![diary_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| DiaryError::not_found("diary", diary_id))?;

    let mut report = ReconcileReport {
        diary_id,
        ..Default::default()
    };

    let photos = photos_for_diary(&tx, diary_id)?;
    if deleted_at.is_some() || photos.is_empty() {
        report.skipped = true;
        return Ok(report);
    }

    let desired = desired_album_names(&photos, config);
    let existing = linked_albums(&tx, diary_id)?;

    for (name, album_id) in &existing {
        if desired.contains(name) {
            continue;
        }
        tx.execute(
            "DELETE FROM diary_albums WHERE diary_id = ?1 AND album_id = ?2",
            params![diary_id, album_id],
        )?;
        write_audit_log(&tx, "unlink", diary_id, Some(&serde_json::json!({ "album": name })))?;
        report.removed.push(name.clone());
    }

    let cover = photos.iter().map(|p| p.url.as_str()).find(|url| !url.is_empty());
    for name in desired.iter().filter(|name| !existing.contains_key(*name)) {
        let album_id = find_or_create_album(&tx, owner_id, name, cover)?;
        tx.execute(
            "INSERT OR IGNORE INTO diary_albums (diary_id, album_id, created_at) VALUES (?1, ?2, ?3)",
            params![diary_id, album_id, db::now_timestamp()],
        )?;
        write_audit_log(&tx, "link", diary_id, Some(&serde_json::json!({ "album": name })))?;
        report.added.push(name.clone());
    }

    tx.commit()?;

    report.removed.sort();
    if !report.is_noop() {
        tracing::info!(
            diary_id,
            added = ?report.added,
            removed = ?report.removed,
            "album links reconciled"
        );
    }
    Ok(report)
}

/// Album name → album id for every album the diary is linked to.
fn linked_albums(conn: &Connection, diary_id: i64) -> DiaryResult<HashMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT a.name, a.id FROM diary_albums l JOIN albums a ON a.id = l.album_id \
         WHERE l.diary_id = ?1",
    )?;
    let links = stmt
        .query_map(params![diary_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(links)
}

/// Names of the albums a diary is currently linked to, sorted.
pub fn linked_album_names(conn: &Connection, diary_id: i64) -> DiaryResult<Vec<String>> {
    let mut names: Vec<String> = linked_albums(conn, diary_id)?.into_keys().collect();
    names.sort();
    Ok(names)
}

/// Look up the owner's album by name, creating it with `cover_url` if absent.
/// The cover of an existing album is left alone.
fn find_or_create_album(
    conn: &Connection,
    owner_id: i64,
    name: &str,
    cover_url: Option<&str>,
) -> DiaryResult<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM albums WHERE owner_id = ?1 AND name = ?2",
            params![owner_id, name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO albums (owner_id, name, cover_url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![owner_id, name, cover_url, db::now_timestamp()],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(owner_id, album_id = id, name, "album created");
    Ok(id)
}

fn album_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        cover_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Load an album and check that `owner_id` owns it.
pub fn owned_album(conn: &Connection, owner_id: i64, album_id: i64) -> DiaryResult<Album> {
    let album = conn
        .query_row(
            "SELECT id, owner_id, name, cover_url, created_at FROM albums WHERE id = ?1",
            params![album_id],
            album_from_row,
        )
        .optional()?
        .ok_or_else(|| DiaryError::not_found("album", album_id))?;
    if album.owner_id != owner_id {
        return Err(DiaryError::forbidden("album", album_id));
    }
    Ok(album)
}

/// The owner's albums with their count of active (not trashed) diaries.
pub fn list_albums(conn: &Connection, owner_id: i64) -> DiaryResult<Vec<AlbumSummary>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.owner_id, a.name, a.cover_url, a.created_at, \
                (SELECT COUNT(*) FROM diary_albums l JOIN diaries d ON d.id = l.diary_id \
                 WHERE l.album_id = a.id AND d.deleted_at IS NULL) \
         FROM albums a WHERE a.owner_id = ?1 ORDER BY a.name",
    )?;
    let albums = stmt
        .query_map(params![owner_id], |row| {
            Ok(AlbumSummary {
                album: album_from_row(row)?,
                diary_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(albums)
}

/// Active diaries linked to an album, newest first.
pub fn list_album_diaries(conn: &Connection, owner_id: i64, album_id: i64) -> DiaryResult<Vec<Diary>> {
    owned_album(conn, owner_id, album_id)?;

    let ids: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT d.id FROM diary_albums l JOIN diaries d ON d.id = l.diary_id \
             WHERE l.album_id = ?1 AND d.deleted_at IS NULL \
             ORDER BY d.created_at DESC, d.id DESC",
        )?;
        let collected = stmt
            .query_map(params![album_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let mut diaries = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(diary) = load_diary(conn, id)? {
            diaries.push(diary);
        }
    }
    Ok(diaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diary::create_diary_manual;
    use crate::engine::trash::soft_delete_diary;
    use crate::engine::types::{DiaryDraft, NewPhoto};

    fn config() -> AlbumConfig {
        AlbumConfig::default()
    }

    fn loc(country: &str, admin1: &str, locality: &str) -> ResolvedLocation {
        ResolvedLocation::new(country, admin1, locality)
    }

    fn photo_at(url: &str, location: Option<ResolvedLocation>) -> NewPhoto {
        NewPhoto {
            url: url.to_string(),
            captured_at: None,
            latitude: None,
            longitude: None,
            location,
        }
    }

    fn set_location(conn: &Connection, photo_id: i64, location: &ResolvedLocation) {
        conn.execute(
            "UPDATE photos SET country = ?1, admin1 = ?2, locality = ?3 WHERE id = ?4",
            params![location.country, location.admin1, location.locality, photo_id],
        )
        .unwrap();
    }

    #[test]
    fn test_name_rule_examples() {
        let c = config();
        assert_eq!(canonical_album_name(&loc("Korea", "", "Seoul"), &c), "Seoul");
        assert_eq!(canonical_album_name(&loc("Korea", "Gyeonggi", ""), &c), "Gyeonggi");
        assert_eq!(canonical_album_name(&loc("Korea", "", ""), &c), "Korea");
        assert_eq!(canonical_album_name(&loc("Japan", "Osaka", "Namba"), &c), "Japan - Osaka");
        assert_eq!(canonical_album_name(&loc("Japan", "", "Namba"), &c), "Japan");
        assert_eq!(canonical_album_name(&loc("", "Osaka", "Namba"), &c), "Other Places");
    }

    #[test]
    fn test_desired_names_dedup_and_skip_unresolved() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[
                photo_at("a", Some(loc("Korea", "", "Seoul"))),
                photo_at("b", Some(loc("Korea", "Seoul", "Seoul"))),
                photo_at("c", None),
            ],
            9,
        )
        .unwrap();

        let names = desired_album_names(&diary.photos, &c);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Seoul".to_string()]);
    }

    #[test]
    fn test_reconcile_creates_albums_and_links() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[
                photo_at("https://cdn.test/1.jpg", Some(loc("Korea", "", "Busan"))),
                photo_at("https://cdn.test/2.jpg", Some(loc("Japan", "Osaka", ""))),
            ],
            9,
        )
        .unwrap();

        reconcile(&mut conn, diary.id, &c).unwrap();

        assert_eq!(
            linked_album_names(&conn, diary.id).unwrap(),
            vec!["Busan".to_string(), "Japan - Osaka".to_string()]
        );
        let albums = list_albums(&conn, 1).unwrap();
        assert_eq!(albums.len(), 2);
        assert!(albums
            .iter()
            .all(|a| a.album.cover_url.as_deref() == Some("https://cdn.test/1.jpg")));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[photo_at("a", Some(loc("Korea", "", "Seoul")))],
            9,
        )
        .unwrap();

        reconcile(&mut conn, diary.id, &c).unwrap();
        let links_before: i64 = conn
            .query_row("SELECT COUNT(*) FROM diary_albums", [], |row| row.get(0))
            .unwrap();

        let second = reconcile(&mut conn, diary.id, &c).unwrap();
        assert!(second.is_noop());
        let links_after: i64 = conn
            .query_row("SELECT COUNT(*) FROM diary_albums", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links_before, links_after);
    }

    #[test]
    fn test_reconcile_skips_trashed_diary() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[photo_at("a", Some(loc("Korea", "", "Seoul")))],
            9,
        )
        .unwrap();
        reconcile(&mut conn, diary.id, &c).unwrap();

        soft_delete_diary(&conn, 1, diary.id).unwrap();
        set_location(&conn, diary.photos[0].id, &loc("France", "", ""));

        let report = reconcile(&mut conn, diary.id, &c).unwrap();
        assert!(report.skipped);
        assert!(report.is_noop());
        assert_eq!(linked_album_names(&conn, diary.id).unwrap(), vec!["Seoul".to_string()]);
    }

    #[test]
    fn test_reconcile_skips_diary_without_photos() {
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(&mut conn, 1, &DiaryDraft::default(), &[], 9).unwrap();

        let report = reconcile(&mut conn, diary.id, &config()).unwrap();
        assert!(report.skipped);
        assert!(linked_album_names(&conn, diary.id).unwrap().is_empty());
        assert!(list_albums(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_moves_diary_when_location_changes() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let diary = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[photo_at("a", Some(loc("Korea", "", "Seoul")))],
            9,
        )
        .unwrap();

        set_location(&conn, diary.photos[0].id, &loc("France", "Île-de-France", "Paris"));
        let report = reconcile(&mut conn, diary.id, &c).unwrap();

        assert_eq!(report.added, vec!["France - Île-de-France".to_string()]);
        assert_eq!(report.removed, vec!["Seoul".to_string()]);
        // the emptied album stays
        let names: Vec<String> = list_albums(&conn, 1).unwrap().into_iter().map(|a| a.album.name).collect();
        assert!(names.contains(&"Seoul".to_string()));
    }

    #[test]
    fn test_existing_album_keeps_its_cover() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        let first = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[photo_at("first.jpg", Some(loc("Korea", "", "Seoul")))],
            9,
        )
        .unwrap();
        let second = create_diary_manual(
            &mut conn,
            1,
            &DiaryDraft::default(),
            &[photo_at("second.jpg", Some(loc("Korea", "", "Seoul")))],
            9,
        )
        .unwrap();
        reconcile(&mut conn, first.id, &c).unwrap();
        reconcile(&mut conn, second.id, &c).unwrap();

        let albums = list_albums(&conn, 1).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].album.cover_url.as_deref(), Some("first.jpg"));
        assert_eq!(albums[0].diary_count, 2);
    }

    #[test]
    fn test_albums_are_scoped_per_owner() {
        let c = config();
        let mut conn = db::open_memory_database().unwrap();
        for owner in [1, 2] {
            let diary = create_diary_manual(
                &mut conn,
                owner,
                &DiaryDraft::default(),
                &[photo_at("a", Some(loc("Korea", "", "Seoul")))],
                9,
            )
            .unwrap();
            reconcile(&mut conn, diary.id, &c).unwrap();
        }

        let mine = list_albums(&conn, 1).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].diary_count, 1);
        assert!(matches!(
            list_album_diaries(&conn, 2, mine[0].album.id),
            Err(DiaryError::Forbidden(_))
        ));
    }

    #[test]
    fn test_reconcile_unknown_diary_is_not_found() {
        let mut conn = db::open_memory_database().unwrap();
        assert!(matches!(
            reconcile(&mut conn, 42, &config()),
            Err(DiaryError::NotFound(_))
        ));
    }
}
