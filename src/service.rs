//! Async entry points over the synchronous engine.
//!
//! [`DiaryService`] owns the shared connection and the ports. Database work
//! runs on the blocking pool under the connection lock. Storage, scorer,
//! generator and geocoder calls run on the async side with the lock released,
//! each bounded by the configured timeout.

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::config::DiaryConfig;
use crate::db;
use crate::engine::albums::{self, ReconcileReport};
use crate::engine::locations::{self, LocationReport};
use crate::engine::trash::{self, PurgedDiary, SweepReport, TrashCandidate};
use crate::engine::types::{AlbumSummary, Diary, DiaryDraft, NewPhoto, PhotoAsset, UploadMeta};
use crate::engine::{diary, photos, recommend};
use crate::error::{DiaryError, DiaryResult, StorageError};
use crate::ports::http::{HttpGenerator, HttpGeocoder, HttpScorer};
use crate::ports::local_storage::LocalStorage;
use crate::ports::{bounded, AiGeneratorPort, AiScorerPort, GeocodePort, ObjectMeta, StoragePort};

#[derive(Clone)]
pub struct DiaryService {
    db: Arc<Mutex<Connection>>,
    storage: Arc<dyn StoragePort>,
    geocoder: Arc<dyn GeocodePort>,
    scorer: Arc<dyn AiScorerPort>,
    generator: Arc<dyn AiGeneratorPort>,
    config: Arc<DiaryConfig>,
}

impl DiaryService {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        storage: Arc<dyn StoragePort>,
        geocoder: Arc<dyn GeocodePort>,
        scorer: Arc<dyn AiScorerPort>,
        generator: Arc<dyn AiGeneratorPort>,
        config: Arc<DiaryConfig>,
    ) -> Self {
        Self {
            db,
            storage,
            geocoder,
            scorer,
            generator,
            config,
        }
    }

    /// Open the configured database and wire up the local storage and HTTP adapters.
    pub fn from_config(config: DiaryConfig) -> anyhow::Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;

        let storage = LocalStorage::new(config.resolved_media_dir(), &config.storage.public_base_url);
        let geocoder = HttpGeocoder::new(&config.services)?;
        let scorer = HttpScorer::new(&config.services)?;
        let generator = HttpGenerator::new(&config.services)?;

        tracing::info!(
            db = %db_path.display(),
            media = %config.resolved_media_dir().display(),
            "diary service ready"
        );

        Ok(Self::new(
            Arc::new(Mutex::new(conn)),
            Arc::new(storage),
            Arc::new(geocoder),
            Arc::new(scorer),
            Arc::new(generator),
            Arc::new(config),
        ))
    }

    pub fn config(&self) -> &DiaryConfig {
        &self.config
    }

    /// Run `f` on the blocking pool with the connection locked.
    async fn with_db<T, F>(&self, f: F) -> DiaryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DiaryResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut *conn)
        })
        .await?
    }

    /// Storage calls are bounded like every other port, but a timeout is an error here.
    async fn storage_call<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        let limit = self.config.services.timeout();
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StorageError::Timeout(limit))?
    }

    /// Best-effort removal of storage objects whose records are already gone.
    async fn cleanup_objects(&self, urls: &[String]) -> usize {
        let mut failed = 0;
        for url in urls {
            if let Err(e) = self.storage_call(self.storage.delete(url)).await {
                failed += 1;
                let inconsistency = DiaryError::StorageInconsistency(format!("{url}: {e}"));
                tracing::warn!(error = %inconsistency, "orphaned storage object left behind");
            }
        }
        failed
    }

    /// Reconcile after a commit. The diary is already saved, so a failure is
    /// only logged; the next reconcile fixes the links.
    async fn reconcile_after_commit(&self, diary_id: i64) {
        if let Err(e) = self.reconcile_diary(diary_id).await {
            tracing::warn!(diary_id, error = %e, "album reconcile failed after commit");
        }
    }

    // ---- photos ----

    /// Store the bytes and record a temporary photo. If the record cannot be
    /// written, the stored object is removed again.
    pub async fn upload_photo(&self, owner_id: i64, bytes: Vec<u8>, meta: UploadMeta) -> DiaryResult<PhotoAsset> {
        if bytes.is_empty() {
            return Err(DiaryError::validation("uploaded file is empty"));
        }
        if meta.latitude.is_some() != meta.longitude.is_some() {
            return Err(DiaryError::validation("latitude and longitude must be given together"));
        }

        let object = ObjectMeta {
            owner_id,
            file_name: meta.file_name.clone(),
            content_type: meta.content_type.clone(),
        };
        let url = self.storage_call(self.storage.put(bytes, &object)).await?;

        let stored_url = url.clone();
        let inserted = self
            .with_db(move |conn| photos::insert_photo(conn, owner_id, &stored_url, &meta))
            .await;

        if inserted.is_err() {
            self.cleanup_objects(std::slice::from_ref(&url)).await;
        }
        inserted
    }

    pub async fn list_temporary(&self, owner_id: i64) -> DiaryResult<Vec<PhotoAsset>> {
        self.with_db(move |conn| photos::list_temporary(conn, owner_id)).await
    }

    /// Fix the selection order and drop every other temporary photo.
    pub async fn finalize_selection(&self, owner_id: i64, ordered_ids: Vec<i64>) -> DiaryResult<Vec<PhotoAsset>> {
        let max = self.config.photos.max_selection;
        let outcome = self
            .with_db(move |conn| photos::finalize_selection(conn, owner_id, &ordered_ids, max))
            .await?;

        let urls: Vec<String> = outcome.discarded.into_iter().map(|p| p.url).collect();
        self.cleanup_objects(&urls).await;
        Ok(outcome.photos)
    }

    /// Delete a temporary photo. The storage object goes first; if that fails
    /// the record is kept and the error returned.
    pub async fn delete_photo(&self, owner_id: i64, photo_id: i64) -> DiaryResult<()> {
        let photo = self
            .with_db(move |conn| photos::authorize_photo_delete(conn, owner_id, photo_id))
            .await?;

        self.storage_call(self.storage.delete(&photo.url)).await?;

        self.with_db(move |conn| photos::delete_photo_record(conn, owner_id, photo_id))
            .await?;
        tracing::info!(owner_id, photo_id, "photo deleted");
        Ok(())
    }

    // ---- recommendation ----

    /// Mandatory photos plus the scorer's picks, capped. Never fails because
    /// of the scorer.
    pub async fn recommend(
        &self,
        owner_id: i64,
        uploaded_ids: Vec<i64>,
        mandatory_ids: Vec<i64>,
    ) -> DiaryResult<Vec<i64>> {
        let plan = self
            .with_db(move |conn| recommend::plan_recommendation(conn, owner_id, &uploaded_ids, &mandatory_ids))
            .await?;

        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let scored = if plan.needs_scorer() {
            bounded("scorer", self.config.services.timeout(), self.scorer.score(&plan.descriptors))
                .await
                .flatten()
        } else {
            None
        };

        let result = recommend::merge_recommendation(&plan, scored, self.config.photos.recommendation_cap);
        tracing::debug!(owner_id, candidates = plan.descriptors.len(), picked = result.len(), "recommendation ready");
        Ok(result)
    }

    // ---- diaries ----

    pub async fn create_diary_manual(
        &self,
        owner_id: i64,
        draft: DiaryDraft,
        new_photos: Vec<NewPhoto>,
    ) -> DiaryResult<Diary> {
        let max = self.config.photos.max_selection;
        let created = self
            .with_db(move |conn| diary::create_diary_manual(conn, owner_id, &draft, &new_photos, max))
            .await?;
        self.reconcile_after_commit(created.id).await;
        Ok(created)
    }

    /// Create a diary from uploaded photos with generated text. When the
    /// generator is unavailable the configured degraded message is used.
    pub async fn create_diary_auto(
        &self,
        owner_id: i64,
        title: String,
        mood: Option<String>,
        photo_ids: Vec<i64>,
    ) -> DiaryResult<Diary> {
        let candidates = self
            .with_db(move |conn| diary::collect_auto_photos(conn, owner_id, &photo_ids))
            .await?;
        if candidates.is_empty() {
            return Err(DiaryError::validation("no eligible photos for an automatic diary"));
        }
        let max = self.config.photos.max_selection;
        if candidates.len() > max {
            return Err(DiaryError::validation(format!(
                "diary has {} photos, at most {max} allowed",
                candidates.len()
            )));
        }

        let urls: Vec<String> = candidates.iter().map(|p| p.url.clone()).collect();
        let content = bounded("generator", self.config.services.timeout(), self.generator.generate(&urls))
            .await
            .unwrap_or_else(|| self.config.services.degraded_message.clone());

        let draft = DiaryDraft { title, content, mood };
        let created = self
            .with_db(move |conn| diary::create_diary_auto(conn, owner_id, &draft, &candidates, max))
            .await?;
        self.reconcile_after_commit(created.id).await;
        Ok(created)
    }

    pub async fn get_diary(&self, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
        self.with_db(move |conn| diary::get_diary(conn, owner_id, diary_id)).await
    }

    pub async fn list_diaries(&self, owner_id: i64) -> DiaryResult<Vec<Diary>> {
        self.with_db(move |conn| diary::list_diaries(conn, owner_id)).await
    }

    pub async fn list_trash(&self, owner_id: i64) -> DiaryResult<Vec<Diary>> {
        self.with_db(move |conn| diary::list_trash(conn, owner_id)).await
    }

    pub async fn set_favorite(&self, owner_id: i64, diary_id: i64, favorite: bool) -> DiaryResult<Diary> {
        self.with_db(move |conn| diary::set_favorite(conn, owner_id, diary_id, favorite))
            .await
    }

    pub async fn soft_delete_diary(&self, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
        self.with_db(move |conn| trash::soft_delete_diary(conn, owner_id, diary_id))
            .await
    }

    /// Bring a diary back from the trash and re-check its album links.
    pub async fn restore_diary(&self, owner_id: i64, diary_id: i64) -> DiaryResult<Diary> {
        let restored = self
            .with_db(move |conn| trash::restore_diary(conn, owner_id, diary_id))
            .await?;
        self.reconcile_after_commit(diary_id).await;
        Ok(restored)
    }

    /// Permanently remove a diary, then its storage objects.
    pub async fn purge_diary(&self, owner_id: i64, diary_id: i64) -> DiaryResult<PurgedDiary> {
        let purged = self
            .with_db(move |conn| trash::purge_diary(conn, owner_id, diary_id))
            .await?;
        self.cleanup_objects(&purged.photo_urls).await;
        Ok(purged)
    }

    pub async fn list_expired_trash(&self, now: DateTime<Utc>) -> DiaryResult<Vec<TrashCandidate>> {
        let retention = self.config.trash.retention_days;
        self.with_db(move |conn| trash::find_expired_trash(conn, now, retention))
            .await
    }

    /// Retention sweep. Storage cleanup runs after the database work, one
    /// diary at a time, and never fails the sweep.
    pub async fn purge_expired_trash(&self, now: DateTime<Utc>) -> DiaryResult<SweepReport> {
        let retention = self.config.trash.retention_days;
        let report = self
            .with_db(move |conn| trash::purge_expired_trash(conn, now, retention))
            .await?;

        for purged in &report.purged {
            let orphaned = self.cleanup_objects(&purged.photo_urls).await;
            if orphaned > 0 {
                tracing::warn!(diary_id = purged.diary_id, orphaned, "purged diary left storage objects behind");
            }
        }
        Ok(report)
    }

    // ---- locations & albums ----

    /// Geocode one batch of pending photos and reconcile the diaries they
    /// belong to. The lock is released while the geocoder runs.
    pub async fn resolve_locations(&self) -> DiaryResult<LocationReport> {
        let batch = self.config.locations.batch_size;
        let max_attempts = self.config.locations.max_attempts;
        let pending = self
            .with_db(move |conn| locations::pending_locations(conn, batch, max_attempts))
            .await?;

        let mut report = LocationReport::default();
        let mut touched = Vec::new();
        let limit = self.config.services.timeout();

        for photo in pending {
            let answer = bounded("geocoder", limit, self.geocoder.resolve(photo.latitude, photo.longitude)).await;
            let photo_id = photo.photo_id;

            let Some(location) = answer else {
                report.failed += 1;
                self.with_db(move |conn| locations::record_geocode_failure(conn, photo_id))
                    .await?;
                continue;
            };

            if location.is_some() {
                report.resolved += 1;
            } else {
                report.unknown += 1;
            }
            let diary_id = self
                .with_db(move |conn| locations::apply_location(conn, photo_id, location.as_ref()))
                .await?;
            if let Some(diary_id) = diary_id {
                if !touched.contains(&diary_id) {
                    touched.push(diary_id);
                }
            }
        }

        for diary_id in touched {
            match self.reconcile_diary(diary_id).await {
                Ok(outcome) if !outcome.is_noop() => report.diaries_updated.push(diary_id),
                Ok(_) => {}
                Err(e) => tracing::warn!(diary_id, error = %e, "album reconcile failed after geocoding"),
            }
        }

        tracing::info!(
            resolved = report.resolved,
            unknown = report.unknown,
            failed = report.failed,
            diaries_updated = report.diaries_updated.len(),
            "location sweep complete"
        );
        Ok(report)
    }

    pub async fn reconcile_diary(&self, diary_id: i64) -> DiaryResult<ReconcileReport> {
        let album_config = self.config.albums.clone();
        self.with_db(move |conn| albums::reconcile(conn, diary_id, &album_config))
            .await
    }

    pub async fn list_albums(&self, owner_id: i64) -> DiaryResult<Vec<AlbumSummary>> {
        self.with_db(move |conn| albums::list_albums(conn, owner_id)).await
    }

    pub async fn list_album_diaries(&self, owner_id: i64, album_id: i64) -> DiaryResult<Vec<Diary>> {
        self.with_db(move |conn| albums::list_album_diaries(conn, owner_id, album_id))
            .await
    }
}
