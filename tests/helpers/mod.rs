#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use phodiary::config::DiaryConfig;
use phodiary::db;
use phodiary::engine::types::ResolvedLocation;
use phodiary::error::StorageError;
use phodiary::ports::{AiGeneratorPort, AiScorerPort, GeocodePort, ObjectMeta, ScoringDescriptor, StoragePort};
use phodiary::service::DiaryService;
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// In-process object store. Deletes can be switched to fail.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next: AtomicUsize,
    pub fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn contains(&self, url: &str) -> bool {
        self.objects.lock().unwrap().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn put(&self, bytes: Vec<u8>, meta: &ObjectMeta) -> Result<String, StorageError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let url = format!("mem://{}/{n}.jpg", meta.owner_id);
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        if !url.starts_with("mem://") {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Request("storage offline".into()));
        }
        self.objects.lock().unwrap().remove(url);
        Ok(())
    }
}

/// Scripted scorer.
pub enum StubScorer {
    Answer(Vec<i64>),
    Declines,
    Fails,
    Hangs,
}

pub struct CountingScorer {
    pub behaviour: StubScorer,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AiScorerPort for CountingScorer {
    async fn score(&self, _descriptors: &[ScoringDescriptor]) -> Result<Option<Vec<i64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            StubScorer::Answer(ids) => Ok(Some(ids.clone())),
            StubScorer::Declines => Ok(None),
            StubScorer::Fails => anyhow::bail!("scorer unreachable"),
            StubScorer::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

/// Generator that answers with fixed text, or fails when given none.
pub struct StubGenerator(pub Option<String>);

pub struct CountingGenerator {
    pub behaviour: StubGenerator,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AiGeneratorPort for CountingGenerator {
    async fn generate(&self, _image_urls: &[String]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour.0 {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("generator unreachable"),
        }
    }
}

/// Geocoder with a fixed answer for every coordinate.
pub enum StubGeocoder {
    Known(ResolvedLocation),
    Unknown,
    Fails,
}

#[async_trait]
impl GeocodePort for StubGeocoder {
    async fn resolve(&self, _latitude: f64, _longitude: f64) -> Result<Option<ResolvedLocation>> {
        match self {
            StubGeocoder::Known(location) => Ok(Some(location.clone())),
            StubGeocoder::Unknown => Ok(None),
            StubGeocoder::Fails => anyhow::bail!("geocoder unreachable"),
        }
    }
}

/// A service over an in-memory database and stub ports, with handles kept
/// for assertions.
pub struct Harness {
    pub service: DiaryService,
    pub db: Arc<Mutex<Connection>>,
    pub storage: Arc<MemoryStorage>,
    pub scorer: Arc<CountingScorer>,
    pub generator: Arc<CountingGenerator>,
}

impl Harness {
    pub fn new(scorer: StubScorer, generator: StubGenerator, geocoder: StubGeocoder) -> Self {
        let mut config = DiaryConfig::default();
        config.services.timeout_secs = 1;

        let db = Arc::new(Mutex::new(test_db()));
        let storage = Arc::new(MemoryStorage::default());
        let scorer = Arc::new(CountingScorer {
            behaviour: scorer,
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(CountingGenerator {
            behaviour: generator,
            calls: AtomicUsize::new(0),
        });

        let service = DiaryService::new(
            Arc::clone(&db),
            Arc::clone(&storage) as Arc<dyn StoragePort>,
            Arc::new(geocoder),
            Arc::clone(&scorer) as Arc<dyn AiScorerPort>,
            Arc::clone(&generator) as Arc<dyn AiGeneratorPort>,
            Arc::new(config),
        );

        Self {
            service,
            db,
            storage,
            scorer,
            generator,
        }
    }

    /// Everything healthy; the geocoder places every photo in Seoul.
    pub fn healthy() -> Self {
        Self::new(
            StubScorer::Declines,
            StubGenerator(Some("A quiet day by the river.".into())),
            StubGeocoder::Known(ResolvedLocation::new("Korea", "Seoul", "Seoul")),
        )
    }

    pub fn scorer_calls(&self) -> usize {
        self.scorer.calls.load(Ordering::SeqCst)
    }

    pub fn generator_calls(&self) -> usize {
        self.generator.calls.load(Ordering::SeqCst)
    }

    /// Upload `count` photos for `owner`, optionally with coordinates.
    pub async fn upload(&self, owner: i64, count: usize, coords: Option<(f64, f64)>) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let meta = phodiary::engine::types::UploadMeta {
                file_name: Some(format!("IMG_{i:04}.jpg")),
                content_type: Some("image/jpeg".into()),
                captured_at: None,
                latitude: coords.map(|c| c.0),
                longitude: coords.map(|c| c.1),
            };
            let photo = self.service.upload_photo(owner, vec![0xFF, 0xD8, i as u8], meta).await.unwrap();
            ids.push(photo.id);
        }
        ids
    }

    /// Push a diary's deletion time `days_ago` into the past.
    pub fn backdate_deletion(&self, diary_id: i64, days_ago: i64) {
        let at = db::timestamp(chrono::Utc::now() - chrono::Duration::days(days_ago));
        self.db
            .lock()
            .unwrap()
            .execute(
                "UPDATE diaries SET deleted_at = ?1 WHERE id = ?2",
                rusqlite::params![at, diary_id],
            )
            .unwrap();
    }
}
