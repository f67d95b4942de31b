//! Photo diary engine: photo lifecycle, AI-assisted photo recommendation,
//! location albums and a trash with timed purge.
//!
//! Users upload photos, which stay *temporary* until they are finalized into
//! an ordered selection and attached to a diary. Diaries are filed into albums
//! derived from where their photos were taken. Deleted diaries sit in a trash
//! for a retention window before they are purged with their photos.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with an audit log of every lifecycle mutation
//! - **Engine**: synchronous, transactional operations over a `rusqlite::Connection`
//! - **Ports**: object storage, reverse geocoding, AI scorer and AI diary writer,
//!   each behind an async trait with local / HTTP adapters
//! - **Service**: async facade that keeps external calls outside the database
//!   lock and bounds each one with a timeout
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`engine`]: Photos, recommendation, diaries, albums, trash, locations
//! - [`ports`]: External collaborator traits and their adapters
//! - [`service`]: [`service::DiaryService`], the async entry point

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ports;
pub mod service;
