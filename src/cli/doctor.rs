//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use phodiary::config::DiaryConfig;
use phodiary::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &DiaryConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on first use of any other command.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Phodiary Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Media directory:   {}", config.resolved_media_dir().display());
    println!();
    println!("Row counts:");
    println!("  Diaries:         {}", report.diary_count);
    println!("  In trash:        {}", report.trashed_count);
    println!("  Photos:          {}", report.photo_count);
    println!("  Temporary:       {}", report.temporary_photo_count);
    println!("  Albums:          {}", report.album_count);
    println!("  Audit log:       {}", report.log_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Stop anything writing to the database.");
        println!("  2. Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
