//! CLI `purge-trash` command, meant to be run from cron.

use anyhow::Result;
use chrono::Utc;

use phodiary::service::DiaryService;

/// Purge diaries that have sat in the trash past the retention window.
pub async fn purge_trash(service: &DiaryService, dry_run: bool) -> Result<()> {
    let now = Utc::now();
    let retention = service.config().trash.retention_days;

    if dry_run {
        let candidates = service.list_expired_trash(now).await?;
        if candidates.is_empty() {
            println!("No diaries older than {retention} days in the trash.");
            return Ok(());
        }
        println!("Would purge {} diaries:", candidates.len());
        for c in &candidates {
            println!("  [{}] owner {} \"{}\" (trashed {})", c.diary_id, c.owner_id, c.title, c.deleted_at);
        }
        return Ok(());
    }

    let report = service.purge_expired_trash(now).await?;
    if report.purged.is_empty() && report.failed.is_empty() {
        println!("No diaries older than {retention} days in the trash.");
        return Ok(());
    }

    let photos: usize = report.purged.iter().map(|p| p.photo_urls.len()).sum();
    println!("Purged {} diaries ({photos} photos).", report.purged.len());
    for failure in &report.failed {
        println!("  FAILED [{}]: {}", failure.diary_id, failure.error);
    }
    Ok(())
}
