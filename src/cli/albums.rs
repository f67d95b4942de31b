//! CLI `reconcile` and `albums` commands.

use anyhow::Result;

use phodiary::service::DiaryService;

/// Re-derive one diary's album links from its photos.
pub async fn reconcile(service: &DiaryService, diary_id: i64) -> Result<()> {
    let report = service.reconcile_diary(diary_id).await?;

    if report.skipped {
        println!("Diary {diary_id} is in the trash or has no photos; nothing to do.");
    } else if report.is_noop() {
        println!("Diary {diary_id} album links are up to date.");
    } else {
        for name in &report.added {
            println!("  + {name}");
        }
        for name in &report.removed {
            println!("  - {name}");
        }
    }
    Ok(())
}

/// List an owner's albums with their active diary counts.
pub async fn albums(service: &DiaryService, owner_id: i64) -> Result<()> {
    let albums = service.list_albums(owner_id).await?;

    if albums.is_empty() {
        println!("No albums for owner {owner_id}.");
        return Ok(());
    }

    println!("{:<6} {:<32} {}", "ID", "ALBUM", "DIARIES");
    for summary in &albums {
        println!(
            "{:<6} {:<32} {}",
            summary.album.id, summary.album.name, summary.diary_count
        );
    }
    Ok(())
}
