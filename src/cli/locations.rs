//! CLI `resolve-locations` command.

use anyhow::Result;

use phodiary::service::DiaryService;

/// Run one geocoding batch over photos still missing a location.
pub async fn resolve_locations(service: &DiaryService) -> Result<()> {
    let report = service.resolve_locations().await?;

    if report.resolved + report.unknown + report.failed == 0 {
        println!("No photos waiting for a location.");
        return Ok(());
    }

    println!("Location sweep:");
    println!("  Resolved:        {}", report.resolved);
    println!("  Unknown:         {}", report.unknown);
    println!("  Failed:          {}", report.failed);
    if !report.diaries_updated.is_empty() {
        println!("  Diaries re-filed: {:?}", report.diaries_updated);
    }
    Ok(())
}
