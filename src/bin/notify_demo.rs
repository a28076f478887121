//! Demo that pushes one sample event of each kind through the configured sink
//! (log only when DISCORD_WEBHOOK_URL is unset).

use chrono::Utc;
use cs2_update_tracker::notify::EventField;
use cs2_update_tracker::{sink_from_config, TrackerConfig, UpdateEvent, UpdateKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = TrackerConfig::load_default()?;
    let sink = sink_from_config(&cfg);

    let events = [
        UpdateEvent::new(UpdateKind::Depot, "CS2 Steam Depot Update Detected", Utc::now())
            .with_summary("A new build has been pushed to Steam")
            .with_field(EventField::new("Build ID", "`0000000`").inline()),
        UpdateEvent::new(UpdateKind::News, "Counter-Strike 2 Update", Utc::now())
            .with_summary("demo summary")
            .with_url("https://store.steampowered.com/news/app/730")
            .with_field(EventField::new("Author", "Valve").inline()),
        UpdateEvent::new(UpdateKind::Change, "SteamDB: CS2 Database Change", Utc::now())
            .with_field(EventField::new("Change ID", "`0`").inline()),
    ];

    for ev in &events {
        if let Err(e) = sink.notify(ev).await {
            tracing::warn!(error = %e, title = ev.title(), "demo delivery failed");
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("notify-demo done");
    Ok(())
}
