use std::env;

use gmtea_activity::cache::LocalActivityCache;
use gmtea_activity::clock::{Clock, SystemClock};
use gmtea_activity::config::Settings;
use gmtea_activity::store::FileStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: inspect-cache <address> [config.toml]");
        std::process::exit(1);
    }
    let address = &args[1];
    let config_path = args.get(2).map(String::as_str).unwrap_or("config.toml");

    let settings = Settings::load(config_path)?;
    let dir = settings
        .cache
        .dir
        .clone()
        .ok_or("cache.dir is not set; the in-memory cache cannot be inspected")?;

    println!("Opening cache: {}", dir.display());
    let cache = LocalActivityCache::new(FileStore::open(&dir)?);

    let entry = match cache.peek(address) {
        Some(entry) => entry,
        None => {
            eprintln!("No readable cache entry for {}", address.to_lowercase());
            std::process::exit(2);
        }
    };

    let age_ms = SystemClock.now_ms().saturating_sub(entry.timestamp);
    let fresh = age_ms as u128 <= settings.cache_ttl().as_millis();
    println!("Entry written {}s ago ({})", age_ms / 1000, if fresh { "fresh" } else { "expired" });
    println!("Activities: {}", entry.data.len());

    let placeholders = entry.data.iter().filter(|a| a.is_placeholder()).count();
    println!("Placeholders: {}", placeholders);

    for activity in &entry.data {
        println!(
            "  {:>10}  {:<9} {:<22} {:<34} block {}",
            activity.timestamp, activity.kind, activity.title, activity.subtitle, activity.block_number
        );
    }
    Ok(())
}
