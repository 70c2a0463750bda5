/// GM Tea activity CLI
///
/// ```bash
/// gmtea-activity activity 0xYourAddress --grouped
/// gmtea-activity grid 0xYourAddress
/// gmtea-activity profile 0xYourAddress
/// gmtea-activity serve --bind 0.0.0.0:3005
/// ```

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use gmtea_activity::activity::{build_service, parse_address};
use gmtea_activity::backend::BackendClient;
use gmtea_activity::classifier::tier_name;
use gmtea_activity::clock::{Clock, SystemClock};
use gmtea_activity::config::init_global_config;
use gmtea_activity::feed::{ActivityFeed, FeedStatus};
use gmtea_activity::metrics;
use gmtea_activity::multichain::{checkin_grid, connect_all};
use gmtea_activity::presentation::{display_label, group_by_day, relative_time, ActivityFilter};
use gmtea_activity::server::{create_router, AppState};
use gmtea_activity::telemetry::{init_tracing, TelemetryConfig};
use gmtea_activity::types::{Activity, ActivityKind};

#[derive(Parser, Debug)]
#[clap(name = "gmtea-activity")]
#[clap(about = "Reconstruct GM Tea on-chain activity history", long_about = None)]
struct Args {
    /// Config file (TOML); GMTEA_* environment variables override it
    #[clap(long, default_value = "config.toml")]
    config: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the activity history of an address
    Activity {
        address: String,
        /// Ignore the cache and rebuild from chain data
        #[clap(long)]
        refresh: bool,
        /// Group by day
        #[clap(long)]
        grouped: bool,
        /// Only one activity type (checkin, badge, username, reward)
        #[clap(long = "type")]
        kind: Option<String>,
        /// Print JSON instead of text
        #[clap(long)]
        json: bool,
    },
    /// Check-in status on every configured chain
    Grid { address: String },
    /// Points, profile and badges from the GM Tea backend
    Profile { address: String },
    /// Serve the JSON API
    Serve {
        /// Overrides server.bind
        #[clap(long)]
        bind: Option<String>,
    },
}

fn print_activity(activity: &Activity, now: u64) {
    let reference = if activity.is_placeholder() {
        "(estimated)".to_string()
    } else {
        format!("block {}", activity.block_number)
    };
    println!(
        "  {:<10} {:<28} {:<36} {}",
        relative_time(activity.timestamp, now),
        display_label(activity),
        activity.subtitle,
        reference
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_tracing(TelemetryConfig::default())?;
    metrics::register_metrics()?;
    let settings = init_global_config(&args.config)?;

    match args.command {
        Command::Activity {
            address,
            refresh,
            grouped,
            kind,
            json,
        } => {
            let user = parse_address(&address)?;
            let kind = match kind.as_deref() {
                Some(k) => Some(ActivityKind::parse(k).ok_or_else(|| format!("Unknown activity type: {}", k))?),
                None => None,
            };
            let service = build_service(settings)?;
            if refresh {
                service.invalidate(user);
            }

            let mut feed = ActivityFeed::new(service, user).with_timeout(settings.load_timeout());
            if feed.mount().await.refreshing {
                info!(user = %user, "Showing cached history while refreshing");
                feed.finish_refresh().await;
            }

            let state = feed.state();
            if state.status == FeedStatus::Error {
                let message = state.error.clone().unwrap_or_default();
                return Err(message.into());
            }

            let filter = ActivityFilter {
                kind,
                ..ActivityFilter::all()
            };
            let activities = filter.apply(&state.activities);
            let now = SystemClock.now_secs();

            if json {
                if grouped {
                    println!("{}", serde_json::to_string_pretty(&group_by_day(&activities, now))?);
                } else {
                    println!("{}", serde_json::to_string_pretty(&activities)?);
                }
                return Ok(());
            }

            if activities.is_empty() {
                println!("No activities yet for {}", user);
                return Ok(());
            }

            println!("📜 {} activities for {}", activities.len(), user);
            if grouped {
                for day in group_by_day(&activities, now) {
                    println!("\n{}", day.label);
                    for activity in &day.activities {
                        print_activity(activity, now);
                    }
                }
            } else {
                for activity in &activities {
                    print_activity(activity, now);
                }
            }
            let estimated = activities.iter().filter(|a| a.is_placeholder()).count();
            if estimated > 0 {
                println!("\n{} check-ins are estimated (details outside the scanned block range)", estimated);
            }
        }
        Command::Grid { address } => {
            let user = parse_address(&address)?;
            if settings.chains.is_empty() {
                return Err("No chains configured ([[chains]] in config)".into());
            }
            let chains = connect_all(&settings.chains, settings.rate_limit());
            let grid = checkin_grid(&chains, user, settings.batch_policy(), SystemClock.now_secs()).await;

            for entry in grid {
                match (entry.status, entry.error) {
                    (Some(status), _) => println!(
                        "✅ {:<20} check-ins: {:<5} {}",
                        entry.chain,
                        status.checkin_count,
                        if status.can_check_in { "ready" } else { "checked in today" }
                    ),
                    (None, error) => println!(
                        "❌ {:<20} {}",
                        entry.chain,
                        error.unwrap_or_else(|| "unknown error".to_string())
                    ),
                }
            }
        }
        Command::Profile { address } => {
            let user = parse_address(&address)?.to_string();
            let client = BackendClient::new(
                &settings.backend.url,
                Duration::from_secs(settings.backend.timeout_secs),
            )?;

            match client.user(&user).await {
                Ok(profile) => println!(
                    "👤 {} ({} check-ins, referred by {})",
                    profile.username.as_deref().unwrap_or("no username"),
                    profile.checkin_count,
                    profile.referrer.as_deref().unwrap_or("nobody")
                ),
                Err(e) => eprintln!("❌ Profile unavailable: {}", e),
            }
            match client.points(&user).await {
                Ok(points) => println!(
                    "⭐ {} points (check-ins {}, badges {}, referrals {})",
                    points.total, points.checkin_points, points.badge_points, points.referral_points
                ),
                Err(e) => eprintln!("❌ Points unavailable: {}", e),
            }
            match client.badges(&user).await {
                Ok(badges) => {
                    println!("🏅 {} badges", badges.len());
                    for badge in badges {
                        println!("  {} Badge #{}", tier_name(badge.tier), badge.token_id);
                    }
                }
                Err(e) => eprintln!("❌ Badges unavailable: {}", e),
            }
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
            let state = Arc::new(AppState::new(build_service(settings)?, settings.rpc.explorer_url.clone()));

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(bind = %bind, "Activity API listening");
            axum::serve(listener, create_router(state)).await?;
        }
    }

    Ok(())
}
