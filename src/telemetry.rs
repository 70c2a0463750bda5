/// Telemetry - structured logging with tracing
///
/// - RUST_LOG filter (default: info)
/// - GMTEA_LOG_FORMAT: "json" or "pretty"
/// - GMTEA_LOG_FILE: optional log file, rotated daily
/// - truncation helpers for hashes and lists in log fields

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
    /// Log format: "json" or "pretty"
    pub log_format: String,
    /// Optional log file path (None = console only)
    pub log_file: Option<String>,
    /// Rotation interval: "daily", "hourly", "never"
    pub rotation: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: std::env::var("GMTEA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            log_file: std::env::var("GMTEA_LOG_FILE").ok(),
            rotation: "daily".to_string(),
        }
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let Some(log_file_path) = config.log_file else {
        if config.log_format == "json" {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(true))
                .try_init()?;
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(false).with_line_number(true))
                .try_init()?;
        }
        return Ok(());
    };

    let path = std::path::Path::new(&log_file_path);
    let directory = path
        .parent()
        .ok_or("Invalid log file path: no parent directory")?;
    let file_name = path
        .file_name()
        .ok_or("Invalid log file path: no filename")?;
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("Invalid log file path: no filename")?;

    let file_appender = match config.rotation.as_str() {
        "hourly" => rolling::hourly(directory, prefix),
        "never" => rolling::never(directory, file_name),
        _ => rolling::daily(directory, prefix),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(non_blocking),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .try_init()?;
    }

    // Guard must outlive the process or buffered lines are lost
    std::mem::forget(guard);
    Ok(())
}

/// Truncate a hex string for log fields
///
/// Example: "0x0a1b2c3d4e5f67890a1b..." with len 10 → "0x0a1b2c3d..."
pub fn truncate_hex(hex: &str, len: usize) -> String {
    if hex.len() <= len {
        hex.to_string()
    } else {
        format!("{}...", &hex[..len])
    }
}

/// First `max` items, with the total when cut
///
/// Example: ["a", "b", "c", "d"] (max 2) → "[2 of 4]: [\"a\", \"b\"]"
pub fn truncate_list<T: std::fmt::Display>(items: &[T], max: usize) -> String {
    let preview: Vec<String> = items.iter().take(max).map(|i| i.to_string()).collect();
    if items.len() <= max {
        format!("{:?}", preview)
    } else {
        format!("[{} of {}]: {:?}", max, items.len(), preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_hex() {
        assert_eq!(truncate_hex("0xabcd", 18), "0xabcd");
        assert_eq!(
            truncate_hex("0x0123456789abcdef0123456789abcdef", 18),
            "0x0123456789abcdef..."
        );
        assert_eq!(truncate_hex("", 16), "");
    }

    #[test]
    fn test_truncate_list() {
        assert_eq!(truncate_list(&["tea", "sepolia"], 3), "[\"tea\", \"sepolia\"]");
        assert_eq!(
            truncate_list(&[1, 2, 3, 4], 2),
            "[2 of 4]: [\"1\", \"2\"]"
        );
    }

    #[test]
    fn test_default_reads_env() {
        let config = TelemetryConfig::default();
        assert_eq!(config.rotation, "daily");
        assert!(!config.log_level.is_empty());
    }
}
