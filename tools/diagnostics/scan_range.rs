use std::env;

use gmtea_activity::config::Settings;
use gmtea_activity::events::EventSignature;
use gmtea_activity::provider::{ChainProvider, RpcChainProvider};
use gmtea_activity::scanner::block_chunks;
use gmtea_activity::types::LogQuery;

/// Bytes of log data shown per line
const DATA_PREVIEW: usize = 32;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: scan-range <from_block> <to_block> [config.toml]");
        std::process::exit(1);
    }
    let from_block: u64 = args[1].parse()?;
    let to_block: u64 = args[2].parse()?;
    let config_path = args.get(3).map(String::as_str).unwrap_or("config.toml");

    let settings = Settings::load(config_path)?;
    let contracts = settings.contract_addresses()?;
    let provider = RpcChainProvider::connect(&settings.rpc.url, settings.rate_limit())?;
    println!("Scanning {}..={} on {}", from_block, to_block, provider.url());

    let mut total = 0usize;
    for (from, to) in block_chunks(from_block, to_block, settings.scan.chunk_size) {
        for (kind, address) in contracts.all() {
            let query = LogQuery {
                address,
                from_block: from,
                to_block: to,
            };
            let logs = match provider.logs(&query).await {
                Ok(logs) => logs,
                Err(e) => {
                    eprintln!("❌ {} {}..={}: {}", kind.as_str(), from, to, e);
                    continue;
                }
            };
            for log in logs {
                total += 1;
                let event = log
                    .topic0()
                    .and_then(|topic| EventSignature::identify(kind, topic))
                    .map(|sig| sig.name())
                    .unwrap_or("unknown");
                let preview = &log.data[..log.data.len().min(DATA_PREVIEW)];
                println!(
                    "{:>10}  {:<9} {:<20} {}  data={}{}",
                    log.block_number.unwrap_or_default(),
                    kind.as_str(),
                    event,
                    log.transaction_hash.map(|h| h.to_string()).unwrap_or_default(),
                    hex::encode(preview),
                    if log.data.len() > DATA_PREVIEW { "..." } else { "" }
                );
            }
        }
    }

    println!("{} logs", total);
    Ok(())
}
