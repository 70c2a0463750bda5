pub mod activity;
pub mod backend;
pub mod cache;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod contracts;
pub mod events;
pub mod feed;
pub mod metrics;
pub mod multichain;
pub mod presentation;
pub mod provider;
pub mod ratelimit;
pub mod reconcile;
pub mod scanner;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_support;
