pub mod types;
pub mod utils;
pub mod fingerprint;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod store;
pub mod config;
pub mod recipients;
pub mod ingest;
pub mod digest;
pub mod planner;
pub mod delivery;
pub mod cycle;
pub mod schedule;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use sources::HttpFeedSource;
pub use store::ItemStore;
pub use config::{DigestOptions, Group, GroupTable, Settings};
pub use recipients::RecipientResolver;
pub use ingest::Ingestor;
pub use digest::{DigestRenderer, RenderedDigest};
pub use planner::{DispatchPlan, DispatchPlanner, GroupBatch};
pub use delivery::DeliveryExecutor;
pub use cycle::DigestCycle;
