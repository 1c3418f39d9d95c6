//! usercache CLI
//!
//! Measures payload sizes of every pipeline, then caches a generated user
//! set through the configured pipeline and reads every bucket back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          usercache                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │     Size     │───▶│  UserCache   │───▶│    Store     │       │
//! │  │    Report    │    │   Service    │    │ (mem/Redis)  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use futures::future::try_join_all;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use usercache::adapters::{InMemoryCacheStore, RedisCacheStore};
use usercache::domain::{CacheStore, ValueStore};
use usercache::pipeline::all_configs;
use usercache::report::{generate_projections, generate_users, SizeReport};
use usercache::{
    BucketKey, CodecFormat, CodecPipeline, CompressionAlgorithm, CompressionConfig,
    DecodeFailurePolicy, DuplicatePolicy, PipelineConfig, UserCacheService,
};

/// Prefix of the plain values written for size comparison
const COMPARE_PREFIX: &str = "compare:";

// =============================================================================
// CLI Arguments
// =============================================================================

/// usercache - Bucketed user marketing cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serialization format (graph, compact-map)
    #[arg(long, env = "USERCACHE_CODEC", default_value = "compact-map")]
    codec: String,

    /// Compression algorithm (gzip, lz4, zstd, none)
    #[arg(long, env = "USERCACHE_COMPRESSION", default_value = "zstd")]
    compression: String,

    /// Compression level (algorithm default when unset)
    #[arg(long, env = "USERCACHE_LEVEL")]
    level: Option<i32>,

    /// Number of generated users
    #[arg(long, env = "USERCACHE_RECORDS", default_value = "10000")]
    records: usize,

    /// Redis URL; the in-memory store is used when unset
    #[arg(long, env = "USERCACHE_REDIS_URL")]
    redis_url: Option<String>,

    /// Replace cached entries with the same identifier instead of keeping both
    #[arg(long, env = "USERCACHE_REPLACE_BY_ID")]
    replace_by_id: bool,

    /// Leave undecodable members out of fetched buckets instead of failing
    #[arg(long, env = "USERCACHE_SKIP_UNDECODABLE")]
    skip_undecodable: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "USERCACHE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "USERCACHE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let codec: CodecFormat = self.codec.parse()?;

        let compression = match self.compression.to_lowercase().as_str() {
            "none" | "off" => None,
            name => {
                let algorithm: CompressionAlgorithm = name.parse()?;
                let mut config = CompressionConfig::new(algorithm);
                if let Some(level) = self.level {
                    config = config.with_level(level);
                }
                Some(config)
            }
        };

        if compression.is_none() && self.level.is_some() {
            bail!("--level needs a compression algorithm");
        }

        Ok(PipelineConfig { codec, compression })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = args.pipeline_config()?;
    let pipeline = Arc::new(CodecPipeline::new(config).context("invalid pipeline")?);

    info!("Starting usercache");
    info!("  Pipeline: {}", pipeline.describe());
    info!("  Records: {}", args.records);

    // Size comparison over every pipeline
    let report = SizeReport::measure(&generate_projections(args.records), &all_configs())
        .context("size report failed")?;
    report.log();
    if let Some(smallest) = report.smallest() {
        info!(encoding = %smallest.label, bytes = smallest.bytes, "smallest encoding");
    }

    match &args.redis_url {
        Some(url) => {
            let store = Arc::new(RedisCacheStore::from_url(url)?);
            info!("Using Redis store at {}", url);
            run(store, pipeline, &args).await?;
        }
        None => {
            let store = Arc::new(InMemoryCacheStore::new());
            info!("Using in-memory store");
            run(store.clone(), pipeline, &args).await?;

            let stats = store.stats();
            info!(
                sets = stats.set_count,
                members = stats.member_count,
                bytes = stats.total_bytes,
                "in-memory store stats"
            );
        }
    }

    info!("Done");
    Ok(())
}

/// Store the generated users, read every bucket back and write the
/// comparison values.
async fn run<S>(store: Arc<S>, pipeline: Arc<CodecPipeline>, args: &Args) -> anyhow::Result<()>
where
    S: CacheStore + ValueStore + 'static,
{
    let mut service = UserCacheService::new(store.clone(), pipeline.clone());
    if args.replace_by_id {
        service = service.with_duplicate_policy(DuplicatePolicy::ReplaceById);
    }
    if args.skip_undecodable {
        service = service.with_decode_failure_policy(DecodeFailurePolicy::Skip);
    }

    let users = generate_users(args.records);
    let added = service.store_all(&users).await.context("storing users")?;
    info!(users = users.len(), added, "users cached");

    // every generated id lives in buckets 0..=last
    let last = BucketKey::for_id(args.records as i64)?.index();
    let buckets = (0..=last)
        .map(BucketKey::from_index)
        .collect::<usercache::Result<Vec<_>>>()?;
    let fetched = try_join_all(buckets.iter().map(|b| service.fetch_bucket(*b)))
        .await
        .context("fetching buckets")?;

    let total: usize = fetched.iter().map(Vec::len).sum();
    info!(buckets = buckets.len(), projections = total, "buckets fetched");
    if total < users.len() {
        warn!(
            expected = users.len(),
            found = total,
            "fewer projections than users"
        );
    }

    // Plain values for comparing sizes as the store sees them
    let projections = generate_projections(args.records);
    let json = serde_json::to_vec(&projections)?;
    let encoded = pipeline.encode_value(&projections)?;
    for (label, bytes) in [("json".to_string(), json), (pipeline.describe(), encoded)] {
        let key = format!("{}{}", COMPARE_PREFIX, label);
        ValueStore::set(store.as_ref(), &key, bytes).await?;
        let stored = ValueStore::get(store.as_ref(), &key)
            .await?
            .map(|v| v.len())
            .unwrap_or_default();
        info!(key = %key, bytes = stored, "comparison value written");
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
