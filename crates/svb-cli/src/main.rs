use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use svb_core::AppConfig;
use svb_elastic::{BulkWriteQueue, ElasticClient};
use svb_importer::{category, product, PriceResolver, SyncContext};
use svb_spree::SpreeClient;

#[derive(Debug, Parser)]
#[command(name = "svb")]
#[command(about = "Spree to search-index catalog bridge")]
struct Cli {
    /// Store identifier from the stores file. Selects the target index and
    /// (multi-currency) the price currency.
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import the taxon tree as category documents.
    Categories {
        /// Only re-index resources updated since this RFC 3339 instant;
        /// older ones get their cursor stamped in place.
        #[arg(long, value_parser = parse_rfc3339)]
        updated_since: Option<DateTime<Utc>>,
    },
    /// Import products (plus their attribute documents).
    Products {
        #[arg(long, value_parser = parse_rfc3339)]
        updated_since: Option<DateTime<Utc>>,
    },
    /// Drop every catalog index outright.
    RemoveEverything,
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("not an RFC 3339 timestamp: {e}"))
}

struct RunTarget {
    elastic: Arc<ElasticClient>,
    resolver: PriceResolver,
}

/// Resolves the index and currency for this run: the generic config in
/// single-store mode, the selected (or default) store otherwise.
fn run_target(config: &AppConfig, store: Option<&str>) -> anyhow::Result<RunTarget> {
    let stores = svb_core::load_stores(&config.stores_path)?;

    let selected = match store {
        Some(identifier) => Some(stores.find(identifier).ok_or_else(|| {
            anyhow::anyhow!("store '{identifier}' is not present in the stores file")
        })?),
        None => stores.default_store()?,
    };

    let (index, resolver) = match selected {
        Some(store) => (
            store.elastic_index.clone(),
            match &store.spree_currency {
                Some(currency) => PriceResolver::MultiCurrency {
                    currency: currency.clone(),
                },
                None => PriceResolver::SingleCurrency,
            },
        ),
        None => (config.es_index.clone(), PriceResolver::SingleCurrency),
    };

    let elastic = ElasticClient::new(&config.es_url, &index, config.es_request_timeout_secs)?;
    Ok(RunTarget {
        elastic: Arc::new(elastic),
        resolver,
    })
}

fn spree_client(config: &AppConfig) -> anyhow::Result<SpreeClient> {
    Ok(SpreeClient::new(
        &config.spree_url,
        config.spree_request_timeout_secs,
        &config.spree_user_agent,
        config.spree_max_retries,
        config.spree_retry_backoff_base_secs,
    )?)
}

fn sync_context(config: &AppConfig, updated_since: Option<DateTime<Utc>>) -> SyncContext {
    SyncContext {
        cursor: Utc::now().timestamp_millis().to_string(),
        updated_since,
        images_host: config.spree_images_host.clone(),
        per_page: config.per_page,
        max_pages: config.max_pages,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = svb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Categories { updated_since } => {
            let target = run_target(&config, cli.store.as_deref())?;
            let spree = spree_client(&config)?;
            let queue = BulkWriteQueue::new(Arc::clone(&target.elastic), config.es_bulk_size);
            let ctx = sync_context(&config, updated_since);

            tracing::info!(cursor = %ctx.cursor, "starting category import");
            let stats =
                category::import_categories(&spree, &queue, &target.elastic, &ctx).await?;
            tracing::info!(
                replacements = stats.replacements,
                cursor_updates = stats.cursor_updates,
                stale_deleted = stats.stale_deleted,
                "category import finished"
            );
        }
        Commands::Products { updated_since } => {
            let target = run_target(&config, cli.store.as_deref())?;
            let spree = spree_client(&config)?;
            let queue = BulkWriteQueue::new(Arc::clone(&target.elastic), config.es_bulk_size);
            let ctx = sync_context(&config, updated_since);

            tracing::info!(cursor = %ctx.cursor, "starting product import");
            let stats = product::import_products(
                &spree,
                &queue,
                &target.elastic,
                &target.resolver,
                &ctx,
            )
            .await?;
            tracing::info!(
                replacements = stats.replacements,
                cursor_updates = stats.cursor_updates,
                stale_deleted = stats.stale_deleted,
                "product import finished"
            );
        }
        Commands::RemoveEverything => {
            let target = run_target(&config, cli.store.as_deref())?;
            target.elastic.delete_catalog().await?;
            tracing::info!("catalog indices removed");
        }
    }

    Ok(())
}
