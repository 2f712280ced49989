use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::forecast::artifacts::FsArtifactStore;
use stockcast_core::forecast::gate::ForecastService;
use stockcast_core::forecast::models::default_runners;
use stockcast_core::forecast::orchestrator::Forecaster;
use stockcast_core::forecast::{train, Forecast};
use stockcast_core::market::{HttpJsonMarketData, MarketData};
use stockcast_core::storage::suggestion_history::PgHistoryStore;
use stockcast_core::suggest::history::NullHistoryStore;
use stockcast_core::suggest::{universe_from_env, SuggestionEngine};

#[derive(Debug, Parser)]
#[command(name = "stockcast_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the ticker universe and persist the ranked suggestions.
    Scan {
        /// Scan date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        scan_date: Option<String>,

        #[arg(long, default_value_t = 5)]
        horizon: u32,

        /// Do everything except writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Fit and save pretrained model artifacts for every universe ticker.
    Train {
        #[arg(long)]
        lookback_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let market: Arc<dyn MarketData> = Arc::new(HttpJsonMarketData::from_settings(&settings)?);

    match args.command {
        Command::Scan {
            scan_date,
            horizon,
            dry_run,
        } => run_scan(&settings, market, scan_date.as_deref(), horizon, dry_run).await,
        Command::Train { lookback_days } => run_train(&settings, market, lookback_days).await,
    }
}

async fn run_scan(
    settings: &stockcast_core::config::Settings,
    market: Arc<dyn MarketData>,
    scan_date_arg: Option<&str>,
    horizon: u32,
    dry_run: bool,
) -> anyhow::Result<()> {
    let scan_date = resolve_scan_date(scan_date_arg)?;

    let forecaster = Forecaster::new(market.clone(), default_runners());
    let artifacts = Arc::new(FsArtifactStore::from_settings(settings));
    let forecast: Arc<dyn Forecast> =
        Arc::new(ForecastService::new(market.clone(), artifacts, forecaster));

    if dry_run {
        let engine =
            SuggestionEngine::new(forecast, market, Arc::new(NullHistoryStore));
        let ranked = engine.scan_and_rank(horizon).await?;
        tracing::info!(
            %scan_date,
            dry_run = true,
            ranked = ranked.len(),
            top = ranked.first().map(|s| s.ticker.as_str()).unwrap_or("-"),
            "scan complete (dry-run; nothing persisted)"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockcast_core::storage::migrate(&pool).await?;

    let acquired =
        stockcast_core::storage::lock::try_acquire_scan_date_lock(&pool, scan_date).await?;
    if !acquired {
        tracing::warn!(%scan_date, "scan date lock not acquired; another run in progress");
        return Ok(());
    }

    let engine = SuggestionEngine::new(
        forecast,
        market,
        Arc::new(PgHistoryStore::new(pool.clone())),
    );

    let outcome = async {
        let ranked = engine.scan_and_rank(horizon).await?;
        let inserted = engine.persist(&ranked).await?;
        anyhow::Ok((ranked, inserted))
    }
    .await;

    let _ = stockcast_core::storage::lock::release_scan_date_lock(&pool, scan_date).await;

    match outcome {
        Ok((ranked, inserted)) => {
            tracing::info!(
                %scan_date,
                ranked = ranked.len(),
                inserted,
                top = ranked.first().map(|s| s.ticker.as_str()).unwrap_or("-"),
                "scan complete"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%scan_date, error = %err, "scan failed");
            Err(err)
        }
    }
}

async fn run_train(
    settings: &stockcast_core::config::Settings,
    market: Arc<dyn MarketData>,
    lookback_days: Option<u32>,
) -> anyhow::Result<()> {
    let lookback_days = lookback_days.unwrap_or_else(train::train_lookback_days);
    let store = FsArtifactStore::from_settings(settings);
    let universe = universe_from_env();

    let mut trained = 0usize;
    for ticker in &universe {
        match train::train_ticker(market.as_ref(), &store, ticker, lookback_days).await {
            Ok(()) => trained += 1,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(ticker = %ticker, error = %err, "training failed; skipping ticker");
            }
        }
    }

    anyhow::ensure!(trained > 0, "training produced no artifacts");
    tracing::info!(trained, total = universe.len(), "training run complete");
    Ok(())
}

fn resolve_scan_date(scan_date_arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = scan_date_arg {
        return Ok(chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?);
    }
    Ok(chrono::Utc::now().date_naive())
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
