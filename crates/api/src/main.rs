use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::domain::forecast::ForecastBundle;
use stockcast_core::domain::sentiment::SentimentVerdict;
use stockcast_core::domain::suggestion::Suggestion;
use stockcast_core::forecast::artifacts::FsArtifactStore;
use stockcast_core::forecast::gate::ForecastService;
use stockcast_core::forecast::models::default_runners;
use stockcast_core::forecast::orchestrator::Forecaster;
use stockcast_core::forecast::{Forecast, ForecastError};
use stockcast_core::market::overview::{market_overview, MarketOverview};
use stockcast_core::market::{HttpJsonMarketData, MarketData};
use stockcast_core::sentiment::SentimentAnalyzer;
use stockcast_core::storage::suggestion_history::PgHistoryStore;
use stockcast_core::suggest::history::HistoryReportItem;
use stockcast_core::suggest::SuggestionEngine;

const DEFAULT_HORIZON: u32 = 5;

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

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stockcast_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let market: Arc<dyn MarketData> = Arc::new(HttpJsonMarketData::from_settings(&settings)?);
    let forecaster = Forecaster::new(market.clone(), default_runners());
    let artifacts = Arc::new(FsArtifactStore::from_settings(&settings));
    let forecast: Arc<dyn Forecast> =
        Arc::new(ForecastService::new(market.clone(), artifacts, forecaster));

    let engine = pool.map(|pool| {
        Arc::new(SuggestionEngine::new(
            forecast.clone(),
            market.clone(),
            Arc::new(PgHistoryStore::new(pool)),
        ))
    });

    let sentiment = Arc::new(SentimentAnalyzer::from_settings(&settings)?);

    let state = AppState {
        forecast,
        market,
        engine,
        sentiment,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/forecast/:ticker", get(get_forecast))
        .route("/suggestions", get(get_suggestions))
        .route("/suggestions/history", get(get_suggestion_history))
        .route("/sentiment/:ticker", get(get_sentiment))
        .route("/market/overview", get(get_market_overview))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    forecast: Arc<dyn Forecast>,
    market: Arc<dyn MarketData>,
    engine: Option<Arc<SuggestionEngine>>,
    sentiment: Arc<SentimentAnalyzer>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct HorizonQuery {
    horizon: Option<u32>,
}

async fn get_forecast(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<ForecastBundle>, ApiError> {
    let horizon = query.horizon.unwrap_or(DEFAULT_HORIZON);
    let ticker = ticker.trim().to_ascii_uppercase();

    match state.forecast.run_forecast(&ticker, horizon).await {
        Ok(bundle) => Ok(Json(bundle)),
        Err(err @ ForecastError::InvalidHorizon(_)) => {
            Err(error_response(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err @ ForecastError::DataUnavailable(_)) => {
            Err(error_response(StatusCode::NOT_FOUND, err.to_string()))
        }
    }
}

async fn get_suggestions(
    State(state): State<AppState>,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let Some(engine) = &state.engine else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "suggestion storage unavailable",
        ));
    };

    let horizon = query.horizon.unwrap_or(DEFAULT_HORIZON);
    engine.get_suggestions(horizon).await.map(Json).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "suggestion generation failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })
}

async fn get_suggestion_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryReportItem>>, ApiError> {
    let Some(engine) = &state.engine else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "suggestion storage unavailable",
        ));
    };

    engine.history_report().await.map(Json).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "history report failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })
}

async fn get_sentiment(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<SentimentVerdict>, ApiError> {
    let ticker = ticker.trim().to_ascii_uppercase();
    state.sentiment.analyze(&ticker).await.map(Json).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(ticker = %ticker, error = %e, "sentiment analysis failed");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("could not process sentiment for {ticker}"),
        )
    })
}

async fn get_market_overview(State(state): State<AppState>) -> Json<MarketOverview> {
    Json(market_overview(state.market.as_ref()).await)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
