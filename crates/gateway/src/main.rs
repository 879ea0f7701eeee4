//! Concierge API Gateway
//!
//! The HTTP entry point for the assistant.
//! Handles:
//! - Free-text requests routed through the agent
//! - Direct appointment booking
//! - Document question answering
//! - Rate limiting and observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    error_handling::HandleErrorLayer,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    BoxError, Router,
};
use concierge_agent::{AgentExecutor, CalendarTool, DocumentQaTool, Tool};
use concierge_calendar::{CalendarService, GoogleCalendarClient, GoogleTokenProvider};
use concierge_common::{
    config::AppConfig,
    embeddings::create_embedder,
    errors::AppError,
    llm::create_llm,
    metrics, telemetry, Embedder, LanguageModel, VectorIndex, VERSION,
};
use concierge_ingestion::IndexBuilder;
use concierge_search::{RetrievalQa, VectorRetriever};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal, sync::oneshot};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Summary of the loaded index
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub chunks: usize,
    pub documents: usize,
    pub embedding_model: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<AgentExecutor>,
    pub qa: Arc<RetrievalQa>,
    pub calendar: Arc<dyn CalendarService>,
    pub index: IndexInfo,
    pub llm_model: String,
}

impl AppState {
    /// Wire the QA chain and the agent on top of a ready index
    pub fn new(
        config: Arc<AppConfig>,
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        calendar: Arc<dyn CalendarService>,
    ) -> Self {
        let info = IndexInfo {
            chunks: index.len(),
            documents: index.manifest().sources.len(),
            embedding_model: index.manifest().embedding_model.clone(),
        };

        let retriever = VectorRetriever::new(Arc::new(index), embedder, config.rag.top_k)
            .with_min_score(config.rag.min_score);
        let qa = Arc::new(RetrievalQa::new(Arc::new(retriever), llm.clone()));

        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(CalendarTool::new(calendar.clone())),
            Arc::new(DocumentQaTool::new(qa.clone())),
        ];
        let agent = Arc::new(AgentExecutor::from_config(llm.clone(), tools, &config.agent));

        Self {
            llm_model: llm.model_name().to_string(),
            config,
            agent,
            qa,
            calendar,
            index: info,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    telemetry::init_tracing(&config.observability);
    info!("Starting Concierge API Gateway v{}", VERSION);

    // Exporter first so metric descriptions reach the recorder
    metrics::install_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    let embedder = create_embedder(&config.embedding)?;
    let llm = create_llm(&config.llm)?;

    let (index, origin) = IndexBuilder::from_config(embedder.clone(), &config)
        .build_or_load(&config.rag.pdf_dir, &config.rag.index_path)
        .await?;
    info!(chunks = index.len(), origin = ?origin, "Vector index ready");

    let tokens = Arc::new(GoogleTokenProvider::new(&config.calendar)?);
    let calendar: Arc<dyn CalendarService> = Arc::new(GoogleCalendarClient::new(&config.calendar, tokens)?);

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), index, embedder, llm, calendar);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    serve(listener, app, shutdown_signal(), config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    let mut router = Router::new()
        // Health endpoints
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Assistant endpoints
        .route("/agent", post(handlers::agent::run_agent))
        .route("/book_appointment", post(handlers::appointments::book_appointment))
        .route("/ask", post(handlers::ask::ask))
        .route_layer(from_fn(middleware::metrics::track_metrics));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst);
        router = router.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware));
    }

    // Compose the app
    router
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::RequestTimeout
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Serve until `signal` fires, then give in-flight requests `grace` to finish
async fn serve<F>(listener: TcpListener, app: Router, signal: F, grace: Duration) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (fired_tx, fired_rx) = oneshot::channel();
    let shutdown = async move {
        signal.await;
        let _ = fired_tx.send(());
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown).into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        Ok(()) = fired_rx => {}
    }

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => result,
        Err(_) => {
            warn!(grace_secs = grace.as_secs_f64(), "Requests still running after shutdown timeout, exiting anyway");
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
