//! HTTP server entry point. Wires the core components together and binds
//! the axum router: load config, init tracing, build the app, serve.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use llm_ensemble::api::{build_router, AppState};
use llm_ensemble::config::ServerConfig;
use llm_ensemble::debate::DebateRegistry;
use llm_ensemble::ensemble::EnsembleCoordinator;
use llm_ensemble::events::EventBus;
use llm_ensemble::fallback::{FallbackExecutor, ProviderRegistry};
use llm_ensemble::health::HealthMonitor;
use llm_ensemble::models::ModelRef;
use llm_ensemble::providers::mock::{MockBehavior, MockProvider};
use llm_ensemble::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    let providers = Arc::new(ProviderRegistry::new());
    // A real deployment registers `HttpProviderAdapter`s for each
    // configured backend; an echo provider ships so the server is runnable
    // out of the box.
    providers.register(Arc::new(
        MockProvider::new("echo").with_behavior("default", MockBehavior::succeed("pong", 10)),
    ));

    let health = Arc::new(HealthMonitor::new(config.health));
    let events = Arc::new(EventBus::new(config.event_bus_capacity));
    let executor = FallbackExecutor::new(health.clone(), providers.clone(), events.clone());
    let coordinator = Arc::new(EnsembleCoordinator::new(executor));
    let debates = Arc::new(DebateRegistry::new());
    let orchestrator = Arc::new(llm_ensemble::debate::DebateOrchestrator::new(
        coordinator.clone(),
        debates.clone(),
        events.clone(),
    ));
    let router = Arc::new(llm_ensemble::router::RequestRouter::new(coordinator, orchestrator));
    let sessions = Arc::new(InMemoryStore::new());

    let state = AppState {
        router,
        debates,
        health,
        providers,
        sessions,
        default_model: ModelRef::new("echo", "default"),
    };

    let app = build_router(state);
    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.bind_port).parse()?;
    tracing::info!(%addr, "starting ensemble orchestrator");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
