use std::net::SocketAddr;
use std::sync::Arc;

use arena_backend::auth::JwtVerifier;
use arena_backend::config::Config;
use arena_backend::engine::catalog::GameData;
use arena_backend::engine::config::TickClock;
use arena_backend::engine::server::MatchManager;
use arena_backend::net::handlers::{register_all, Services};
use arena_backend::net::messages::{Message, ServerNotice};
use arena_backend::net::registry::TypeRegistry;
use arena_backend::net::server::SocketServer;
use arena_backend::net::session::SessionRegistry;
use arena_backend::worker_pool::WorkerPool;
use arena_backend::{api, metrics};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    metrics::register_metrics();

    let config = Config::load();
    tracing::info!(?config, "Configuration loaded");

    let data = match &config.data_dir {
        Some(dir) => GameData::load_dir(dir)?,
        None => GameData::builtin(),
    };
    let clock = TickClock::new(config.tick_ms);

    let sessions = Arc::new(SessionRegistry::new());
    let matches = Arc::new(MatchManager::new(
        Arc::new(data),
        clock,
        WorkerPool::new(config.max_matches),
        sessions.clone(),
        config.rng_seed,
    ));
    let services = Arc::new(Services {
        sessions: sessions.clone(),
        matches: matches.clone(),
        verifier: Arc::new(JwtVerifier {
            local_mode: config.local_mode,
        }),
        local_mode: config.local_mode,
    });

    let socket_server = Arc::new(SocketServer::new(
        TypeRegistry::with_all_messages()?,
        register_all()?,
        services,
    ));

    let game_addr = SocketAddr::from(([0, 0, 0, 0], config.game_port));
    let game_listener = tokio::net::TcpListener::bind(game_addr).await?;
    tracing::info!(%game_addr, tick_ms = clock.interval_ms(), "Game socket listening");

    let admin_addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
    tracing::info!(%admin_addr, "Admin API listening");

    let admin = axum::serve(admin_listener, api::router(matches.clone()));

    tokio::select! {
        res = socket_server.serve(game_listener) => res?,
        res = admin => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    let notice = Message::from(ServerNotice {
        message: "Server shutting down".into(),
    });
    let notified = sessions.send_global(&notice);
    tracing::info!(connections = notified, "Shutdown notice sent");
    matches.shutdown();
    Ok(())
}
