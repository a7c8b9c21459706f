// Web Server - main.rs
// web-server/src/main.rs
use actix::Actor;
use actix_web::{App, HttpServer};
use common::{parse_wallet_address, setup_tracing, Config};
use std::sync::Arc;
use std::time::Duration;

use web_server::ledger::{InMemoryLedger, VoterAllowList};
use web_server::middleware::RateLimiter;
use web_server::session_registry::SessionRegistryActor;
use web_server::static_files::{self, StaticFilesConfig};
use web_server::AppState;

async fn build_ledger(config: &Config) -> std::io::Result<Arc<InMemoryLedger>> {
    let ledger = match &config.ledger.fixture_path {
        Some(path) => {
            tracing::info!("Seeding ledger from {}", path);
            InMemoryLedger::from_fixture_file(path)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?
        }
        None => {
            tracing::warn!("No ledger fixture configured, starting with an empty ledger");
            InMemoryLedger::new()
        }
    };

    for raw in &config.ledger.initial_voters {
        match parse_wallet_address(raw) {
            Ok(voter) => {
                ledger
                    .add_voter(voter)
                    .await
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            }
            Err(e) => tracing::warn!("Ignoring initial voter: {}", e),
        }
    }

    Ok(Arc::new(ledger))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = Config::from_env();

    // Setup tracing
    setup_tracing(&config.log_level);

    let server_addr = config.web_server_addr.clone();
    let ledger = build_ledger(&config).await?;

    // Session registry sweeps expired sessions on its own tick
    let registry = SessionRegistryActor::new()
        .with_ttl(config.session.ttl_seconds)
        .with_cleanup_interval(config.session.cleanup_interval_seconds)
        .start();

    let state = AppState::new(&config, ledger, registry);

    // Stale challenges are swept on the same cadence
    let nonces = state.nonces.clone();
    let sweep_every = Duration::from_secs(config.session.cleanup_interval_seconds.max(1));
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let purged = nonces.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired nonces", purged);
            }
        }
    });

    let limiter = RateLimiter::new(
        vec!["/auth/nonce".to_string()],
        config.auth.challenge_requests_per_minute,
    );
    let static_config = StaticFilesConfig::from(&config.static_files);

    tracing::info!("Starting Web Server on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(limiter.clone())
            .configure(|cfg| state.configure(cfg))
            .configure(|cfg| static_files::configure(cfg, static_config.clone()))
    })
    .bind(&server_addr)?
    .run()
    .await
}
