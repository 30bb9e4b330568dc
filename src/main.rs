use std::sync::Arc;

use move_ranker::{
    MoveRanker, OraclePool, RankerConfig,
    server::{AppState, router, wait_for_shutdown},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RankerConfig::from_env()?;
    info!(
        engine = %config.engine_path.display(),
        pool_size = config.pool_size,
        timeout_secs = config.timeout_secs,
        "starting move ranker"
    );

    // Fail now, not on the first request, if the engine cannot be started.
    let pool = OraclePool::new(config.engine_factory(), config.pool_size);
    pool.warm_up(1).await?;

    let state = Arc::new(AppState {
        ranker: MoveRanker::new(pool, config.request_timeout()),
        max_depth: config.max_depth,
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}
