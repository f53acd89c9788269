use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_engine::cache::{EngineCaches, SeenContentTracker};
use feed_engine::config::Config;
use feed_engine::handlers::{self, AppState};
use feed_engine::jobs;
use feed_engine::middleware::RateLimitMiddleware;
use feed_engine::services::{
    ContentCandidateFetcher, EngagementMetricsCollector, FeedMixer, FeedService, PredictorClient,
    ScoringEngine, UserProfileAggregator, ViewIncrementBatcher,
};
use feed_engine::stores::memory::{
    InMemoryContentStore, InMemorySocialGraphStore, InMemoryUserStore,
};
use feed_engine::stores::{ContentStore, SocialGraphStore, UserStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_target(true))
        .init();

    let config = Arc::new(Config::from_env().context("loading configuration")?);
    info!(env = %config.app.env, port = config.app.port, "starting feed-engine");

    // Reference in-memory bindings; production deployments swap these for
    // clients of the real stores.
    let content: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let graph: Arc<dyn SocialGraphStore> = Arc::new(InMemorySocialGraphStore::new());
    let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());

    let caches = Arc::new(EngineCaches::new(&config.cache));
    let seen = Arc::new(SeenContentTracker::new(Duration::from_secs(
        config.cache.seen_ttl_secs,
    )));
    let batcher = Arc::new(ViewIncrementBatcher::new(
        Arc::clone(&content),
        Arc::clone(&caches),
        config.batcher.clone(),
    ));

    let scoring = if config.predictor.enabled {
        let predictor = Arc::new(PredictorClient::new(
            config.predictor.url.clone(),
            config.predictor_timeout(),
        ));
        ScoringEngine::with_predictor(config.ranking.clone(), predictor)
    } else {
        ScoringEngine::new(config.ranking.clone())
    };

    let feed = Arc::new(FeedService::new(
        UserProfileAggregator::new(
            Arc::clone(&users),
            Arc::clone(&graph),
            Arc::clone(&content),
            Arc::clone(&caches),
            config.fetch.clone(),
        ),
        EngagementMetricsCollector::new(Arc::clone(&content), Arc::clone(&caches)),
        ContentCandidateFetcher::new(Arc::clone(&content), config.fetch.clone()),
        scoring,
        FeedMixer::new(config.mixer.clone()),
        Arc::clone(&seen),
        Arc::clone(&batcher),
        Arc::clone(&caches),
        Arc::clone(&content),
    ));

    let rate_limiter = RateLimitMiddleware::new(&config.rate_limit);

    jobs::spawn_view_flusher(Arc::clone(&batcher), config.batcher.flush_interval_ms);
    jobs::spawn_cache_sweeper(
        Arc::clone(&caches),
        Arc::clone(&seen),
        Arc::clone(&batcher),
        rate_limiter.clone(),
        Arc::clone(&config),
    );

    let state = web::Data::new(AppState {
        feed,
        max_page_size: config.fetch.max_page_size,
    });
    let port = config.app.port;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(rate_limiter.clone())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("binding 0.0.0.0:{port}"))?
    .run()
    .await?;

    Ok(())
}
