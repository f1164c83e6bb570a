use marquee_api::{
    app,
    state::{AppState, AuthConfig},
};
use marquee_booking::SystemClock;
use marquee_store::{Config, DbClient, EventProducer, PgSeatStore, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let redis = RedisClient::new(&config.redis.url).await?;
    let kafka = EventProducer::new(&config.kafka.brokers)?;

    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let rules = config.business_rules.clone();
    let service = PgSeatStore::new(
        db.pool.clone(),
        Arc::new(SystemClock),
        rules.refund_policy(),
        &rules.reference_prefix,
        rules.hold_ttl(),
    );

    let app_state = AppState {
        service: Arc::new(service),
        redis: Some(Arc::new(redis)),
        kafka: Some(Arc::new(kafka)),
        sse_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
