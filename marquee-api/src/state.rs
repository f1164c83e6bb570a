use marquee_booking::BookingService;
use marquee_shared::events::SeatMapEvent;
use marquee_store::{BusinessRules, EventProducer, RedisClient};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn BookingService>,
    pub redis: Option<Arc<RedisClient>>,
    pub kafka: Option<Arc<EventProducer>>,
    pub sse_tx: broadcast::Sender<SeatMapEvent>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
