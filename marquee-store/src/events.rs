use marquee_shared::events::{BookingCancelledEvent, BookingConfirmedEvent, SeatsHeldEvent};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

pub const TOPIC_HOLDS_ACQUIRED: &str = "holds.acquired";
pub const TOPIC_BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    /// Keyed by showing id so every event for one showing lands on the same
    /// partition and downstream consumers see them in order.
    pub async fn publish_seats_held(&self, event: &SeatsHeldEvent) {
        self.publish(
            TOPIC_HOLDS_ACQUIRED,
            &event.showing_id.to_string(),
            serde_json::to_string(event),
        )
        .await;
    }

    pub async fn publish_booking_confirmed(&self, event: &BookingConfirmedEvent) {
        self.publish(
            TOPIC_BOOKING_CONFIRMED,
            &event.showing_id.to_string(),
            serde_json::to_string(event),
        )
        .await;
    }

    pub async fn publish_booking_cancelled(&self, event: &BookingCancelledEvent) {
        self.publish(
            TOPIC_BOOKING_CANCELLED,
            &event.showing_id.to_string(),
            serde_json::to_string(event),
        )
        .await;
    }

    /// Delivery is best-effort: the booking state is already committed by
    /// the time an event is emitted, so a broker outage is logged and
    /// swallowed rather than failing the request.
    async fn publish(&self, topic: &str, key: &str, payload: serde_json::Result<String>) {
        let payload = match payload {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize event for {}: {}", topic, e);
                return;
            }
        };

        let record = FutureRecord::to(topic).key(key).payload(&payload);
        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
            }
        }
    }
}
