//! Optional MQTT surface: watcher events out, feed commands out.

use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::hysteresis::ResourceController;
use crate::models::{HostScoreState, WatchEvent};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub const STATUS_TOPIC: &str = "linkwatch/hosts/status@v1";
pub const ERROR_TOPIC: &str = "linkwatch/hosts/error@v1";
pub const SCORE_TOPIC: &str = "linkwatch/hosts/score@v1";
pub const REMOVED_TOPIC: &str = "linkwatch/hosts/removed@v1";
pub const FEED_COMMAND_TOPIC: &str = "linkwatch/feed/command@v1";

pub fn topic_for(event: &WatchEvent) -> &'static str {
    match event {
        WatchEvent::StatusChanged { .. } => STATUS_TOPIC,
        WatchEvent::Error { .. } => ERROR_TOPIC,
        WatchEvent::ScoreUpdated { .. } => SCORE_TOPIC,
        WatchEvent::HostRemoved { .. } => REMOVED_TOPIC,
    }
}

/// Creates the client and keeps its event loop polled on a background task.
pub fn create_mqtt_client(conf: &MqttConf, health: HealthTracker) -> AsyncClient {
    let mut opts = MqttOptions::new("linkwatch-kernel", &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(15));
    let (client, mut eventloop) = AsyncClient::new(opts, 64);

    health.mark_mqtt_connecting();
    info!("MQTT bridge connecting to {}:{}", conf.host, conf.port);

    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("MQTT connected");
                    health.mark_mqtt_connected();
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT error: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    client
}

/// Republishes every watcher event as JSON on its topic.
pub fn spawn_event_bridge(
    client: AsyncClient,
    mut events: broadcast::Receiver<WatchEvent>,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("MQTT bridge lagged, {} events skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Cannot encode event for {}: {}", event.host(), e);
                    continue;
                }
            };
            if let Err(e) = client
                .publish(topic_for(&event), QoS::AtLeastOnce, false, payload)
                .await
            {
                error!("Failed to publish event for {}: {:?}", event.host(), e);
            }
        }
    })
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedAction {
    Disable,
    Enable,
}

#[derive(Debug, Serialize)]
pub struct FeedCommand<'a> {
    pub host: &'a str,
    pub action: FeedAction,
    pub score: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Asks the video side to switch a feed off/on over MQTT.
pub struct MqttFeedController {
    client: AsyncClient,
}

impl MqttFeedController {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    fn send(&self, host: &str, action: FeedAction, score: &HostScoreState) {
        let command = FeedCommand {
            host,
            action,
            score: score.overall_score,
            timestamp: OffsetDateTime::now_utc(),
        };
        let payload = match serde_json::to_string(&command) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Cannot encode feed command for {}: {}", host, e);
                return;
            }
        };
        match self
            .client
            .try_publish(FEED_COMMAND_TOPIC, QoS::AtLeastOnce, false, payload)
        {
            Ok(()) => debug!("Feed {:?} sent for {}", action, host),
            Err(e) => error!("Failed to send feed {:?} for {}: {:?}", action, host, e),
        }
    }
}

impl ResourceController for MqttFeedController {
    fn disable(&mut self, host: &str, score: &HostScoreState) {
        self.send(host, FeedAction::Disable, score);
    }

    fn enable(&mut self, host: &str, score: &HostScoreState) {
        self.send(host, FeedAction::Enable, score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_map_to_their_topics() {
        let status = WatchEvent::StatusChanged {
            host: "AI".into(),
            reachable: true,
            rtt_ms: Some(3.0),
        };
        let error = WatchEvent::Error {
            host: "AI".into(),
            message: "Host unreachable".into(),
        };
        let score = WatchEvent::ScoreUpdated {
            host: "AI".into(),
            score: HostScoreState::new("AI", "10.0.0.2"),
        };
        assert_eq!(topic_for(&status), STATUS_TOPIC);
        assert_eq!(topic_for(&error), ERROR_TOPIC);
        assert_eq!(topic_for(&score), SCORE_TOPIC);
        let removed = WatchEvent::HostRemoved {
            host: "AI".into(),
            score: HostScoreState::new("AI", "10.0.0.2"),
        };
        assert_eq!(topic_for(&removed), REMOVED_TOPIC);
    }

    #[test]
    fn feed_command_payload_shape() {
        let command = FeedCommand {
            host: "SIYI",
            action: FeedAction::Disable,
            score: 12,
            timestamp: time::macros::datetime!(2025-01-02 03:04:05 UTC),
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["host"], "SIYI");
        assert_eq!(json["action"], "disable");
        assert_eq!(json["score"], 12);
        assert_eq!(json["timestamp"], "2025-01-02T03:04:05Z");
    }
}
