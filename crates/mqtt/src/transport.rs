use std::time::Duration;

use {
    meshrelay_common::TransportMessage,
    meshrelay_config::MqttConfig,
    rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS},
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use meshrelay_metrics::{counter, mqtt as mqtt_metrics};

use crate::{
    Result,
    options::{build_options, to_qos},
};

/// Pause between a connection error and the next attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Outstanding client requests (subscribe, disconnect) buffered for the
/// event loop.
const REQUEST_CAPACITY: usize = 16;

/// A running broker subscription.
pub struct MqttTransport {
    client: AsyncClient,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MqttTransport {
    /// Start the client and its event loop.
    ///
    /// Must be called from within a Tokio runtime. The connection is made
    /// lazily by the event loop, which retries forever until [`shutdown`].
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn connect(config: &MqttConfig) -> (Self, mpsc::UnboundedReceiver<TransportMessage>) {
        let options = build_options(config);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let subscription = Subscription {
            url: config.url(),
            topic: config.topic.clone(),
            qos: to_qos(config.qos),
        };
        info!(url = %subscription.url, topic = %subscription.topic, "connecting to MQTT broker");

        let task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            subscription,
            tx,
            cancel.clone(),
        ));

        (
            Self {
                client,
                cancel,
                task,
            },
            rx,
        )
    }

    /// Stop the event loop without draining in-flight messages.
    pub async fn shutdown(self) -> Result<()> {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "mqtt disconnect request not queued");
        }
        self.cancel.cancel();
        self.task.await?;
        info!("mqtt transport stopped");
        Ok(())
    }
}

struct Subscription {
    url: String,
    topic: String,
    qos: QoS,
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscription: Subscription,
    tx: mpsc::UnboundedSender<TransportMessage>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(
                    url = %subscription.url,
                    topic = %subscription.topic,
                    "MQTT connected, subscribing"
                );
                #[cfg(feature = "metrics")]
                counter!(mqtt_metrics::CONNECTIONS_TOTAL).increment(1);

                // The request is flushed by the next poll.
                if let Err(e) = client.try_subscribe(subscription.topic.as_str(), subscription.qos) {
                    warn!(error = %e, "MQTT subscribe error");
                }
            },
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!(return_codes = ?ack.return_codes, "MQTT subscription acknowledged");
            },
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = TransportMessage::new(publish.topic, publish.payload);
                if tx.send(message).is_err() {
                    debug!("transport receiver dropped, stopping event loop");
                    break;
                }
            },
            Ok(_) => {},
            Err(e) => {
                warn!(error = %e, "MQTT error");
                #[cfg(feature = "metrics")]
                counter!(mqtt_metrics::CONNECTION_ERRORS_TOTAL).increment(1);

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RECONNECT_DELAY) => {
                        info!("MQTT reconnecting...");
                    },
                }
            },
        }
    }
}
