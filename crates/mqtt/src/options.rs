use std::time::Duration;

use {
    meshrelay_config::{MqttConfig, Qos, TransportMode},
    rumqttc::{MqttOptions, QoS, TlsConfiguration, Transport},
    secrecy::ExposeSecret,
    tracing::warn,
};

use crate::tls;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Largest packet accepted from or sent to the broker. Mesh packets are a
/// few hundred bytes; bridges that wrap them in JSON stay well below this.
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Client options for `config`.
pub fn build_options(config: &MqttConfig) -> MqttOptions {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(generated_client_id);

    // The websocket transport dials the full URL rather than host/port.
    let broker = match config.transport {
        TransportMode::Tcp => config.host.clone(),
        TransportMode::Websockets => config.url(),
    };

    let mut options = MqttOptions::new(client_id, broker, config.port);
    options
        .set_keep_alive(KEEP_ALIVE)
        .set_clean_session(true)
        .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE)
        .set_transport(transport(config));

    if let Some(username) = &config.username {
        let password = config
            .password
            .as_ref()
            .map(|p| p.expose_secret().clone())
            .unwrap_or_default();
        options.set_credentials(username.clone(), password);
    }

    options
}

pub(crate) fn to_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn generated_client_id() -> String {
    format!("meshrelay-{}", uuid::Uuid::new_v4().simple())
}

fn transport(config: &MqttConfig) -> Transport {
    match (config.transport, config.tls) {
        (TransportMode::Tcp, false) => Transport::Tcp,
        (TransportMode::Tcp, true) => Transport::Tls(tls_configuration(config)),
        (TransportMode::Websockets, false) => Transport::Ws,
        (TransportMode::Websockets, true) => Transport::Wss(tls_configuration(config)),
    }
}

/// Insecure mode wins over a CA file; an unreadable CA file falls back to
/// the platform roots.
fn tls_configuration(config: &MqttConfig) -> TlsConfiguration {
    if config.tls_insecure {
        return TlsConfiguration::Rustls(tls::insecure_client_config());
    }

    if let Some(path) = &config.ca_cert_path {
        match std::fs::read(path) {
            Ok(ca) => {
                return TlsConfiguration::Simple {
                    ca,
                    alpn: None,
                    client_auth: None,
                };
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read MQTT CA cert");
            },
        }
    }

    TlsConfiguration::default()
}
