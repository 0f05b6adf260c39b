//! Relay lifecycle: log in, subscribe, hand messages to the pipeline, and
//! stop on SIGINT/SIGTERM.

use std::sync::Arc;

use {
    meshrelay_channels::ChannelCache,
    meshrelay_config::RelayConfig,
    meshrelay_discord::DiscordDestination,
    meshrelay_meshcore::{KeyStore, MeshCoreDecoder},
    meshrelay_mqtt::MqttTransport,
    meshrelay_relay::{ChannelRouter, Clock, DedupeCache, RelayPipeline, SystemClock},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info},
};

pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    #[cfg(feature = "metrics")]
    meshrelay_metrics::init_metrics(meshrelay_metrics::MetricsRecorderConfig {
        enabled: config.metrics.listen.is_some(),
        listen: config.metrics.listen.clone(),
        global_labels: Vec::new(),
    })?;

    let destination = match DiscordDestination::login(&config.discord.token).await {
        Ok(destination) => destination,
        Err(e) => {
            error!(error = %e, "Discord login failed");
            std::process::exit(1);
        },
    };

    let keys = KeyStore::new(&config.channel_secrets);
    info!(
        bot = destination.bot_name(),
        mappings = config.channels.len(),
        keys = keys.len(),
        default_channel = config.discord.default_channel_id.as_deref().unwrap_or("none"),
        "relay configured"
    );

    let dedupe = Arc::new(DedupeCache::new(config.relay.dedupe_seconds));
    let pipeline = Arc::new(RelayPipeline::new(
        Arc::new(MeshCoreDecoder),
        keys,
        Arc::clone(&dedupe),
        ChannelRouter::new(config.channels, config.discord.default_channel_id),
        ChannelCache::new(Arc::new(destination)),
    ));

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_loop(Arc::clone(&dedupe), cancel.clone()));

    let (transport, mut inbound) = MqttTransport::connect(&config.mqtt);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutting down...");
                break;
            },
            message = inbound.recv() => {
                let Some(message) = message else {
                    break;
                };
                // One task per message; in-flight sends are not awaited on shutdown.
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let outcome = pipeline.handle(&message).await;
                    debug!(topic = %message.topic, ?outcome, "message handled");
                });
            },
        }
    }

    cancel.cancel();
    transport.shutdown().await?;
    sweeper.await?;
    Ok(())
}

/// Evict stale dedupe entries until cancelled.
async fn sweep_loop(dedupe: Arc<DedupeCache>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(dedupe.sweep_interval());
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let removed = dedupe.sweep(SystemClock.now_millis());
                if removed > 0 {
                    debug!(removed, remaining = dedupe.len(), "dedupe sweep");
                }
            },
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
