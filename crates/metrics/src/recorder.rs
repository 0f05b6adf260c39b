//! Metrics recorder initialization and configuration.

use tracing::info;

use crate::Result;

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Address for the HTTP exporter, e.g. `0.0.0.0:9464`. Nothing is
    /// installed without one since nothing could scrape it.
    pub listen: Option<String>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup, from inside a Tokio runtime when a listener is
/// configured. Without the `prometheus` feature the `metrics` facade stays
/// a no-op.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or the exporter fails
/// to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<()> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(());
    }

    #[cfg(feature = "prometheus")]
    {
        init_prometheus(config)
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(config: MetricsRecorderConfig) -> Result<()> {
    use {
        crate::{Error, buckets, relay},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let Some(listen) = config.listen else {
        info!("no metrics listen address, exporter not installed");
        return Ok(());
    };
    let addr: std::net::SocketAddr = listen
        .parse()
        .map_err(|_| Error::InvalidListen { address: listen.clone() })?;

    let mut builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(relay::HANDLE_DURATION_SECONDS.to_string()),
        &buckets::HANDLE_DURATION,
    )?;
    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    // The exporter serves `/metrics` itself.
    builder.with_http_listener(addr).install()?;
    info!(%addr, "prometheus exporter listening");
    Ok(())
}
