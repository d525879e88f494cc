//! Metrics recorder initialization and configuration.

use {anyhow::Result, tracing::info};

/// Handle to the installed recorder, used by the `/metrics` endpoint.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    ///
    /// Empty when collection is disabled or the exporter is not compiled in.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
}

/// Install the global recorder.
///
/// Call once at startup. When disabled, or when the `prometheus` feature is
/// off, no recorder is installed and the facade macros stay no-ops.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed (for
/// example because another recorder is already registered).
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics requested but the prometheus feature is not compiled in");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {
        crate::{buckets, webhook},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(webhook::PROCESSING_DURATION_SECONDS.to_string()),
        buckets::PROCESSING_DURATION,
    )?;

    // Install globally without spawning an HTTP listener; the gateway serves
    // the rendered text itself.
    Ok(builder.install_recorder()?)
}
