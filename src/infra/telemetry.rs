use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_ENTRIES, METRIC_EVICT_TOTAL, METRIC_EXPIRED_TOTAL, METRIC_HIT_TOTAL,
    METRIC_LOCK_RECOVERED_TOTAL, METRIC_MISS_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Total number of index response-cache hits."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "Total number of index response-cache misses, expired entries included."
        );
        describe_counter!(
            METRIC_EXPIRED_TOTAL,
            Unit::Count,
            "Total number of cached responses dropped because their TTL elapsed."
        );
        describe_counter!(
            METRIC_EVICT_TOTAL,
            Unit::Count,
            "Total number of cached responses evicted due to capacity."
        );
        describe_counter!(
            METRIC_LOCK_RECOVERED_TOTAL,
            Unit::Count,
            "Total number of cache locks recovered after a panic poisoned them."
        );
        describe_gauge!(
            METRIC_ENTRIES,
            Unit::Count,
            "Current number of cached responses."
        );
    });
}
