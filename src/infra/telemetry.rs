use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output such as `confirm-link`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

/// Register descriptions for every metric the services emit. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_newsletter_confirmed_total",
            Unit::Count,
            "Total number of newsletter subscriptions confirmed."
        );
        describe_counter!(
            "folio_newsletter_already_subscribed_total",
            Unit::Count,
            "Total number of confirmations for addresses already in the audience."
        );
        describe_counter!(
            "folio_newsletter_confirm_failed_total",
            Unit::Count,
            "Total number of confirmation requests that failed."
        );
        describe_counter!(
            "folio_newsletter_subscribe_total",
            Unit::Count,
            "Total number of confirmation emails requested."
        );
        describe_counter!(
            "folio_social_image_rendered_total",
            Unit::Count,
            "Total number of social preview images rendered."
        );
        describe_counter!(
            "folio_social_image_failed_total",
            Unit::Count,
            "Total number of social preview renders that failed."
        );
        describe_histogram!(
            "folio_social_image_render_ms",
            Unit::Milliseconds,
            "Social preview render latency in milliseconds."
        );
    });
}
