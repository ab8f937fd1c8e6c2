//! Logging setup for the relay binary.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_filter` (e.g. `"hubrelay_relay=info"`).
/// With `log_json` every event becomes one flattened JSON object per line.
pub fn init_tracing(default_filter: &str, log_json: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry.with(fmt.json().flatten_event(true)).try_init()
    } else {
        registry.with(fmt).try_init()
    }
}
