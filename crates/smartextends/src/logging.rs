//! Tracing setup for the CLI.
//!
//! Logs go to stderr through a non-blocking writer so stdout only ever
//! carries command output. `RUST_LOG` takes precedence over `-v`/`-q` and the
//! `debug` setting.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::args::GlobalArgs;

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered log lines are lost.
pub fn init_tracing(default_directive: &str) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let stderr_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter);

    Registry::default().with(stderr_layer).init();

    guard
}

pub fn default_directive(global: &GlobalArgs, debug: bool) -> &'static str {
    if global.quiet {
        return "off";
    }
    match global.verbose {
        0 if debug => "debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
