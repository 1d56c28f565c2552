//! Log output for the `bob` binary

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVE: &str = "warn,bob=info,convenient_actions=info,convenient_launch=info";

/// Filter directive for the given verbosity
#[must_use]
pub fn directive(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => DEFAULT_DIRECTIVE,
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over the verbosity
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| directive(verbose, quiet).into());
    // a second init (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(directive(0, true), "error");
        assert_eq!(directive(3, true), "error");
        assert_eq!(directive(0, false), DEFAULT_DIRECTIVE);
        assert_eq!(directive(1, false), "debug");
        assert_eq!(directive(2, false), "trace");
        assert!(directive(0, false).parse::<EnvFilter>().is_ok());
    }
}
