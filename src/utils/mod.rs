//! Utilities: logging bootstrap (level from -v/-q, `RUST_LOG` override).
//!
//! Key items:
//!   derive_level / init_logging
//!   filter_directive

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logging helpers.
pub mod logging {
    use super::*;

    /// `-q` wins over any `-v`; otherwise 0 -> info, 1 -> debug, 2+ -> trace.
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Directive used when `RUST_LOG` is unset: our own crate at `level`,
    /// dependencies (reqwest, hyper, rustls) held at warn.
    pub fn filter_directive(level: LevelFilter) -> String {
        let own = level.to_string().to_lowercase();
        if level <= LevelFilter::WARN {
            own
        } else {
            format!("warn,{}={own}", env!("CARGO_CRATE_NAME"))
        }
    }

    /// Install the global subscriber. Logs go to stderr so `--json` output
    /// on stdout stays machine-readable. Safe to call more than once.
    pub fn init_logging(level: LevelFilter) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(level >= LevelFilter::DEBUG)
            .without_time()
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

#[cfg(test)]
mod tests {
    use super::logging::*;
    use super::*;

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(derive_level(3, true), LevelFilter::ERROR);
    }

    #[test]
    fn verbosity_steps() {
        assert_eq!(derive_level(0, false), LevelFilter::INFO);
        assert_eq!(derive_level(1, false), LevelFilter::DEBUG);
        assert_eq!(derive_level(2, false), LevelFilter::TRACE);
        assert_eq!(derive_level(9, false), LevelFilter::TRACE);
    }

    #[test]
    fn directive_scopes_verbose_levels_to_this_crate() {
        assert_eq!(filter_directive(LevelFilter::ERROR), "error");
        assert_eq!(
            filter_directive(LevelFilter::DEBUG),
            format!("warn,{}=debug", env!("CARGO_CRATE_NAME"))
        );
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(LevelFilter::INFO);
        init_logging(LevelFilter::DEBUG);
    }
}
