use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the log filter directive.
pub const LOG_ENV_VAR: &str = "MULTICHAT_LOG";

/// Build the filter used by [`init_tracing`].
///
/// An explicit `MULTICHAT_LOG` directive wins; otherwise `verbose` selects
/// between `debug` and `warn` for this crate.
pub fn build_filter(verbose: bool) -> EnvFilter {
    match std::env::var(LOG_ENV_VAR) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::new(directive),
        _ if verbose => EnvFilter::new("multichat=debug"),
        _ => EnvFilter::new("warn"),
    }
}

/// Install the global stderr subscriber. Calling it twice is harmless.
pub fn init_tracing(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
