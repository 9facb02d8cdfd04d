use tracing::info_span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize logging facade with stderr output.
pub(crate) fn init_logging() {
    let init_result = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jremap=info,warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    let _ = init_result;
}

/// Run a closure inside a named span.
pub(crate) fn with_span<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = info_span!("phase", name);
    let _guard = span.enter();
    f()
}
