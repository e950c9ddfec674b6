use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub(crate) fn trace_log_path() -> Option<PathBuf> {
    env::var("VOXJOT_TRACE_LOG").map(PathBuf::from).ok()
}

/// Install the global subscriber once. Events go to stderr so stdout stays
/// reserved for the transcript; `VOXJOT_TRACE_LOG` redirects them to a JSON
/// lines file instead.
pub fn init_tracing(verbose: bool) {
    let _ = TRACING_INIT.get_or_init(|| {
        if let Some(path) = trace_log_path() {
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(_) => return,
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_max_level(Level::DEBUG)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            return;
        }

        let max_level = if verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_max_level(max_level)
            .with_target(false)
            .without_time()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
