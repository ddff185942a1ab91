//! Logging initialization

use std::path::PathBuf;

/// Initialize logging based on the debug flag.
///
/// Without `--debug`, logs go to stderr at the level selected by `RUST_LOG`
/// (default `info`). With it, debug-level logs are written to a temp file so
/// verbose discovery traces do not drown the command output; the file path
/// is returned for the caller to print.
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if debug {
        // Use a named temp file that outlives this call, cross-platform
        let temp_file = tempfile::Builder::new()
            .prefix("kubegraph-")
            .suffix(".log")
            .tempfile()
            .map(|f| {
                let path = f.path().to_path_buf();
                // Keep the file alive by leaking it (the OS cleans it up)
                std::mem::forget(f);
                path
            })
            .unwrap_or_else(|_| {
                let temp_dir = std::env::temp_dir();
                temp_dir.join(format!("kubegraph-{}.log", std::process::id()))
            });

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_file)
            .expect("Failed to open log file");

        tracing_subscriber::fmt()
            .with_writer(file)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_ansi(false) // No ANSI codes in log file
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();

        Some(temp_file)
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();

        None
    }
}
