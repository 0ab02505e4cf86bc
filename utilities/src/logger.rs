use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

// exporting the info! warn! etc tracing macros through this library
pub use tracing;
pub use tracing::*;

/// Where a process sends its diagnostics. Each binary builds this from its
/// own configuration; `file_dir: None` keeps everything on stdout, which is
/// what the one-shot client wants.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub service: String,
    pub node_id: String,
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn stdout_only(service: &str, node_id: &str) -> Self {
        LogSettings {
            service: service.to_owned(),
            node_id: node_id.to_owned(),
            file_dir: None,
        }
    }

    pub fn with_file_dir(service: &str, node_id: &str, dir: &str) -> Self {
        LogSettings {
            service: service.to_owned(),
            node_id: node_id.to_owned(),
            file_dir: Some(PathBuf::from(dir)),
        }
    }
}

/// Initialize process-wide logging: a compact stdout layer always, plus a
/// JSON file under `<file_dir>/<service>/<node_id>.log` when a directory is
/// configured. The returned guard, if any, must outlive the process or
/// buffered file lines are dropped.
pub fn init_logger(settings: LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let stdout_layer = fmt::layer().compact().with_target(false);

    let (file_layer, guard) = match &settings.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(
                dir.join(&settings.service),
                format!("{}.log", settings.node_id),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!(service = %settings.service, node_id = %settings.node_id, "Logging initialized");
    guard
}
