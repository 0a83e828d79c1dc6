use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global Prometheus recorder. Until this runs the `metrics`
/// macros are no-ops.
pub fn install_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus metrics recorder")
}

pub mod logging {
    use std::fs::{self, OpenOptions};
    use std::io::IsTerminal;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    use clap::ValueEnum;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    pub const FILTER_ENV: &str = "PIXEL_BRIDGE_LOG_FILTER";

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        Warn,
        #[default]
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn as_str(self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    /// `file` adds an appending, uncoloured sink next to stderr.
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("invalid log filter {filter:?}: {reason}")]
        Filter { filter: String, reason: String },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    static INIT: OnceLock<()> = OnceLock::new();
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Later calls return `Ok(())` without
    /// touching the first configuration.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if INIT.get().is_some() {
            return Ok(());
        }
        inner_init(config)?;
        INIT.set(()).ok();
        Ok(())
    }

    fn inner_init(config: &LogConfig) -> Result<(), InitError> {
        let filter = build_env_filter(config.level)?;
        let verbose = config.level >= LogLevel::Debug;

        let file_layer = match &config.file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                let (writer, guard) = tracing_appender::non_blocking(file);
                let _ = GUARD.set(guard);
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(verbose)
                        .with_writer(writer),
                )
            }
            None => None,
        };

        // stdout belongs to the tool transport.
        let stderr_layer = fmt::layer()
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(verbose)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .map_err(|err| InitError::Configure(err.to_string()))
    }

    fn build_env_filter(level: LogLevel) -> Result<EnvFilter, InitError> {
        let filter = match std::env::var(FILTER_ENV) {
            Ok(filter) if !filter.trim().is_empty() => filter,
            _ => default_filter_for(level),
        };
        EnvFilter::try_new(&filter).map_err(|err| InitError::Filter {
            reason: err.to_string(),
            filter,
        })
    }

    const QUIET_DEPENDENCIES: &[&str] = &[
        "hyper",
        "hyper_util",
        "tungstenite",
        "tokio_tungstenite",
        "mio",
    ];

    fn default_filter_for(level: LogLevel) -> String {
        match level {
            LogLevel::Error | LogLevel::Warn | LogLevel::Info => level.as_str().to_owned(),
            LogLevel::Debug | LogLevel::Trace => {
                let mut filter = format!(
                    "info,pixel_bridge={0},pixel_bridge_core={0}",
                    level.as_str()
                );
                for target in QUIET_DEPENDENCIES {
                    filter.push(',');
                    filter.push_str(target);
                    filter.push_str("=info");
                }
                filter
            }
        }
    }

}
