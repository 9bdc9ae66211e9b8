//! Initialization of the `tracing` subscriber from [`config::Logger`].

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config;

// Guard of the non-blocking file writer; dropping it would lose buffered lines.
static NONBLOCKING_WORK_GUARD_KEEP: OnceLock<WorkerGuard> = OnceLock::new();

const MODULE_WHITELIST: &[&str] = &["inference_endpoint", "tower_http", "reqwest"];

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize)]
pub enum LogLevel {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize)]
pub enum Format {
    #[serde(rename = "compact")]
    #[default]
    Compact,
    #[serde(rename = "pretty")]
    Pretty,
    #[serde(rename = "json")]
    Json,
}

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize)]
pub enum Rotation {
    #[serde(rename = "minutely")]
    Minutely,
    #[serde(rename = "hourly")]
    #[default]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "never")]
    Never,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(level)
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level and filter. Calling
/// this twice is harmless: the second installation is ignored.
pub fn init(config: &config::Logger) {
    if !config.enable {
        return;
    }

    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    if let Some(file_appender_config) = config.file_appender.as_ref() {
        if file_appender_config.enable {
            let dir = file_appender_config
                .dir
                .as_ref()
                .map_or_else(|| "./logs".to_string(), ToString::to_string);

            let mut rolling_builder = tracing_appender::rolling::Builder::default()
                .max_log_files(file_appender_config.max_log_files);

            rolling_builder = match file_appender_config.rotation {
                Rotation::Minutely => {
                    rolling_builder.rotation(tracing_appender::rolling::Rotation::MINUTELY)
                }
                Rotation::Hourly => {
                    rolling_builder.rotation(tracing_appender::rolling::Rotation::HOURLY)
                }
                Rotation::Daily => rolling_builder.rotation(tracing_appender::rolling::Rotation::DAILY),
                Rotation::Never => rolling_builder.rotation(tracing_appender::rolling::Rotation::NEVER),
            };

            if let Some(prefix) = &file_appender_config.filename_prefix {
                rolling_builder = rolling_builder.filename_prefix(prefix);
            }
            if let Some(suffix) = &file_appender_config.filename_suffix {
                rolling_builder = rolling_builder.filename_suffix(suffix);
            }

            match rolling_builder.build(dir) {
                Ok(file_appender) => {
                    let file_appender_layer = if file_appender_config.non_blocking {
                        let (non_blocking_file_appender, work_guard) =
                            tracing_appender::non_blocking(file_appender);
                        let _ = NONBLOCKING_WORK_GUARD_KEEP.set(work_guard);
                        init_layer(
                            non_blocking_file_appender,
                            &file_appender_config.format,
                            false,
                        )
                    } else {
                        init_layer(file_appender, &file_appender_config.format, false)
                    };
                    layers.push(file_appender_layer);
                }
                Err(err) => {
                    eprintln!("cannot create the log file appender: {err}");
                }
            }
        }
    }

    let stdout_layer = init_layer(std::io::stdout, &config.format, true);
    layers.push(stdout_layer);

    if !layers.is_empty() {
        let env_filter = init_env_filter(config.override_filter.as_ref(), &config.level);
        let _ = tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init();
    }
}

fn init_env_filter(override_filter: Option<&String>, level: &LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            // user wanted a specific filter, don't care about our internal whitelist
            // or, if no override give them the default whitelisted filter (most common)
            override_filter.map_or_else(
                || {
                    EnvFilter::try_new(
                        MODULE_WHITELIST
                            .iter()
                            .map(|module| format!("{module}={level}"))
                            .collect::<Vec<_>>()
                            .join(","),
                    )
                },
                EnvFilter::try_new,
            )
        })
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

fn init_layer<W2>(
    make_writer: W2,
    format: &Format,
    ansi: bool,
) -> Box<dyn Layer<Registry> + Sync + Send>
where
    W2: for<'writer> MakeWriter<'writer> + Sync + Send + 'static,
{
    match format {
        Format::Compact => fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .compact()
            .boxed(),
        Format::Pretty => fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .pretty()
            .boxed(),
        Format::Json => fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .json()
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::{init_env_filter, LogLevel};

    #[test]
    fn default_filter_whitelists_crate_modules() {
        std::env::remove_var("RUST_LOG");
        let filter = init_env_filter(None, &LogLevel::Debug).to_string();
        assert!(filter.contains("inference_endpoint=debug"));
        assert!(filter.contains("tower_http=debug"));
    }

    #[test]
    fn override_filter_wins_over_level() {
        std::env::remove_var("RUST_LOG");
        let custom = "inference_endpoint=trace".to_string();
        let filter = init_env_filter(Some(&custom), &LogLevel::Error).to_string();
        assert_eq!(filter, "inference_endpoint=trace");
    }
}
