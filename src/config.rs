//! # Configuration Management
//!
//! Configuration is read from `config/<environment>.yaml`. Files are rendered
//! with [`tera`] first, so values can be pulled from the process environment:
//!
//! ```yaml
//! store:
//!   kind: sparql
//!   endpoint: {{ get_env(name="STORE_ENDPOINT", default="http://localhost:7200/repositories/emoStory") }}
//! ```
//!
//! The folder holding the files defaults to `config` and can be moved with
//! the `INFERENCE_CONFIG_FOLDER` environment variable.
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{environment::Environment, logger, ontology::exchange::ExchangeFormat, Error, Result};

pub const CONFIG_FOLDER_ENV: &str = "INFERENCE_CONFIG_FOLDER";
const DEFAULT_CONFIG_FOLDER: &str = "config";

/// Fixed read query of the Serve publisher: agents with the emotion they feel.
pub const DEFAULT_SERVE_QUERY: &str = r##"PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX : <http://www.purl.org/drammar#>
SELECT (STRAFTER(STR(?individuo), "#") AS ?i) ?emo
WHERE {
    ?individuo rdf:type :Agent .
    ?individuo :feels ?emo .
}"##;

/// Main application configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub server: Server,
    pub store: StoreSettings,
    #[serde(default)]
    pub reasoner: ReasonerSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Logger configuration.
///
/// Example (development):
/// ```yaml
/// logger:
///   enable: true
///   level: debug
///   format: compact
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logger {
    pub enable: bool,

    /// Set the logger level.
    ///
    /// * options: `trace` | `debug` | `info` | `warn` | `error`
    pub level: logger::LogLevel,

    /// Set the logger format.
    ///
    /// * options: `compact` | `pretty` | `json`
    pub format: logger::Format,

    /// Override the default filter, for example `inference_endpoint=trace,tower_http=debug`.
    pub override_filter: Option<String>,

    /// Mirror logs to rolling files.
    pub file_appender: Option<LoggerFileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: logger::LogLevel::default(),
            format: logger::Format::default(),
            override_filter: None,
            file_appender: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggerFileAppender {
    pub enable: bool,
    #[serde(default)]
    pub non_blocking: bool,
    pub level: logger::LogLevel,
    pub format: logger::Format,
    pub rotation: logger::Rotation,
    pub dir: Option<String>,
    pub filename_prefix: Option<String>,
    pub filename_suffix: Option<String>,
    pub max_log_files: usize,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
    /// The address the server binds to.
    #[serde(default = "default_binding")]
    pub binding: String,
    /// The port the server listens on.
    pub port: u16,
    /// Origins allowed by the CORS layer. Empty means no CORS headers.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            binding: default_binding(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

impl Server {
    #[must_use]
    pub fn full_url(&self) -> String {
        format!("http://{}:{}", self.binding, self.port)
    }
}

fn default_binding() -> String {
    "localhost".to_string()
}

/// Graph store backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    /// Remote store speaking the SPARQL 1.1 protocol.
    Sparql(SparqlStoreSettings),
    /// Process-local store, mostly for tests and demos.
    InMemory(InMemoryStoreSettings),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SparqlStoreSettings {
    /// Query endpoint, the repository root.
    pub endpoint: String,
    /// Update surface relative to `endpoint`.
    #[serde(default = "default_update_path")]
    pub update_path: String,
    /// Named graph to read from and write to. The default graph when unset.
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// Page size of construct queries. Unpaged when unset.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Number of triples per `INSERT DATA` request.
    #[serde(default = "default_persist_batch_size")]
    pub persist_batch_size: usize,
}

fn default_update_path() -> String {
    "/statements".to_string()
}

fn default_store_timeout_ms() -> u64 {
    30_000
}

fn default_persist_batch_size() -> usize {
    5_000
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InMemoryStoreSettings {
    /// RDF files loaded into the store at boot; the syntax follows the extension.
    #[serde(default)]
    pub seeds: Vec<PathBuf>,
}

/// Reasoner backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasonerSettings {
    /// Asserted class and property hierarchy only, read in process.
    Structural,
    /// External reasoner executable exchanging files with the pipeline.
    Process(ProcessReasonerSettings),
}

impl Default for ReasonerSettings {
    fn default() -> Self {
        Self::Structural
    }
}

/// External reasoner invocation.
///
/// ```yaml
/// reasoner:
///   kind: process
///   program: robot
///   args: ["reason", "--input", "{input}", "--output", "{output}"]
///   inconsistency_pattern: "(?i)inconsistent"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessReasonerSettings {
    pub program: String,
    /// Arguments; `{input}` and `{output}` are replaced by the session files.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub input_format: ExchangeFormat,
    #[serde(default)]
    pub output_format: ExchangeFormat,
    /// Regex matched against stderr of a failed run to detect inconsistency.
    #[serde(default)]
    pub inconsistency_pattern: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    50
}

/// Which entailments the materializer asks for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceSettings {
    /// Only immediate subclasses.
    #[serde(default = "default_true")]
    pub direct_subclasses: bool,
    /// Only the most specific types. Inherited types are asserted when false.
    #[serde(default)]
    pub direct_types: bool,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            direct_subclasses: true,
            direct_types: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Where an invocation keeps its intermediate files.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScratchSettings {
    #[default]
    Memory,
    Directory {
        root: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub scratch: ScratchSettings,
    /// Leave scratch directories behind for inspection.
    #[serde(default)]
    pub keep_scratch: bool,
    /// Upper bound of the reasoning stage.
    #[serde(default)]
    pub reasoning_timeout_ms: Option<u64>,
    #[serde(default = "default_serve_query")]
    pub serve_query: String,
    /// Serialize concurrent Persist publications per store location.
    #[serde(default = "default_true")]
    pub exclusive_persist: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch: ScratchSettings::default(),
            keep_scratch: false,
            reasoning_timeout_ms: None,
            serve_query: default_serve_query(),
            exclusive_persist: true,
        }
    }
}

fn default_serve_query() -> String {
    DEFAULT_SERVE_QUERY.to_string()
}

impl Config {
    /// Creates a new configuration instance based on the specified environment.
    ///
    /// # Errors
    ///
    /// Returns error when the file is missing or cannot be rendered or parsed.
    pub fn new(env: &Environment) -> Result<Self> {
        let config = Self::from_folder(env, &config_folder())?;
        Ok(config)
    }

    /// Loads configuration settings from a folder for the specified environment.
    ///
    /// # Errors
    ///
    /// Returns error when the file is missing or cannot be rendered or parsed.
    pub fn from_folder(env: &Environment, path: &Path) -> Result<Self> {
        let file = path.join(format!("{env}.yaml"));
        let content = fs::read_to_string(&file).map_err(|err| {
            Error::Message(format!("cannot read config file `{}`: {err}", file.display()))
        })?;
        info!(config_file = %file.display(), "loading environment from");
        Self::from_yaml(&content).map_err(|err| match err {
            Error::YAML(err) => Error::YAMLFile(err, file.display().to_string()),
            err => err,
        })
    }

    /// Renders and parses YAML configuration text.
    ///
    /// # Errors
    ///
    /// Returns error when templating or parsing fails.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let rendered = render_string(content)?;
        Ok(serde_yaml::from_str(&rendered)?)
    }
}

fn config_folder() -> PathBuf {
    std::env::var(CONFIG_FOLDER_ENV).map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FOLDER), PathBuf::from)
}

fn render_string(template: &str) -> Result<String> {
    Ok(tera::Tera::one_off(template, &tera::Context::new(), false)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
store:
  kind: in_memory
";

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).expect("config");
        assert!(matches!(config.store, StoreSettings::InMemory(ref s) if s.seeds.is_empty()));
        assert!(matches!(config.reasoner, ReasonerSettings::Structural));
        assert!(config.inference.direct_subclasses);
        assert!(!config.inference.direct_types);
        assert!(matches!(config.pipeline.scratch, ScratchSettings::Memory));
        assert!(config.pipeline.exclusive_persist);
        assert_eq!(config.pipeline.serve_query, DEFAULT_SERVE_QUERY);
        assert_eq!(config.server.full_url(), "http://localhost:8080");
    }

    #[test]
    fn sparql_store_defaults_to_statements_path() {
        let config = Config::from_yaml(
            r"
store:
  kind: sparql
  endpoint: http://localhost:7200/repositories/emoStory
  page_size: 10000
reasoner:
  kind: process
  program: robot
  args: ['reason', '--input', '{input}', '--output', '{output}']
",
        )
        .expect("config");
        let StoreSettings::Sparql(store) = config.store else {
            panic!("expected sparql store");
        };
        assert_eq!(store.update_path, "/statements");
        assert_eq!(store.page_size, Some(10_000));
        assert_eq!(store.graph, None);
        let ReasonerSettings::Process(reasoner) = config.reasoner else {
            panic!("expected process reasoner");
        };
        assert_eq!(reasoner.args[2], "{input}");
        assert_eq!(reasoner.input_format, ExchangeFormat::RdfXml);
    }

    #[test]
    fn values_are_rendered_from_environment() {
        std::env::set_var("INFERENCE_TEST_STORE_PORT", "7999");
        let config = Config::from_yaml(
            r#"
server:
  port: {{ get_env(name="INFERENCE_TEST_STORE_PORT", default="1") }}
store:
  kind: in_memory
"#,
        )
        .expect("config");
        assert_eq!(config.server.port, 7999);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::from_folder(&Environment::Any("nope".to_string()), Path::new("/nonexistent"))
            .expect_err("missing file");
        assert!(err.to_string().contains("nope.yaml"));
    }
}
