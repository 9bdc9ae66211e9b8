//! Delegates reasoning to an external command line reasoner.
//!
//! Each session owns a private working directory. The ontology is written to
//! `input.<ext>`, the configured program is spawned with `{input}` and
//! `{output}` substituted in its arguments, and the classified ontology it
//! writes back answers the queries through a [`GraphSession`]. Consistency is
//! the tool's verdict alone: a failed run whose stderr matches the configured
//! pattern is an inconsistency.
use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use oxrdf::Graph;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::structural_reasoner::GraphSession;
use crate::{
    config::ProcessReasonerSettings,
    ontology::{
        entities::Ontology,
        exchange::{self, ExchangeFormat},
        repositories::{Reasoner, ReasonerSession},
        service::{OntologyServiceError, ReasonerError},
        value_objects::{Iri, LiteralValue},
    },
};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// A program invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CliCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CliCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl Into<Vec<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
        }
    }
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ProcessReasoner {
    settings: ProcessReasonerSettings,
    inconsistency: Option<Regex>,
    scratch_root: PathBuf,
}

impl ProcessReasoner {
    /// # Errors
    ///
    /// Returns an error when the program is empty or the inconsistency
    /// pattern is not a valid regex.
    pub fn new(settings: &ProcessReasonerSettings) -> Result<Self, OntologyServiceError> {
        if settings.program.trim().is_empty() {
            return Err(OntologyServiceError::configuration(
                "reasoner",
                "program must not be empty",
            ));
        }
        let inconsistency = settings
            .inconsistency_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|err| OntologyServiceError::configuration("reasoner", err))?;
        Ok(Self {
            settings: settings.clone(),
            inconsistency,
            scratch_root: std::env::temp_dir(),
        })
    }

    /// Places session directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    fn command(&self, input: &Path, output: &Path) -> CliCommand {
        let input = input.display().to_string();
        let output = output.display().to_string();
        let args = self
            .settings
            .args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect::<Vec<_>>();
        CliCommand::new(self.settings.program.clone(), args)
    }
}

impl Reasoner for ProcessReasoner {
    type Error = ReasonerError;

    fn name(&self) -> &str {
        &self.settings.program
    }

    fn load(
        &self,
        ontology: &Ontology,
    ) -> Result<Box<dyn ReasonerSession<Error = ReasonerError>>, ReasonerError> {
        let dir = self
            .scratch_root
            .join(format!("inference-reasoner-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).map_err(|err| {
            ReasonerError::Engine(format!("cannot create `{}`: {err}", dir.display()))
        })?;

        let input = dir.join(format!("input.{}", self.settings.input_format.extension()));
        let output = dir.join(format!("output.{}", self.settings.output_format.extension()));
        let asserted = ontology.to_graph();
        if let Err(err) = exchange::save_to_file(&asserted, &input, self.settings.input_format) {
            remove_session_dir(&dir);
            return Err(ReasonerError::Engine(err.to_string()));
        }

        Ok(Box::new(ProcessSession {
            command: self.command(&input, &output),
            output,
            output_format: self.settings.output_format,
            poll_interval: Duration::from_millis(self.settings.poll_interval_ms.max(1)),
            inconsistency: self.inconsistency.clone(),
            asserted,
            dir: Some(dir),
            answers: None,
        }))
    }
}

fn remove_session_dir(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        tracing::warn!(
            err.msg = %err,
            err.detail = ?err,
            dir = %dir.display(),
            "failed to remove reasoner directory"
        );
    }
}

/// Session backed by the files of one external run.
pub struct ProcessSession {
    command: CliCommand,
    output: PathBuf,
    output_format: ExchangeFormat,
    poll_interval: Duration,
    inconsistency: Option<Regex>,
    asserted: Graph,
    /// Taken by `dispose`; whatever is left is removed on drop.
    dir: Option<PathBuf>,
    answers: Option<GraphSession>,
}

impl ProcessSession {
    fn run(&self, cancel: &CancellationToken) -> Result<(), ReasonerError> {
        tracing::debug!(command = %self.command, "spawning external reasoner");
        let handle = duct::cmd(&self.command.program, &self.command.args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(|err| ReasonerError::Engine(format!("cannot spawn `{}`: {err}", self.command)))?;

        let output = loop {
            if cancel.is_cancelled() {
                if let Err(err) = handle.kill() {
                    tracing::warn!(err.msg = %err, err.detail = ?err, "failed to kill external reasoner");
                }
                return Err(ReasonerError::Cancelled);
            }
            match handle.try_wait() {
                Ok(Some(output)) => break output,
                Ok(None) => std::thread::sleep(self.poll_interval),
                Err(err) => return Err(ReasonerError::Engine(err.to_string())),
            }
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if self
            .inconsistency
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&stderr))
        {
            return Err(ReasonerError::Inconsistent { reason: stderr });
        }
        Err(ReasonerError::Engine(format!(
            "`{}` exited with {}: {stderr}",
            self.command, output.status
        )))
    }

    fn answers(&self) -> Result<&GraphSession, ReasonerError> {
        self.answers
            .as_ref()
            .ok_or_else(|| ReasonerError::Engine("session has not been precomputed".to_string()))
    }
}

impl ReasonerSession for ProcessSession {
    type Error = ReasonerError;

    fn precompute(&mut self, cancel: &CancellationToken) -> Result<(), ReasonerError> {
        if self.answers.is_some() {
            return Ok(());
        }
        self.run(cancel)?;

        let mut inferred = exchange::load_from_file(&self.output, self.output_format)
            .map_err(|err| ReasonerError::Engine(err.to_string()))?;
        inferred.extend(self.asserted.iter());

        let mut answers = GraphSession::new(inferred, false);
        answers.precompute(cancel)?;
        self.answers = Some(answers);
        Ok(())
    }

    fn subclasses_of(&self, class: &Iri, direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        self.answers()?.subclasses_of(class, direct)
    }

    fn types_of(&self, individual: &Iri, direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        self.answers()?.types_of(individual, direct)
    }

    fn object_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<Iri>, ReasonerError> {
        self.answers()?.object_property_values(individual, property)
    }

    fn data_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<LiteralValue>, ReasonerError> {
        self.answers()?.data_property_values(individual, property)
    }

    fn dispose(mut self: Box<Self>) -> Result<(), ReasonerError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        std::fs::remove_dir_all(&dir).map_err(|err| {
            ReasonerError::Disposal(format!("cannot remove `{}`: {err}", dir.display()))
        })
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            remove_session_dir(&dir);
        }
    }
}
