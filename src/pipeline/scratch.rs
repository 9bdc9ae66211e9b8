//! Invocation-scoped working area for the intermediate RDF/XML documents.
//!
//! Every run gets its own arena: a private in-memory buffer map or a
//! directory named after the invocation id. Concurrent runs never share a
//! path, so their intermediate ontologies cannot overwrite each other.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use oxrdf::Graph;
use uuid::Uuid;

use crate::{
    config::ScratchSettings,
    ontology::exchange::{self, ExchangeError, ExchangeFormat},
};

/// Exported snapshot fetched from the store.
pub const EXPORTED: &str = "exported.rdf";
/// Materialized ontology.
pub const INFERRED: &str = "inferred.rdf";

const FORMAT: ExchangeFormat = ExchangeFormat::RdfXml;

#[derive(Debug)]
enum Arena {
    Memory(BTreeMap<String, Vec<u8>>),
    Directory(PathBuf),
}

#[derive(Debug)]
pub struct Scratch {
    arena: Arena,
    keep: bool,
}

impl Scratch {
    /// Opens the arena of invocation `id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the scratch directory cannot be created.
    pub fn open(settings: &ScratchSettings, id: Uuid, keep: bool) -> std::io::Result<Self> {
        let arena = match settings {
            ScratchSettings::Memory => Arena::Memory(BTreeMap::new()),
            ScratchSettings::Directory { root } => {
                let dir = root.join(id.to_string());
                std::fs::create_dir_all(&dir)?;
                Arena::Directory(dir)
            }
        };
        Ok(Self { arena, keep })
    }

    /// Directory of the arena, `None` for in-memory arenas.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        match &self.arena {
            Arena::Memory(_) => None,
            Arena::Directory(dir) => Some(dir),
        }
    }

    /// Serializes `graph` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub fn write(&mut self, name: &str, graph: &Graph) -> Result<(), ExchangeError> {
        match &mut self.arena {
            Arena::Memory(documents) => {
                documents.insert(name.to_string(), exchange::to_bytes(graph, FORMAT)?);
                Ok(())
            }
            Arena::Directory(dir) => exchange::save_to_file(graph, &dir.join(name), FORMAT),
        }
    }

    /// Parses the document stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is missing or malformed.
    pub fn read(&self, name: &str) -> Result<Graph, ExchangeError> {
        match &self.arena {
            Arena::Memory(documents) => {
                let bytes = documents
                    .get(name)
                    .ok_or_else(|| ExchangeError::Io {
                        path: PathBuf::from(name),
                        source: std::io::ErrorKind::NotFound.into(),
                    })?;
                exchange::from_bytes(bytes, FORMAT)
            }
            Arena::Directory(dir) => exchange::load_from_file(&dir.join(name), FORMAT),
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let Arena::Directory(dir) = &self.arena else {
            return;
        };
        if self.keep {
            tracing::debug!(dir = %dir.display(), "scratch directory kept");
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), err.msg = %err, err.detail = ?err, "failed to remove scratch directory");
        }
    }
}
