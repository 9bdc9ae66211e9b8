//! On-disk and in-memory exchange of graphs in a fixed RDF syntax.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use oxrdf::{Graph, GraphName};
use oxrdfio::{RdfFormat, RdfParseError, RdfParser, RdfSerializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialization syntaxes understood by the exchange layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangeFormat {
    /// RDF/XML, the intermediate syntax between pipeline stages.
    #[default]
    RdfXml,
    NTriples,
    Turtle,
}

impl ExchangeFormat {
    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::RdfXml => RdfFormat::RdfXml,
            Self::NTriples => RdfFormat::NTriples,
            Self::Turtle => RdfFormat::Turtle,
        }
    }

    /// IANA media type of the syntax.
    #[must_use]
    pub fn media_type(self) -> &'static str {
        self.rdf_format().media_type()
    }

    /// Canonical file extension, without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::RdfXml => "rdf",
            Self::NTriples => "nt",
            Self::Turtle => "ttl",
        }
    }

    /// Guesses the syntax from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rdf" | "owl" | "xml" => Some(Self::RdfXml),
            "nt" => Some(Self::NTriples),
            "ttl" => Some(Self::Turtle),
            _ => None,
        }
    }
}

impl std::str::FromStr for ExchangeFormat {
    type Err = ExchangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rdf-xml" | "rdfxml" | "xml" => Ok(Self::RdfXml),
            "n-triples" | "ntriples" | "nt" => Ok(Self::NTriples),
            "turtle" | "ttl" => Ok(Self::Turtle),
            other => Err(ExchangeError::UnknownFormat(other.to_string())),
        }
    }
}

/// Errors raised while reading or writing serialized graphs.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("cannot access `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("i/o failure on {format:?} stream: {source}")]
    Stream {
        format: ExchangeFormat,
        source: io::Error,
    },
    #[error("malformed {format:?} input: {message}")]
    Syntax {
        format: ExchangeFormat,
        message: String,
    },
    #[error("unsupported exchange format `{0}`")]
    UnknownFormat(String),
}

/// Writes `graph` to `path`, replacing any previous content.
pub fn save_to_file(graph: &Graph, path: &Path, format: ExchangeFormat) -> Result<(), ExchangeError> {
    let io_error = |source| ExchangeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = write_graph(graph, BufWriter::new(file), format)?;
    writer.flush().map_err(io_error)
}

/// Reads the triple set stored at `path`.
pub fn load_from_file(path: &Path, format: ExchangeFormat) -> Result<Graph, ExchangeError> {
    let file = File::open(path).map_err(|source| ExchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_graph(BufReader::new(file), format)
}

/// Serializes `graph` into a byte buffer.
pub fn to_bytes(graph: &Graph, format: ExchangeFormat) -> Result<Vec<u8>, ExchangeError> {
    write_graph(graph, Vec::new(), format)
}

/// Parses a byte buffer into a graph.
pub fn from_bytes(bytes: &[u8], format: ExchangeFormat) -> Result<Graph, ExchangeError> {
    read_graph(bytes, format)
}

fn write_graph<W: Write>(graph: &Graph, writer: W, format: ExchangeFormat) -> Result<W, ExchangeError> {
    let serialize_error = |source| ExchangeError::Stream { format, source };
    let mut serializer = RdfSerializer::from_format(format.rdf_format()).for_writer(writer);
    for triple in graph {
        serializer.serialize_triple(triple).map_err(serialize_error)?;
    }
    serializer.finish().map_err(serialize_error)
}

fn read_graph(reader: impl io::Read, format: ExchangeFormat) -> Result<Graph, ExchangeError> {
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(format.rdf_format()).for_reader(reader) {
        let quad = quad.map_err(|error| match error {
            RdfParseError::Io(source) => ExchangeError::Stream { format, source },
            RdfParseError::Syntax(error) => ExchangeError::Syntax {
                format,
                message: error.to_string(),
            },
        })?;
        if quad.graph_name != GraphName::DefaultGraph {
            return Err(ExchangeError::Syntax {
                format,
                message: format!("unexpected named graph {}", quad.graph_name),
            });
        }
        graph.insert(&oxrdf::Triple::from(quad));
    }
    Ok(graph)
}
