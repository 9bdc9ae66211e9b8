use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use oxrdf::{Literal, NamedNode, NamedNodeRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value object ensuring that supplied text represents a valid IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri {
    value: String,
}

impl Iri {
    /// Validates and constructs a new [`Iri`] value object.
    ///
    /// The constructor rejects malformed identifiers so every axiom of an
    /// ontology references a canonical entity name.
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        NamedNode::new(value.as_str()).map_err(|_| IriError::Invalid {
            value: value.clone(),
        })?;
        Ok(Self { value })
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Borrows the IRI as an RDF named node.
    #[must_use]
    pub fn as_named_node(&self) -> NamedNodeRef<'_> {
        NamedNodeRef::new_unchecked(&self.value)
    }

    /// Returns the fragment or last path segment, the usual "local name".
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.value
            .rsplit_once('#')
            .or_else(|| self.value.rsplit_once('/'))
            .map_or(self.value.as_str(), |(_, local)| local)
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iri {
    type Err = IriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Iri {
    type Error = IriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(value: Iri) -> Self {
        value.value
    }
}

impl From<NamedNode> for Iri {
    fn from(node: NamedNode) -> Self {
        Self {
            value: node.into_string(),
        }
    }
}

impl From<NamedNodeRef<'_>> for Iri {
    fn from(node: NamedNodeRef<'_>) -> Self {
        Self {
            value: node.as_str().to_owned(),
        }
    }
}

impl From<&Iri> for NamedNode {
    fn from(iri: &Iri) -> Self {
        NamedNode::new_unchecked(iri.value.clone())
    }
}

/// Errors produced when validating an [`Iri`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    /// The provided text could not be parsed as an IRI.
    #[error("invalid IRI: {value}")]
    Invalid { value: String },
}

/// Literal value attached to data property assertions.
///
/// Unlike [`oxrdf::Literal`] the value object is totally ordered, which keeps
/// axiom sets deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralValue {
    lexical: String,
    datatype: String,
    language: Option<String>,
}

impl LiteralValue {
    /// Builds a `xsd:string` literal.
    #[must_use]
    pub fn simple(lexical: impl Into<String>) -> Self {
        Self::from(Literal::new_simple_literal(lexical))
    }

    /// Builds a literal with an explicit datatype.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: &Iri) -> Self {
        Self::from(Literal::new_typed_literal(lexical, NamedNode::from(datatype)))
    }

    /// Returns the lexical form.
    #[must_use]
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// Returns the datatype IRI.
    #[must_use]
    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    /// Returns the language tag, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Converts the value object back into an RDF literal.
    #[must_use]
    pub fn to_literal(&self) -> Literal {
        match &self.language {
            Some(language) => {
                Literal::new_language_tagged_literal_unchecked(&self.lexical, language)
            }
            None => Literal::new_typed_literal(
                &self.lexical,
                NamedNode::new_unchecked(self.datatype.clone()),
            ),
        }
    }
}

impl From<Literal> for LiteralValue {
    fn from(literal: Literal) -> Self {
        let datatype = literal.datatype().as_str().to_owned();
        let (lexical, _, language) = literal.destruct();
        Self {
            lexical,
            datatype,
            language,
        }
    }
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.to_literal().fmt(f)
    }
}
