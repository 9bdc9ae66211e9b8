//! Removal of axioms mentioning the universal properties.
//!
//! `owl:topObjectProperty` and `owl:topDataProperty` relate everything to
//! everything. Axioms over them, such as `SubDataPropertyOf(p, owl:topDataProperty)`
//! emitted by some serializers, carry no information and are dropped before
//! the ontology reaches a reasoner. Untyped statements that mention them, for
//! instance on an anonymous individual, are dropped from the residual triples
//! as well.
use oxrdf::{TermRef, TripleRef};
use serde::Serialize;

use crate::ontology::{entities::Ontology, value_objects::Iri, vocabulary::owl};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub removed: usize,
}

#[derive(Clone, Debug)]
pub struct Sanitizer {
    excluded: Vec<Iri>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            excluded: vec![owl::TOP_OBJECT_PROPERTY.into(), owl::TOP_DATA_PROPERTY.into()],
        }
    }
}

impl Sanitizer {
    /// Returns `true` when `iri` is one of the excluded properties.
    #[must_use]
    pub fn is_excluded(&self, iri: &Iri) -> bool {
        self.excluded.contains(iri)
    }

    fn mentions_excluded(&self, triple: TripleRef<'_>) -> bool {
        let excluded = |term: TermRef<'_>| match term {
            TermRef::NamedNode(node) => self
                .excluded
                .iter()
                .any(|iri| iri.as_str() == node.as_str()),
            _ => false,
        };
        excluded(TermRef::from(triple.subject))
            || excluded(triple.predicate.into())
            || excluded(triple.object)
    }

    pub fn sanitize(&self, ontology: &mut Ontology) -> SanitizeReport {
        let mut removed = ontology.retain_axioms(|axiom| {
            !self.excluded.iter().any(|excluded| axiom.references(excluded))
        });
        removed += ontology.retain_residual(|triple| !self.mentions_excluded(triple));
        if removed > 0 {
            tracing::debug!(removed, "top property axioms removed");
        }
        SanitizeReport { removed }
    }
}
