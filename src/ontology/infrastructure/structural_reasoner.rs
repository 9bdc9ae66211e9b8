//! Reasoner reading the class and property hierarchy of a graph as given.
//!
//! No description logic inference happens here. Answers are SPARQL property
//! path lookups evaluated by oxigraph over a graph: the asserted ontology for
//! [`StructuralReasoner`], or the classified output of an external tool for
//! the process backend. Subclass, type and property answers follow
//! `rdfs:subClassOf` and `rdfs:subPropertyOf` chains; the only consistency
//! check is an explicit clash with `owl:disjointWith` or `owl:Nothing`.
use std::collections::BTreeSet;

use oxigraph::{
    model::{GraphNameRef, Term},
    sparql::{QueryResults, SparqlEvaluator},
    store::Store,
};
use oxrdf::Graph;
use tokio_util::sync::CancellationToken;

use crate::ontology::{
    entities::Ontology,
    repositories::{Reasoner, ReasonerSession},
    service::ReasonerError,
    value_objects::{Iri, LiteralValue},
    vocabulary::is_reserved,
};

const PREFIXES: &str = "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
";

const CLASH: &str = "SELECT ?individual WHERE {
  { ?individual rdf:type/rdfs:subClassOf* owl:Nothing }
  UNION
  {
    ?individual rdf:type/rdfs:subClassOf* ?a .
    ?individual rdf:type/rdfs:subClassOf* ?b .
    { ?a owl:disjointWith ?b } UNION { ?b owl:disjointWith ?a }
  }
} LIMIT 1";

#[derive(Clone, Debug, Default)]
pub struct StructuralReasoner;

impl Reasoner for StructuralReasoner {
    type Error = ReasonerError;

    fn name(&self) -> &str {
        "structural"
    }

    fn load(
        &self,
        ontology: &Ontology,
    ) -> Result<Box<dyn ReasonerSession<Error = ReasonerError>>, ReasonerError> {
        Ok(Box::new(GraphSession::new(ontology.to_graph(), true)))
    }
}

/// Answers session queries over one graph held in an in-memory store.
pub struct GraphSession {
    pending: Option<Graph>,
    store: Option<Store>,
    check_clashes: bool,
}

fn engine(err: impl ToString) -> ReasonerError {
    ReasonerError::Engine(err.to_string())
}

impl GraphSession {
    /// `check_clashes` makes precompute fail on explicit disjointness clashes.
    #[must_use]
    pub fn new(graph: Graph, check_clashes: bool) -> Self {
        Self {
            pending: Some(graph),
            store: None,
            check_clashes,
        }
    }

    fn store(&self) -> Result<&Store, ReasonerError> {
        self.store
            .as_ref()
            .ok_or_else(|| engine("session has not been precomputed"))
    }

    /// Evaluates a single-variable `SELECT` and returns the bound terms.
    fn terms(store: &Store, query: &str) -> Result<Vec<Term>, ReasonerError> {
        let results = SparqlEvaluator::new()
            .parse_query(&format!("{PREFIXES}{query}"))
            .map_err(engine)?
            .on_store(store)
            .execute()
            .map_err(engine)?;
        let QueryResults::Solutions(solutions) = results else {
            return Err(engine("hierarchy lookups must be SELECT queries"));
        };
        let mut terms = Vec::new();
        for solution in solutions {
            if let Some(term) = solution.map_err(engine)?.get(0) {
                terms.push(term.clone());
            }
        }
        Ok(terms)
    }

    fn named(&self, query: &str) -> Result<BTreeSet<Iri>, ReasonerError> {
        Ok(Self::terms(self.store()?, query)?
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(node) if !is_reserved(node.as_str()) => Some(Iri::from(node)),
                _ => None,
            })
            .collect())
    }
}

impl ReasonerSession for GraphSession {
    type Error = ReasonerError;

    fn precompute(&mut self, cancel: &CancellationToken) -> Result<(), ReasonerError> {
        let Some(graph) = self.pending.take() else {
            return Ok(());
        };
        if cancel.is_cancelled() {
            return Err(ReasonerError::Cancelled);
        }
        let store = Store::new().map_err(engine)?;
        store
            .extend(
                graph
                    .iter()
                    .map(|triple| triple.in_graph(GraphNameRef::DefaultGraph)),
            )
            .map_err(engine)?;
        if cancel.is_cancelled() {
            return Err(ReasonerError::Cancelled);
        }

        if self.check_clashes {
            if let Some(individual) = Self::terms(&store, CLASH)?.into_iter().next() {
                return Err(ReasonerError::Inconsistent {
                    reason: format!("{individual} belongs to disjoint classes"),
                });
            }
        }
        tracing::debug!(triples = graph.len(), "hierarchy loaded");
        self.store = Some(store);
        Ok(())
    }

    fn subclasses_of(&self, class: &Iri, direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        let query = if direct {
            format!(
                "SELECT DISTINCT ?sub WHERE {{
  ?sub rdfs:subClassOf <{class}> .
  FILTER(isIRI(?sub) && ?sub != <{class}>)
  FILTER NOT EXISTS {{
    ?sub rdfs:subClassOf+ ?mid .
    ?mid rdfs:subClassOf+ <{class}> .
    FILTER(isIRI(?mid) && ?mid != ?sub && ?mid != <{class}>)
    FILTER NOT EXISTS {{ ?mid rdfs:subClassOf+ ?sub }}
  }}
}}"
            )
        } else {
            format!(
                "SELECT DISTINCT ?sub WHERE {{
  ?sub rdfs:subClassOf+ <{class}> .
  FILTER(isIRI(?sub) && ?sub != <{class}>)
}}"
            )
        };
        self.named(&query)
    }

    fn types_of(&self, individual: &Iri, direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        let query = if direct {
            format!(
                "SELECT DISTINCT ?class WHERE {{
  <{individual}> rdf:type/rdfs:subClassOf* ?class .
  FILTER(isIRI(?class))
  FILTER NOT EXISTS {{
    <{individual}> rdf:type/rdfs:subClassOf* ?narrower .
    ?narrower rdfs:subClassOf+ ?class .
    FILTER(isIRI(?narrower) && ?narrower != ?class)
    FILTER NOT EXISTS {{ ?class rdfs:subClassOf+ ?narrower }}
  }}
}}"
            )
        } else {
            format!(
                "SELECT DISTINCT ?class WHERE {{
  <{individual}> rdf:type/rdfs:subClassOf* ?class .
  FILTER(isIRI(?class))
}}"
            )
        };
        self.named(&query)
    }

    fn object_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<Iri>, ReasonerError> {
        self.named(&format!(
            "SELECT DISTINCT ?value WHERE {{
  <{individual}> ?p ?value .
  ?p rdfs:subPropertyOf* <{property}> .
  FILTER(isIRI(?value))
}}"
        ))
    }

    fn data_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<LiteralValue>, ReasonerError> {
        let query = format!(
            "SELECT DISTINCT ?value WHERE {{
  <{individual}> ?p ?value .
  ?p rdfs:subPropertyOf* <{property}> .
  FILTER(isLiteral(?value))
}}"
        );
        Ok(Self::terms(self.store()?, &query)?
            .into_iter()
            .filter_map(|term| match term {
                Term::Literal(literal) => Some(LiteralValue::from(literal)),
                _ => None,
            })
            .collect())
    }

    fn dispose(self: Box<Self>) -> Result<(), ReasonerError> {
        Ok(())
    }
}
