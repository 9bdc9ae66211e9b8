//! Translation between RDF graphs and the typed [`Ontology`] working copy.
//!
//! The mapping follows the OWL 2 RDF mapping for the axiom kinds the pipeline
//! reasons about. A triple is turned into an [`Axiom`] only when every
//! position is a named entity of the expected kind; every other triple is kept
//! as residual content, so `Ontology::from_graph(g).to_graph() == g` holds for
//! any graph.

use std::collections::BTreeSet;

use oxrdf::{Graph, NamedNode, Term, TermRef, Triple};

use super::entities::{Axiom, Entity, Ontology};
use super::value_objects::{Iri, LiteralValue};
use super::vocabulary::{is_reserved, owl, rdf, rdfs};

#[derive(Default)]
struct PropertyKinds {
    object: BTreeSet<Iri>,
    data: BTreeSet<Iri>,
}

impl PropertyKinds {
    fn scan(graph: &Graph) -> Self {
        let mut kinds = Self::default();
        kinds.object.insert(owl::TOP_OBJECT_PROPERTY.into());
        kinds.data.insert(owl::TOP_DATA_PROPERTY.into());

        for triple in graph.iter() {
            let TermRef::NamedNode(subject) = TermRef::from(triple.subject) else {
                continue;
            };
            if triple.predicate == rdf::TYPE {
                match triple.object {
                    TermRef::NamedNode(kind)
                        if kind == owl::OBJECT_PROPERTY
                            || kind == owl::TRANSITIVE_PROPERTY
                            || kind == owl::SYMMETRIC_PROPERTY =>
                    {
                        kinds.object.insert(subject.into());
                    }
                    TermRef::NamedNode(kind) if kind == owl::DATATYPE_PROPERTY => {
                        kinds.data.insert(subject.into());
                    }
                    _ => {}
                }
            } else if triple.predicate == owl::INVERSE_OF {
                kinds.object.insert(subject.into());
                if let TermRef::NamedNode(object) = triple.object {
                    kinds.object.insert(object.into());
                }
            }
        }
        kinds
    }

    fn is_object(&self, iri: &Iri) -> bool {
        self.object.contains(iri)
    }

    fn is_data(&self, iri: &Iri) -> bool {
        self.data.contains(iri)
    }
}

fn named_subject(term: Term) -> Option<Iri> {
    match term {
        Term::NamedNode(node) => Some(node.into()),
        _ => None,
    }
}

fn named_object(term: &Term) -> Option<Iri> {
    match term {
        Term::NamedNode(node) => Some(node.clone().into()),
        _ => None,
    }
}

fn map_triple(triple: &Triple, kinds: &PropertyKinds) -> Option<Axiom> {
    let subject = named_subject(triple.subject.clone().into())?;
    let predicate = triple.predicate.as_ref();

    if let Term::Literal(literal) = &triple.object {
        let property = Iri::from(triple.predicate.clone());
        return kinds
            .is_data(&property)
            .then(|| Axiom::DataPropertyAssertion {
                property,
                subject,
                value: LiteralValue::from(literal.clone()),
            });
    }
    let object = named_object(&triple.object)?;

    if predicate == rdf::TYPE {
        let declared = match object.as_named_node() {
            kind if kind == owl::CLASS => Some(Entity::Class(subject.clone())),
            kind if kind == owl::OBJECT_PROPERTY => Some(Entity::ObjectProperty(subject.clone())),
            kind if kind == owl::DATATYPE_PROPERTY => Some(Entity::DataProperty(subject.clone())),
            kind if kind == owl::NAMED_INDIVIDUAL => {
                Some(Entity::NamedIndividual(subject.clone()))
            }
            _ => None,
        };
        if let Some(entity) = declared {
            return Some(Axiom::Declaration(entity));
        }
        if object.as_named_node() == owl::TRANSITIVE_PROPERTY {
            return Some(Axiom::TransitiveObjectProperty(subject));
        }
        if object.as_named_node() == owl::SYMMETRIC_PROPERTY {
            return Some(Axiom::SymmetricObjectProperty(subject));
        }
        if is_reserved(object.as_str()) || is_reserved(subject.as_str()) {
            return None;
        }
        return Some(Axiom::ClassAssertion {
            class: object,
            individual: subject,
        });
    }

    if predicate == rdfs::SUB_CLASS_OF {
        return Some(Axiom::SubClassOf {
            sub: subject,
            sup: object,
        });
    }
    if predicate == owl::EQUIVALENT_CLASS {
        return Some(Axiom::EquivalentClasses(subject, object));
    }
    if predicate == owl::DISJOINT_WITH {
        return Some(Axiom::DisjointClasses(subject, object));
    }
    if predicate == owl::INVERSE_OF {
        return Some(Axiom::InverseObjectProperties(subject, object));
    }
    if predicate == rdfs::SUB_PROPERTY_OF {
        if kinds.is_data(&subject) || kinds.is_data(&object) {
            return Some(Axiom::SubDataPropertyOf {
                sub: subject,
                sup: object,
            });
        }
        if kinds.is_object(&subject) || kinds.is_object(&object) {
            return Some(Axiom::SubObjectPropertyOf {
                sub: subject,
                sup: object,
            });
        }
        return None;
    }
    if predicate == rdfs::DOMAIN {
        if kinds.is_object(&subject) {
            return Some(Axiom::ObjectPropertyDomain {
                property: subject,
                domain: object,
            });
        }
        if kinds.is_data(&subject) {
            return Some(Axiom::DataPropertyDomain {
                property: subject,
                domain: object,
            });
        }
        return None;
    }
    if predicate == rdfs::RANGE {
        return kinds
            .is_object(&subject)
            .then(|| Axiom::ObjectPropertyRange {
                property: subject,
                range: object,
            });
    }

    let property = Iri::from(triple.predicate.clone());
    kinds
        .is_object(&property)
        .then(|| Axiom::ObjectPropertyAssertion {
            property,
            subject,
            object,
        })
}

impl Ontology {
    /// Builds the working copy of a graph.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let kinds = PropertyKinds::scan(graph);
        let mut axioms = BTreeSet::new();
        let mut residual = Graph::new();
        let mut id = None;

        for triple in graph.iter() {
            let triple = triple.into_owned();
            if triple.predicate == rdf::TYPE && triple.object == Term::NamedNode(owl::ONTOLOGY.into_owned()) {
                id = named_subject(triple.subject.clone().into());
            }
            match map_triple(&triple, &kinds) {
                Some(axiom) => {
                    axioms.insert(axiom);
                }
                None => {
                    residual.insert(&triple);
                }
            }
        }

        Self::from_parts(id, axioms, residual)
    }

    /// Renders the ontology, inferred axioms included, back to a graph.
    #[must_use]
    pub fn to_graph(&self) -> Graph {
        let mut graph = self.residual().clone();
        for axiom in self.axioms() {
            graph.insert(&axiom_triple(axiom));
        }
        graph
    }

    /// Serializes only the axioms added since the ontology was built.
    ///
    /// The result never contains blank nodes: additions are typed axioms over
    /// named entities.
    #[must_use]
    pub fn additions_graph(&self) -> Graph {
        self.additions().iter().map(axiom_triple).collect()
    }
}

fn node(iri: &Iri) -> NamedNode {
    NamedNode::from(iri)
}

fn axiom_triple(axiom: &Axiom) -> Triple {
    match axiom {
        Axiom::Declaration(entity) => {
            let kind = match entity {
                Entity::Class(_) => owl::CLASS,
                Entity::ObjectProperty(_) => owl::OBJECT_PROPERTY,
                Entity::DataProperty(_) => owl::DATATYPE_PROPERTY,
                Entity::NamedIndividual(_) => owl::NAMED_INDIVIDUAL,
            };
            Triple::new(node(entity.iri()), rdf::TYPE, kind)
        }
        Axiom::SubClassOf { sub, sup } => Triple::new(node(sub), rdfs::SUB_CLASS_OF, node(sup)),
        Axiom::EquivalentClasses(a, b) => Triple::new(node(a), owl::EQUIVALENT_CLASS, node(b)),
        Axiom::DisjointClasses(a, b) => Triple::new(node(a), owl::DISJOINT_WITH, node(b)),
        Axiom::SubObjectPropertyOf { sub, sup } | Axiom::SubDataPropertyOf { sub, sup } => {
            Triple::new(node(sub), rdfs::SUB_PROPERTY_OF, node(sup))
        }
        Axiom::InverseObjectProperties(a, b) => Triple::new(node(a), owl::INVERSE_OF, node(b)),
        Axiom::ObjectPropertyDomain { property, domain }
        | Axiom::DataPropertyDomain { property, domain } => {
            Triple::new(node(property), rdfs::DOMAIN, node(domain))
        }
        Axiom::ObjectPropertyRange { property, range } => {
            Triple::new(node(property), rdfs::RANGE, node(range))
        }
        Axiom::TransitiveObjectProperty(property) => {
            Triple::new(node(property), rdf::TYPE, owl::TRANSITIVE_PROPERTY)
        }
        Axiom::SymmetricObjectProperty(property) => {
            Triple::new(node(property), rdf::TYPE, owl::SYMMETRIC_PROPERTY)
        }
        Axiom::ClassAssertion { class, individual } => {
            Triple::new(node(individual), rdf::TYPE, node(class))
        }
        Axiom::ObjectPropertyAssertion {
            property,
            subject,
            object,
        } => Triple::new(node(subject), node(property), node(object)),
        Axiom::DataPropertyAssertion {
            property,
            subject,
            value,
        } => Triple::new(node(subject), node(property), value.to_literal()),
    }
}
