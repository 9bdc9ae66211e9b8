use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use oxrdf::{Graph, TripleRef};

use super::value_objects::{Iri, LiteralValue};

/// Named entity introduced by an explicit declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    /// `owl:Class`.
    Class(Iri),
    /// `owl:ObjectProperty`.
    ObjectProperty(Iri),
    /// `owl:DatatypeProperty`.
    DataProperty(Iri),
    /// `owl:NamedIndividual`.
    NamedIndividual(Iri),
}

impl Entity {
    /// Returns the IRI of the declared entity.
    #[must_use]
    pub fn iri(&self) -> &Iri {
        match self {
            Self::Class(iri)
            | Self::ObjectProperty(iri)
            | Self::DataProperty(iri)
            | Self::NamedIndividual(iri) => iri,
        }
    }
}

/// Typed statement over the ontology signature.
///
/// Only axioms over named entities are modelled; anything else read from a
/// graph (class expressions, annotations, ...) is carried verbatim by the
/// [`Ontology`] as residual triples.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axiom {
    Declaration(Entity),
    SubClassOf { sub: Iri, sup: Iri },
    EquivalentClasses(Iri, Iri),
    DisjointClasses(Iri, Iri),
    SubObjectPropertyOf { sub: Iri, sup: Iri },
    SubDataPropertyOf { sub: Iri, sup: Iri },
    InverseObjectProperties(Iri, Iri),
    ObjectPropertyDomain { property: Iri, domain: Iri },
    ObjectPropertyRange { property: Iri, range: Iri },
    DataPropertyDomain { property: Iri, domain: Iri },
    TransitiveObjectProperty(Iri),
    SymmetricObjectProperty(Iri),
    ClassAssertion { class: Iri, individual: Iri },
    ObjectPropertyAssertion {
        property: Iri,
        subject: Iri,
        object: Iri,
    },
    DataPropertyAssertion {
        property: Iri,
        subject: Iri,
        value: LiteralValue,
    },
}

impl Axiom {
    /// Returns `true` when the axiom mentions `iri` in any position.
    #[must_use]
    pub fn references(&self, iri: &Iri) -> bool {
        match self {
            Self::Declaration(entity) => entity.iri() == iri,
            Self::SubClassOf { sub, sup }
            | Self::SubObjectPropertyOf { sub, sup }
            | Self::SubDataPropertyOf { sub, sup } => sub == iri || sup == iri,
            Self::EquivalentClasses(a, b)
            | Self::DisjointClasses(a, b)
            | Self::InverseObjectProperties(a, b) => a == iri || b == iri,
            Self::ObjectPropertyDomain {
                property,
                domain: class,
            }
            | Self::ObjectPropertyRange {
                property,
                range: class,
            }
            | Self::DataPropertyDomain {
                property,
                domain: class,
            } => property == iri || class == iri,
            Self::TransitiveObjectProperty(property) | Self::SymmetricObjectProperty(property) => {
                property == iri
            }
            Self::ClassAssertion { class, individual } => class == iri || individual == iri,
            Self::ObjectPropertyAssertion {
                property,
                subject,
                object,
            } => property == iri || subject == iri || object == iri,
            Self::DataPropertyAssertion {
                property, subject, ..
            } => property == iri || subject == iri,
        }
    }
}

impl Display for Axiom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration(entity) => match entity {
                Entity::Class(iri) => write!(f, "Declaration(Class(<{iri}>))"),
                Entity::ObjectProperty(iri) => write!(f, "Declaration(ObjectProperty(<{iri}>))"),
                Entity::DataProperty(iri) => write!(f, "Declaration(DataProperty(<{iri}>))"),
                Entity::NamedIndividual(iri) => {
                    write!(f, "Declaration(NamedIndividual(<{iri}>))")
                }
            },
            Self::SubClassOf { sub, sup } => write!(f, "SubClassOf(<{sub}> <{sup}>)"),
            Self::EquivalentClasses(a, b) => write!(f, "EquivalentClasses(<{a}> <{b}>)"),
            Self::DisjointClasses(a, b) => write!(f, "DisjointClasses(<{a}> <{b}>)"),
            Self::SubObjectPropertyOf { sub, sup } => {
                write!(f, "SubObjectPropertyOf(<{sub}> <{sup}>)")
            }
            Self::SubDataPropertyOf { sub, sup } => write!(f, "SubDataPropertyOf(<{sub}> <{sup}>)"),
            Self::InverseObjectProperties(a, b) => {
                write!(f, "InverseObjectProperties(<{a}> <{b}>)")
            }
            Self::ObjectPropertyDomain { property, domain } => {
                write!(f, "ObjectPropertyDomain(<{property}> <{domain}>)")
            }
            Self::ObjectPropertyRange { property, range } => {
                write!(f, "ObjectPropertyRange(<{property}> <{range}>)")
            }
            Self::DataPropertyDomain { property, domain } => {
                write!(f, "DataPropertyDomain(<{property}> <{domain}>)")
            }
            Self::TransitiveObjectProperty(property) => {
                write!(f, "TransitiveObjectProperty(<{property}>)")
            }
            Self::SymmetricObjectProperty(property) => {
                write!(f, "SymmetricObjectProperty(<{property}>)")
            }
            Self::ClassAssertion { class, individual } => {
                write!(f, "ClassAssertion(<{class}> <{individual}>)")
            }
            Self::ObjectPropertyAssertion {
                property,
                subject,
                object,
            } => write!(
                f,
                "ObjectPropertyAssertion(<{property}> <{subject}> <{object}>)"
            ),
            Self::DataPropertyAssertion {
                property,
                subject,
                value,
            } => write!(f, "DataPropertyAssertion(<{property}> <{subject}> {value})"),
        }
    }
}

/// Entities referenced by an ontology, grouped by kind and lexically ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub classes: BTreeSet<Iri>,
    pub object_properties: BTreeSet<Iri>,
    pub data_properties: BTreeSet<Iri>,
    pub individuals: BTreeSet<Iri>,
}

impl Signature {
    fn record(&mut self, axiom: &Axiom) {
        match axiom {
            Axiom::Declaration(entity) => {
                let target = match entity {
                    Entity::Class(_) => &mut self.classes,
                    Entity::ObjectProperty(_) => &mut self.object_properties,
                    Entity::DataProperty(_) => &mut self.data_properties,
                    Entity::NamedIndividual(_) => &mut self.individuals,
                };
                target.insert(entity.iri().clone());
            }
            Axiom::SubClassOf { sub: a, sup: b }
            | Axiom::EquivalentClasses(a, b)
            | Axiom::DisjointClasses(a, b) => {
                self.classes.insert(a.clone());
                self.classes.insert(b.clone());
            }
            Axiom::SubObjectPropertyOf { sub: a, sup: b }
            | Axiom::InverseObjectProperties(a, b) => {
                self.object_properties.insert(a.clone());
                self.object_properties.insert(b.clone());
            }
            Axiom::SubDataPropertyOf { sub, sup } => {
                self.data_properties.insert(sub.clone());
                self.data_properties.insert(sup.clone());
            }
            Axiom::ObjectPropertyDomain {
                property,
                domain: class,
            }
            | Axiom::ObjectPropertyRange {
                property,
                range: class,
            } => {
                self.object_properties.insert(property.clone());
                self.classes.insert(class.clone());
            }
            Axiom::DataPropertyDomain { property, domain } => {
                self.data_properties.insert(property.clone());
                self.classes.insert(domain.clone());
            }
            Axiom::TransitiveObjectProperty(property) | Axiom::SymmetricObjectProperty(property) => {
                self.object_properties.insert(property.clone());
            }
            Axiom::ClassAssertion { class, individual } => {
                self.classes.insert(class.clone());
                self.individuals.insert(individual.clone());
            }
            Axiom::ObjectPropertyAssertion {
                property,
                subject,
                object,
            } => {
                self.object_properties.insert(property.clone());
                self.individuals.insert(subject.clone());
                self.individuals.insert(object.clone());
            }
            Axiom::DataPropertyAssertion {
                property, subject, ..
            } => {
                self.data_properties.insert(property.clone());
                self.individuals.insert(subject.clone());
            }
        }
    }
}

/// Working copy of a graph viewed as an ontology.
///
/// One instance exists per pipeline invocation. Axioms are kept in a set, so
/// adding an axiom that is already present is a no-op. Axioms added after the
/// ontology was read from a graph are tracked separately as additions.
#[derive(Clone, Debug, Default)]
pub struct Ontology {
    id: Option<Iri>,
    axioms: BTreeSet<Axiom>,
    added: BTreeSet<Axiom>,
    residual: Graph,
}

impl Ontology {
    /// Creates an empty ontology.
    #[must_use]
    pub fn new(id: Option<Iri>) -> Self {
        Self {
            id,
            axioms: BTreeSet::new(),
            added: BTreeSet::new(),
            residual: Graph::new(),
        }
    }

    pub(crate) fn from_parts(id: Option<Iri>, axioms: BTreeSet<Axiom>, residual: Graph) -> Self {
        Self {
            id,
            axioms,
            added: BTreeSet::new(),
            residual,
        }
    }

    /// Returns the ontology IRI when the graph declared one.
    #[must_use]
    pub fn id(&self) -> Option<&Iri> {
        self.id.as_ref()
    }

    /// Adds an axiom, returning `false` when it was already present.
    pub fn add_axiom(&mut self, axiom: Axiom) -> bool {
        if self.axioms.contains(&axiom) {
            return false;
        }
        self.added.insert(axiom.clone());
        self.axioms.insert(axiom)
    }

    /// Removes an axiom, returning `true` when it was present.
    pub fn remove_axiom(&mut self, axiom: &Axiom) -> bool {
        self.added.remove(axiom);
        self.axioms.remove(axiom)
    }

    /// Keeps only the axioms matching the predicate and returns how many were dropped.
    pub fn retain_axioms(&mut self, mut keep: impl FnMut(&Axiom) -> bool) -> usize {
        let before = self.axioms.len();
        self.axioms.retain(|axiom| keep(axiom));
        let axioms = &self.axioms;
        self.added.retain(|axiom| axioms.contains(axiom));
        before - self.axioms.len()
    }

    /// Keeps only the residual triples matching the predicate and returns how
    /// many were dropped.
    pub fn retain_residual(&mut self, mut keep: impl FnMut(TripleRef<'_>) -> bool) -> usize {
        let before = self.residual.len();
        self.residual = self
            .residual
            .iter()
            .filter(|triple| keep(*triple))
            .collect();
        before - self.residual.len()
    }

    /// Returns `true` when the axiom is part of the ontology.
    #[must_use]
    pub fn contains(&self, axiom: &Axiom) -> bool {
        self.axioms.contains(axiom)
    }

    /// Returns all axioms in deterministic order.
    #[must_use]
    pub fn axioms(&self) -> &BTreeSet<Axiom> {
        &self.axioms
    }

    /// Returns the axioms added since the ontology was built, in deterministic order.
    ///
    /// An ontology read with `from_graph` starts without additions.
    #[must_use]
    pub fn additions(&self) -> &BTreeSet<Axiom> {
        &self.added
    }

    /// Returns triples that are not represented by a typed axiom.
    #[must_use]
    pub fn residual(&self) -> &Graph {
        &self.residual
    }

    /// Computes the entities referenced by the current axioms.
    #[must_use]
    pub fn signature(&self) -> Signature {
        let mut signature = Signature::default();
        for axiom in &self.axioms {
            signature.record(axiom);
        }
        signature
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::Graph;

    use super::{Axiom, Entity, Ontology};
    use crate::ontology::value_objects::{Iri, LiteralValue};

    fn iri(text: &str) -> Iri {
        Iri::new(text).expect("valid iri")
    }

    #[test]
    fn axioms_are_unique() {
        let mut ontology = Ontology::new(None);
        let axiom = Axiom::SubClassOf {
            sub: iri("https://example.org/Hero"),
            sup: iri("https://example.org/Agent"),
        };
        assert!(ontology.add_axiom(axiom.clone()));
        assert!(!ontology.add_axiom(axiom.clone()));
        assert_eq!(ontology.axioms().len(), 1);
        assert!(ontology.remove_axiom(&axiom));
        assert!(ontology.axioms().is_empty());
    }

    #[test]
    fn signature_collects_referenced_entities() {
        let mut ontology = Ontology::new(None);
        ontology.add_axiom(Axiom::Declaration(Entity::Class(iri(
            "https://example.org/Agent",
        ))));
        ontology.add_axiom(Axiom::ClassAssertion {
            class: iri("https://example.org/Hero"),
            individual: iri("https://example.org/alice"),
        });
        ontology.add_axiom(Axiom::ObjectPropertyAssertion {
            property: iri("https://example.org/feels"),
            subject: iri("https://example.org/alice"),
            object: iri("https://example.org/joy"),
        });
        ontology.add_axiom(Axiom::DataPropertyAssertion {
            property: iri("https://example.org/age"),
            subject: iri("https://example.org/bob"),
            value: LiteralValue::simple("42"),
        });

        let signature = ontology.signature();
        assert_eq!(
            signature.classes.into_iter().collect::<Vec<_>>(),
            vec![iri("https://example.org/Agent"), iri("https://example.org/Hero")]
        );
        assert_eq!(
            signature.individuals.into_iter().collect::<Vec<_>>(),
            vec![
                iri("https://example.org/alice"),
                iri("https://example.org/bob"),
                iri("https://example.org/joy"),
            ]
        );
        assert!(signature
            .object_properties
            .contains(&iri("https://example.org/feels")));
        assert!(signature
            .data_properties
            .contains(&iri("https://example.org/age")));
    }

    #[test]
    fn retain_reports_dropped_axioms() {
        let mut ontology = Ontology::new(None);
        let hero = iri("https://example.org/Hero");
        ontology.add_axiom(Axiom::SubClassOf {
            sub: hero.clone(),
            sup: iri("https://example.org/Agent"),
        });
        ontology.add_axiom(Axiom::Declaration(Entity::Class(iri(
            "https://example.org/Villain",
        ))));
        let dropped = ontology.retain_axioms(|axiom| !axiom.references(&hero));
        assert_eq!(dropped, 1);
        assert_eq!(ontology.axioms().len(), 1);
        assert_eq!(ontology.additions(), ontology.axioms());
    }

    #[test]
    fn additions_exclude_axioms_read_from_the_graph() {
        let told = Axiom::SubClassOf {
            sub: iri("https://example.org/Hero"),
            sup: iri("https://example.org/Agent"),
        };
        let inferred = Axiom::ClassAssertion {
            class: iri("https://example.org/Agent"),
            individual: iri("https://example.org/alice"),
        };
        let mut ontology =
            Ontology::from_parts(None, [told.clone()].into_iter().collect(), Graph::new());

        assert!(!ontology.add_axiom(told));
        assert!(ontology.add_axiom(inferred.clone()));
        assert_eq!(ontology.additions().iter().collect::<Vec<_>>(), vec![&inferred]);

        ontology.remove_axiom(&inferred);
        assert!(ontology.additions().is_empty());
    }
}
