//! Folds the entailments reported by a reasoner session back into the ontology.
//!
//! The walk is fixed: subclass edges, class assertions, object property
//! values, data property values. Each step iterates the signature captured
//! before the walk in lexical order, so two runs over the same input add the
//! same axioms in the same order.
use serde::Serialize;

use super::sanitizer::Sanitizer;
use crate::{
    config::InferenceSettings,
    ontology::{
        entities::{Axiom, Ontology},
        service::{ReasonerError, SessionHandle},
        value_objects::Iri,
        vocabulary::owl,
    },
};

/// Number of axioms each step added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MaterializationReport {
    pub subclass_axioms: usize,
    pub class_assertions: usize,
    pub object_property_assertions: usize,
    pub data_property_assertions: usize,
}

impl MaterializationReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.subclass_axioms
            + self.class_assertions
            + self.object_property_assertions
            + self.data_property_assertions
    }
}

#[derive(Clone, Debug)]
pub struct Materializer {
    direct_subclasses: bool,
    direct_types: bool,
    sanitizer: Sanitizer,
    thing: Iri,
    nothing: Iri,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(&InferenceSettings::default())
    }
}

impl Materializer {
    #[must_use]
    pub fn new(settings: &InferenceSettings) -> Self {
        Self {
            direct_subclasses: settings.direct_subclasses,
            direct_types: settings.direct_types,
            sanitizer: Sanitizer::default(),
            thing: owl::THING.into(),
            nothing: owl::NOTHING.into(),
        }
    }

    /// Adds every reported entailment that is not already present.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the session.
    pub fn materialize(
        &self,
        ontology: &mut Ontology,
        session: &SessionHandle,
    ) -> Result<MaterializationReport, ReasonerError> {
        let signature = ontology.signature();
        let mut report = MaterializationReport::default();

        for class in &signature.classes {
            if *class == self.nothing {
                continue;
            }
            for sub in session.subclasses_of(class, self.direct_subclasses)? {
                if sub == self.nothing || *class == self.thing {
                    continue;
                }
                if ontology.add_axiom(Axiom::SubClassOf {
                    sub,
                    sup: class.clone(),
                }) {
                    report.subclass_axioms += 1;
                }
            }
        }

        for individual in &signature.individuals {
            for class in session.types_of(individual, self.direct_types)? {
                if class == self.thing {
                    continue;
                }
                if ontology.add_axiom(Axiom::ClassAssertion {
                    class,
                    individual: individual.clone(),
                }) {
                    report.class_assertions += 1;
                }
            }
        }

        for individual in &signature.individuals {
            for property in &signature.object_properties {
                if self.sanitizer.is_excluded(property) {
                    continue;
                }
                for object in session.object_property_values(individual, property)? {
                    if ontology.add_axiom(Axiom::ObjectPropertyAssertion {
                        property: property.clone(),
                        subject: individual.clone(),
                        object,
                    }) {
                        report.object_property_assertions += 1;
                    }
                }
            }
        }

        for individual in &signature.individuals {
            for property in &signature.data_properties {
                if self.sanitizer.is_excluded(property) {
                    continue;
                }
                for value in session.data_property_values(individual, property)? {
                    if ontology.add_axiom(Axiom::DataPropertyAssertion {
                        property: property.clone(),
                        subject: individual.clone(),
                        value,
                    }) {
                        report.data_property_assertions += 1;
                    }
                }
            }
        }

        tracing::debug!(
            subclass_axioms = report.subclass_axioms,
            class_assertions = report.class_assertions,
            object_property_assertions = report.object_property_assertions,
            data_property_assertions = report.data_property_assertions,
            "entailments materialized"
        );
        Ok(report)
    }
}
