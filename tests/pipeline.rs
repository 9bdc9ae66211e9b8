use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use inference_endpoint::{
    config::{
        InferenceSettings, PipelineSettings, ScratchSettings, SparqlStoreSettings,
        DEFAULT_SERVE_QUERY,
    },
    ontology::{
        exchange::{self, ExchangeFormat},
        infrastructure::{
            in_memory::InMemoryGraphStore, sparql_http::SparqlGraphStore,
            structural_reasoner::StructuralReasoner,
        },
        GraphStoreHandle, Iri, LiteralValue, Ontology, OntologyService, Reasoner, ReasonerError,
        ReasonerHandle, ReasonerSession, SessionHandle,
    },
    pipeline::{
        ErrorKind, PersistPublisher, Pipeline, PipelineState, Publication, PublishError,
        Publisher, Row, ServePublisher, Stage,
    },
};
use oxrdf::{dataset::CanonicalizationAlgorithm, Graph, TermRef};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

const STORY: &str = r"
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix : <http://www.purl.org/drammar#> .

:Agent a owl:Class .
:Character a owl:Class ; rdfs:subClassOf :Agent .
:Hero a owl:Class ; rdfs:subClassOf :Character .
:Emotion a owl:Class .

:feels a owl:ObjectProperty .
:experiences a owl:ObjectProperty ; rdfs:subPropertyOf :feels .

:Hero rdfs:subClassOf [
    a owl:Restriction ;
    owl:onProperty :feels ;
    owl:someValuesFrom :Emotion
] .

:alice a :Hero ; :experiences <joy:Emotion> .
";

const CONTRADICTION: &str = r"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix : <http://www.purl.org/drammar#> .

:Hero a owl:Class ; owl:disjointWith :Villain .
:Villain a owl:Class .
:carol a :Hero , :Villain .
";

fn graph(turtle: &str) -> Graph {
    exchange::from_bytes(turtle.as_bytes(), ExchangeFormat::Turtle).expect("turtle fixture")
}

fn service(store: Arc<GraphStoreHandle>) -> OntologyService {
    OntologyService::new(store, Arc::new(StructuralReasoner))
}

fn canonical(mut graph: Graph) -> Graph {
    graph.canonicalize(CanonicalizationAlgorithm::Unstable);
    graph
}

fn blank_subjects(graph: &Graph) -> BTreeSet<String> {
    graph
        .iter()
        .filter_map(|triple| match TermRef::from(triple.subject) {
            TermRef::BlankNode(node) => Some(node.as_str().to_string()),
            _ => None,
        })
        .collect()
}

fn pipeline(service: OntologyService, settings: PipelineSettings) -> Pipeline {
    Pipeline::new(service, &InferenceSettings::default(), settings)
}

fn row(i: &str, emo: &str) -> Row {
    Row::from([
        ("i".to_string(), i.to_string()),
        ("emo".to_string(), emo.to_string()),
    ])
}

/// Records whether the pipeline reached the publication step and what it
/// was handed.
#[derive(Default)]
struct SpyPublisher {
    calls: AtomicUsize,
    published: std::sync::Mutex<Option<Graph>>,
}

#[async_trait]
impl Publisher for SpyPublisher {
    fn name(&self) -> &'static str {
        "spy"
    }

    async fn publish(&self, ontology: &Ontology) -> Result<Publication, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.published.lock().unwrap() = Some(ontology.to_graph());
        Ok(Publication::Rows { rows: Vec::new() })
    }
}

#[tokio::test]
async fn serve_answers_inherited_emotions() {
    let store = Arc::new(InMemoryGraphStore::new(graph(STORY)));
    let pipeline = pipeline(service(store), PipelineSettings::default());
    let publisher = ServePublisher::new(DEFAULT_SERVE_QUERY).expect("serve query");

    let report = pipeline
        .run(&publisher, CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(
        report.publication,
        Publication::Rows {
            rows: vec![row("alice", "joy:Emotion")]
        }
    );
    assert_eq!(
        report.states,
        vec![
            PipelineState::Idle,
            PipelineState::Exported,
            PipelineState::Loaded,
            PipelineState::Sanitized,
            PipelineState::Reasoned,
            PipelineState::Materialized,
            PipelineState::Published,
            PipelineState::Done,
        ]
    );
    assert!(report.materialization.class_assertions > 0);
    assert!(report.materialization.object_property_assertions > 0);
}

#[tokio::test]
async fn inconsistent_store_is_never_published() {
    let store = Arc::new(InMemoryGraphStore::new(graph(CONTRADICTION)));
    let before = store.snapshot().len();
    let pipeline = pipeline(service(store.clone()), PipelineSettings::default());
    let spy = SpyPublisher::default();

    let err = pipeline
        .run(&spy, CancellationToken::new())
        .await
        .expect_err("inconsistent");

    assert_eq!(err.kind(), ErrorKind::InconsistentOntology);
    assert_eq!(err.stage(), Stage::Reason);
    assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.snapshot().len(), before);
}

#[tokio::test]
async fn unreachable_store_fails_at_export() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let store = SparqlGraphStore::new(&SparqlStoreSettings {
        endpoint: format!("http://127.0.0.1:{port}/repositories/emoStory"),
        update_path: "/statements".to_string(),
        graph: None,
        timeout_ms: 2_000,
        page_size: None,
        persist_batch_size: 100,
    })
    .expect("store");
    let pipeline = pipeline(service(Arc::new(store)), PipelineSettings::default());
    let spy = SpyPublisher::default();

    let err = pipeline
        .run(&spy, CancellationToken::new())
        .await
        .expect_err("connectivity");

    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert_eq!(err.stage(), Stage::Export);
    assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persist_is_additive_and_idempotent() {
    let seed = graph(STORY);
    let store = Arc::new(InMemoryGraphStore::new(seed.clone()));
    let pipeline = pipeline(service(store.clone()), PipelineSettings::default());
    let publisher = PersistPublisher::new(store.clone());

    let report = pipeline
        .run(&publisher, CancellationToken::new())
        .await
        .expect("first run");
    let first = store.snapshot();
    for triple in &seed {
        assert!(first.contains(triple), "lost asserted triple {triple}");
    }
    assert!(first.len() > seed.len());
    assert_eq!(blank_subjects(&first), blank_subjects(&seed));
    assert!(matches!(
        report.publication,
        Publication::Persisted { triples, .. } if triples == first.len() - seed.len()
    ));

    let report = pipeline
        .run(&publisher, CancellationToken::new())
        .await
        .expect("second run");
    assert!(matches!(
        report.publication,
        Publication::Persisted { triples: 0, .. }
    ));
    assert_eq!(canonical(store.snapshot()), canonical(first));
}

const TOP_PROPERTIES: &str = r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix : <http://www.purl.org/drammar#> .

:name a owl:DatatypeProperty ; rdfs:subPropertyOf owl:topDataProperty .
_:anon owl:topDataProperty "vacuous" .
:alice owl:topObjectProperty _:someone .
"#;

#[tokio::test]
async fn top_property_statements_never_reach_the_publisher() {
    let mut seed = graph(STORY);
    seed.extend(graph(TOP_PROPERTIES).iter());
    let store = Arc::new(InMemoryGraphStore::new(seed));
    let pipeline = pipeline(service(store), PipelineSettings::default());
    let spy = SpyPublisher::default();

    let report = pipeline
        .run(&spy, CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(report.sanitize.removed, 3);
    let published = spy.published.lock().unwrap().clone().expect("published");
    let tops = [
        "http://www.w3.org/2002/07/owl#topDataProperty",
        "http://www.w3.org/2002/07/owl#topObjectProperty",
    ];
    let leaked = published
        .iter()
        .filter(|triple| {
            tops.contains(&triple.predicate.as_str())
                || matches!(triple.object, TermRef::NamedNode(node) if tops.contains(&node.as_str()))
        })
        .map(|triple| triple.to_string())
        .collect::<Vec<_>>();
    assert!(leaked.is_empty(), "leaked {leaked:?}");
}

#[tokio::test]
async fn cancelled_invocation_stops_before_publishing() {
    let store = Arc::new(InMemoryGraphStore::new(graph(STORY)));
    let before = store.snapshot();
    let pipeline = pipeline(service(store.clone()), PipelineSettings::default());
    let publisher = PersistPublisher::new(store.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = pipeline.run(&publisher, cancel).await.expect_err("cancelled");

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(store.snapshot(), before);
}

/// Engine that never finishes on its own.
struct StallingReasoner {
    disposed: Arc<AtomicBool>,
}

struct StallingSession {
    disposed: Arc<AtomicBool>,
}

impl Reasoner for StallingReasoner {
    type Error = ReasonerError;

    fn name(&self) -> &str {
        "stalling"
    }

    fn load(&self, _ontology: &Ontology) -> Result<Box<SessionHandle>, ReasonerError> {
        Ok(Box::new(StallingSession {
            disposed: self.disposed.clone(),
        }))
    }
}

impl ReasonerSession for StallingSession {
    type Error = ReasonerError;

    fn precompute(&mut self, cancel: &CancellationToken) -> Result<(), ReasonerError> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Err(ReasonerError::Cancelled)
    }

    fn subclasses_of(&self, _class: &Iri, _direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        Ok(BTreeSet::new())
    }

    fn types_of(&self, _individual: &Iri, _direct: bool) -> Result<BTreeSet<Iri>, ReasonerError> {
        Ok(BTreeSet::new())
    }

    fn object_property_values(
        &self,
        _individual: &Iri,
        _property: &Iri,
    ) -> Result<BTreeSet<Iri>, ReasonerError> {
        Ok(BTreeSet::new())
    }

    fn data_property_values(
        &self,
        _individual: &Iri,
        _property: &Iri,
    ) -> Result<BTreeSet<LiteralValue>, ReasonerError> {
        Ok(BTreeSet::new())
    }

    fn dispose(self: Box<Self>) -> Result<(), ReasonerError> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn reasoning_timeout_cancels_and_disposes_the_session() {
    let disposed = Arc::new(AtomicBool::new(false));
    let reasoner: Arc<ReasonerHandle> = Arc::new(StallingReasoner {
        disposed: disposed.clone(),
    });
    let store: Arc<GraphStoreHandle> = Arc::new(InMemoryGraphStore::new(graph(STORY)));
    let pipeline = pipeline(
        OntologyService::new(store, reasoner),
        PipelineSettings {
            reasoning_timeout_ms: Some(20),
            ..PipelineSettings::default()
        },
    );
    let spy = SpyPublisher::default();

    let err = pipeline
        .run(&spy, CancellationToken::new())
        .await
        .expect_err("timeout");

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.stage(), Stage::Reason);
    assert!(disposed.load(Ordering::SeqCst));
    assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test]
async fn directory_scratch_follows_keep_flag(#[case] keep: bool) {
    let root = std::env::temp_dir().join(format!("inference-scratch-{}", uuid::Uuid::new_v4()));
    let store = Arc::new(InMemoryGraphStore::new(graph(STORY)));
    let pipeline = pipeline(
        service(store),
        PipelineSettings {
            scratch: ScratchSettings::Directory { root: root.clone() },
            keep_scratch: keep,
            ..PipelineSettings::default()
        },
    );

    let report = pipeline
        .run(&SpyPublisher::default(), CancellationToken::new())
        .await
        .expect("run");

    let arena = root.join(report.invocation.to_string());
    assert_eq!(arena.exists(), keep);
    if keep {
        assert!(arena.join("exported.rdf").exists());
        assert!(arena.join("inferred.rdf").exists());
    }
    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn export_returns_rdf_xml_of_the_store() {
    let seed = graph(STORY);
    let store = Arc::new(InMemoryGraphStore::new(seed.clone()));
    let pipeline = pipeline(service(store), PipelineSettings::default());

    let exported = pipeline.export().await.expect("export");

    assert_eq!(exported.media_type, "application/rdf+xml");
    assert_eq!(exported.filename, "exported.rdf");
    let reloaded =
        exchange::from_bytes(&exported.bytes, ExchangeFormat::RdfXml).expect("rdf/xml");
    assert_eq!(canonical(reloaded), canonical(seed));
}
