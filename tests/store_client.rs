use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use inference_endpoint::{
    config::{InferenceSettings, PipelineSettings, SparqlStoreSettings},
    ontology::{
        exchange::{self, ExchangeFormat},
        infrastructure::{sparql_http::SparqlGraphStore, structural_reasoner::StructuralReasoner},
        GraphStore, OntologyService, StoreError,
    },
    pipeline::{PersistPublisher, Pipeline, Publication},
};
use oxigraph::{
    model::GraphNameRef,
    sparql::{QueryResults, SparqlEvaluator},
    store::Store,
};
use oxrdf::{dataset::CanonicalizationAlgorithm, Graph, NamedNode, TermRef, Triple};
use rstest::rstest;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Repository answering the SPARQL protocol from an in-memory oxigraph store.
#[derive(Clone)]
struct MockRepository {
    store: Store,
    queries: Arc<Mutex<Vec<String>>>,
    updates: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl MockRepository {
    fn new(graph: &Graph) -> Self {
        let store = Store::new().unwrap();
        store
            .extend(graph.iter().map(|triple| triple.in_graph(GraphNameRef::DefaultGraph)))
            .unwrap();
        Self {
            store,
            queries: Arc::default(),
            updates: Arc::default(),
            failing: false,
        }
    }

    fn content(&self) -> Graph {
        let mut graph = Graph::new();
        for quad in self.store.iter() {
            let quad = quad.unwrap();
            graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
        }
        graph
    }
}

fn failure(status: StatusCode, err: impl ToString) -> Response {
    (status, err.to_string()).into_response()
}

async fn query(
    State(repo): State<MockRepository>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if repo.failing {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "repository offline");
    }
    let query = params.get("query").cloned().unwrap_or_default();
    repo.queries.lock().unwrap().push(query.clone());

    let prepared = match SparqlEvaluator::new().parse_query(&query) {
        Ok(prepared) => prepared,
        Err(err) => return failure(StatusCode::BAD_REQUEST, err),
    };
    let Ok(QueryResults::Graph(triples)) = prepared.on_store(&repo.store).execute() else {
        return failure(StatusCode::BAD_REQUEST, "only construct queries are served");
    };
    let graph = triples.collect::<Result<Graph, _>>().unwrap();
    let body = exchange::to_bytes(&graph, ExchangeFormat::NTriples).unwrap();
    ([("content-type", "application/n-triples")], body).into_response()
}

async fn statements(
    State(repo): State<MockRepository>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    let update = params.get("update").cloned().unwrap_or_default();
    repo.updates.lock().unwrap().push(update.clone());
    let executed = SparqlEvaluator::new()
        .parse_update(&update)
        .map_err(|err| err.to_string())
        .and_then(|prepared| {
            prepared
                .on_store(&repo.store)
                .execute()
                .map_err(|err| err.to_string())
        });
    match executed {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(StatusCode::BAD_REQUEST, err),
    }
}

async fn serve(repo: MockRepository) -> String {
    let router = Router::new()
        .route("/repositories/emoStory", post(query))
        .route("/repositories/emoStory/statements", post(statements))
        .with_state(repo);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}/repositories/emoStory")
}

fn settings(endpoint: String, page_size: Option<usize>) -> SparqlStoreSettings {
    SparqlStoreSettings {
        endpoint,
        update_path: "/statements".to_string(),
        graph: None,
        timeout_ms: 5_000,
        page_size,
        persist_batch_size: 2,
    }
}

fn triples(count: usize) -> Graph {
    let mut graph = Graph::new();
    for index in 0..count {
        graph.insert(&Triple::new(
            NamedNode::new_unchecked(format!("http://www.purl.org/drammar#scene{index}")),
            NamedNode::new_unchecked("http://www.purl.org/drammar#follows"),
            NamedNode::new_unchecked("http://www.purl.org/drammar#prologue"),
        ));
    }
    graph
}

fn canonical(mut graph: Graph) -> Graph {
    graph.canonicalize(CanonicalizationAlgorithm::Unstable);
    graph
}

fn blank_nodes(graph: &Graph) -> BTreeSet<String> {
    graph
        .iter()
        .flat_map(|triple| [TermRef::from(triple.subject), triple.object])
        .filter_map(|term| match term {
            TermRef::BlankNode(node) => Some(node.as_str().to_string()),
            _ => None,
        })
        .collect()
}

#[rstest]
#[case::unpaged(5, None, 1)]
#[case::partial_last_page(5, Some(2), 3)]
#[case::exact_pages(4, Some(2), 3)]
#[tokio::test]
async fn fetch_collects_every_page(
    #[case] size: usize,
    #[case] page_size: Option<usize>,
    #[case] requests: usize,
) {
    let graph = triples(size);
    let repo = MockRepository::new(&graph);
    let endpoint = serve(repo.clone()).await;
    let store = SparqlGraphStore::new(&settings(endpoint, page_size)).unwrap();

    let fetched = store.fetch_all().await.unwrap();

    assert_eq!(fetched, graph);
    assert_eq!(repo.queries.lock().unwrap().len(), requests);
}

#[tokio::test]
async fn persist_posts_insert_data_batches() {
    let repo = MockRepository::new(&Graph::new());
    let endpoint = serve(repo.clone()).await;
    let store = SparqlGraphStore::new(&settings(endpoint, None)).unwrap();

    store.persist(&triples(3)).await.unwrap();

    let updates = repo.updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|update| update.starts_with("INSERT DATA")));
    let inserted = updates
        .iter()
        .map(|update| update.matches("drammar#follows").count())
        .sum::<usize>();
    assert_eq!(inserted, 3);
    drop(updates);
    assert_eq!(repo.content(), triples(3));
}

#[tokio::test]
async fn error_status_is_a_protocol_failure() {
    let repo = MockRepository {
        failing: true,
        ..MockRepository::new(&Graph::new())
    };
    let endpoint = serve(repo).await;
    let store = SparqlGraphStore::new(&settings(endpoint, None)).unwrap();

    let err = store.fetch_all().await.unwrap_err();

    assert!(matches!(err, StoreError::Protocol { .. }));
    assert!(err.to_string().contains("repository offline"));
}

const RESTRICTED: &str = r"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix : <http://www.purl.org/drammar#> .

:Agent a owl:Class .
:Hero a owl:Class ; rdfs:subClassOf :Agent .
:feels a owl:ObjectProperty .
:Hero rdfs:subClassOf [
    a owl:Restriction ;
    owl:onProperty :feels ;
    owl:someValuesFrom :Agent
] .
:alice a :Hero .
";

#[tokio::test]
async fn blank_node_survives_a_single_persist() {
    let graph = exchange::from_bytes(RESTRICTED.as_bytes(), ExchangeFormat::Turtle).unwrap();
    let repo = MockRepository::new(&Graph::new());
    let endpoint = serve(repo.clone()).await;
    let store = SparqlGraphStore::new(&settings(endpoint, None)).unwrap();

    store.persist(&graph).await.unwrap();

    let stored = repo.content();
    assert_eq!(blank_nodes(&stored).len(), 1);
    assert_eq!(canonical(stored), canonical(graph));
}

#[tokio::test]
async fn repeated_pipeline_persist_is_idempotent() {
    let seed = exchange::from_bytes(RESTRICTED.as_bytes(), ExchangeFormat::Turtle).unwrap();
    let repo = MockRepository::new(&seed);
    let endpoint = serve(repo.clone()).await;
    let store = Arc::new(SparqlGraphStore::new(&settings(endpoint, None)).unwrap());
    let pipeline = Pipeline::new(
        OntologyService::new(store.clone(), Arc::new(StructuralReasoner)),
        &InferenceSettings::default(),
        PipelineSettings::default(),
    );
    let publisher = PersistPublisher::new(store);

    let report = pipeline
        .run(&publisher, CancellationToken::new())
        .await
        .unwrap();
    let first = repo.content();
    assert_eq!(blank_nodes(&first).len(), 1);
    assert!(first.len() > seed.len());
    assert!(matches!(
        report.publication,
        Publication::Persisted { triples, .. } if triples == first.len() - seed.len()
    ));

    let report = pipeline
        .run(&publisher, CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(
        report.publication,
        Publication::Persisted { triples: 0, .. }
    ));
    assert_eq!(canonical(repo.content()), canonical(first));
}
