//! Graph store client speaking the SPARQL 1.1 protocol over HTTP.
//!
//! Reads use a `CONSTRUCT` of every triple, optionally paged; writes use
//! `INSERT DATA` posted to the update surface of the repository.
use std::{collections::HashMap, fmt::Write as _, time::Duration};

use async_trait::async_trait;
use oxrdf::{BlankNodeRef, Graph, TermRef, TripleRef};
use reqwest::header::ACCEPT;

use crate::{
    config::SparqlStoreSettings,
    ontology::{
        exchange::{self, ExchangeFormat},
        repositories::GraphStore,
        service::{OntologyServiceError, StoreError},
        value_objects::Iri,
    },
};

#[derive(Clone, Debug)]
pub struct SparqlGraphStore {
    client: reqwest::Client,
    query_url: String,
    update_url: String,
    graph: Option<Iri>,
    page_size: Option<usize>,
    batch_size: usize,
    location: String,
}

impl SparqlGraphStore {
    /// Creates a client for the configured repository.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid graph name or when the HTTP client
    /// cannot be built.
    pub fn new(settings: &SparqlStoreSettings) -> Result<Self, OntologyServiceError> {
        let graph = settings
            .graph
            .as_deref()
            .map(Iri::new)
            .transpose()
            .map_err(|err| OntologyServiceError::configuration("store", err))?;
        if settings.page_size == Some(0) || settings.persist_batch_size == 0 {
            return Err(OntologyServiceError::configuration(
                "store",
                "page_size and persist_batch_size must be positive",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|err| OntologyServiceError::configuration("store", err))?;

        let query_url = settings.endpoint.trim_end_matches('/').to_string();
        let update_url = format!("{query_url}{}", settings.update_path);
        let location = graph.as_ref().map_or_else(
            || query_url.clone(),
            |graph| format!("{query_url}#{graph}"),
        );

        Ok(Self {
            client,
            query_url,
            update_url,
            graph,
            page_size: settings.page_size,
            batch_size: settings.persist_batch_size,
            location,
        })
    }

    fn construct_query(&self, page: Option<(usize, usize)>) -> String {
        let mut query = match &self.graph {
            Some(graph) => format!("CONSTRUCT {{ ?s ?p ?o }} WHERE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}"),
            None => "CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }".to_string(),
        };
        if let Some((limit, offset)) = page {
            let _ = write!(query, " ORDER BY ?s ?p ?o LIMIT {limit} OFFSET {offset}");
        }
        query
    }

    fn insert_data(&self, triples: &[TripleRef<'_>]) -> String {
        let mut data = String::new();
        for triple in triples {
            let _ = writeln!(data, "{triple} .");
        }
        match &self.graph {
            Some(graph) => format!("INSERT DATA {{ GRAPH <{graph}> {{\n{data}}} }}"),
            None => format!("INSERT DATA {{\n{data}}}"),
        }
    }

    async fn construct(&self, query: String) -> Result<Graph, StoreError> {
        let response = self
            .client
            .post(&self.query_url)
            .header(ACCEPT, ExchangeFormat::NTriples.media_type())
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(&err))?;
        if !status.is_success() {
            return Err(StoreError::protocol(
                &self.location,
                format!("query answered {status}: {}", String::from_utf8_lossy(&body)),
            ));
        }
        exchange::from_bytes(&body, ExchangeFormat::NTriples)
            .map_err(|err| StoreError::protocol(&self.location, err))
    }

    async fn update(&self, update: String) -> Result<(), StoreError> {
        let response = self
            .client
            .post(&self.update_url)
            .form(&[("update", update)])
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::protocol(
            &self.location,
            format!("update answered {status}: {body}"),
        ))
    }

    fn transport_error(&self, err: &reqwest::Error) -> StoreError {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            StoreError::connectivity(&self.location, err)
        } else {
            StoreError::protocol(&self.location, err)
        }
    }
}

fn blank_nodes(triple: TripleRef<'_>) -> Vec<BlankNodeRef<'_>> {
    [TermRef::from(triple.subject), triple.object]
        .into_iter()
        .filter_map(|term| match term {
            TermRef::BlankNode(node) => Some(node),
            _ => None,
        })
        .collect()
}

/// Splits `graph` into update batches of about `size` triples.
///
/// A blank node label only identifies one node within a single `INSERT DATA`
/// request, so triples connected through blank nodes always share a batch,
/// even when that batch grows past `size`.
fn batches(graph: &Graph, size: usize) -> Vec<Vec<TripleRef<'_>>> {
    let mut groups: Vec<Vec<TripleRef<'_>>> = Vec::new();
    let mut owners: HashMap<BlankNodeRef<'_>, usize> = HashMap::new();

    for triple in graph {
        let blanks = blank_nodes(triple);
        let mut target = None;
        for blank in &blanks {
            let Some(&group) = owners.get(blank) else {
                continue;
            };
            match target {
                None => target = Some(group),
                Some(kept) if kept != group => {
                    let merged = std::mem::take(&mut groups[group]);
                    groups[kept].extend(merged);
                    for owner in owners.values_mut() {
                        if *owner == group {
                            *owner = kept;
                        }
                    }
                }
                Some(_) => {}
            }
        }
        let target = target.unwrap_or_else(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[target].push(triple);
        for blank in blanks {
            owners.insert(blank, target);
        }
    }

    let mut batches = Vec::new();
    let mut current = Vec::new();
    for group in groups.into_iter().filter(|group| !group.is_empty()) {
        if !current.is_empty() && current.len() + group.len() > size {
            batches.push(std::mem::take(&mut current));
        }
        current.extend(group);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[async_trait]
impl GraphStore for SparqlGraphStore {
    type Error = StoreError;

    async fn fetch_all(&self) -> Result<Graph, Self::Error> {
        let Some(page_size) = self.page_size else {
            return self.construct(self.construct_query(None)).await;
        };

        let mut graph = Graph::new();
        let mut offset = 0;
        loop {
            let page = self
                .construct(self.construct_query(Some((page_size, offset))))
                .await?;
            let fetched = page.len();
            graph.extend(page.iter());
            tracing::debug!(location = %self.location, offset, fetched, "construct page fetched");
            if fetched < page_size {
                break;
            }
            offset += page_size;
        }
        Ok(graph)
    }

    async fn persist(&self, graph: &Graph) -> Result<(), Self::Error> {
        for (batch, chunk) in batches(graph, self.batch_size).iter().enumerate() {
            self.update(self.insert_data(chunk)).await?;
            tracing::debug!(location = %self.location, batch, triples = chunk.len(), "insert batch stored");
        }
        Ok(())
    }

    fn location(&self) -> &str {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::{BlankNode, Graph, Literal, NamedNode, Triple};

    use super::{batches, SparqlGraphStore};
    use crate::config::SparqlStoreSettings;

    fn settings(graph: Option<&str>, page_size: Option<usize>) -> SparqlStoreSettings {
        SparqlStoreSettings {
            endpoint: "http://localhost:7200/repositories/emoStory/".to_string(),
            update_path: "/statements".to_string(),
            graph: graph.map(ToString::to_string),
            timeout_ms: 1_000,
            page_size,
            persist_batch_size: 2,
        }
    }

    #[test]
    fn urls_follow_repository_layout() {
        let store = SparqlGraphStore::new(&settings(None, None)).expect("store");
        assert_eq!(store.query_url, "http://localhost:7200/repositories/emoStory");
        assert_eq!(
            store.update_url,
            "http://localhost:7200/repositories/emoStory/statements"
        );
    }

    #[test]
    fn construct_queries_are_scoped_and_paged() {
        let plain = SparqlGraphStore::new(&settings(None, None)).expect("store");
        insta::assert_snapshot!(plain.construct_query(None), @"CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }");

        let named = SparqlGraphStore::new(&settings(Some("http://example.org/g"), Some(100)))
            .expect("store");
        insta::assert_snapshot!(
            named.construct_query(Some((100, 200))),
            @"CONSTRUCT { ?s ?p ?o } WHERE { GRAPH <http://example.org/g> { ?s ?p ?o } } ORDER BY ?s ?p ?o LIMIT 100 OFFSET 200"
        );
    }

    #[test]
    fn insert_data_embeds_ntriples() {
        let store = SparqlGraphStore::new(&settings(Some("http://example.org/g"), None))
            .expect("store");
        let mut graph = Graph::new();
        graph.insert(&Triple::new(
            NamedNode::new_unchecked("http://example.org/alice"),
            NamedNode::new_unchecked("http://example.org/name"),
            Literal::new_simple_literal("Alice"),
        ));
        let triples = graph.iter().collect::<Vec<_>>();
        insta::assert_snapshot!(store.insert_data(&triples), @r#"
        INSERT DATA { GRAPH <http://example.org/g> {
        <http://example.org/alice> <http://example.org/name> "Alice" .
        } }
        "#);
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://www.purl.org/drammar#{local}"))
    }

    #[test]
    fn blank_node_triples_share_a_batch() {
        let restriction = BlankNode::new_unchecked("restriction");
        let list = BlankNode::new_unchecked("list");
        let mut graph = Graph::new();
        graph.insert(&Triple::new(ex("Hero"), ex("subClassOf"), restriction.clone()));
        graph.insert(&Triple::new(restriction.clone(), ex("onProperty"), ex("feels")));
        graph.insert(&Triple::new(restriction, ex("someValuesFrom"), list.clone()));
        graph.insert(&Triple::new(list, ex("first"), ex("Emotion")));
        for index in 0..3 {
            graph.insert(&Triple::new(ex(&format!("scene{index}")), ex("follows"), ex("prologue")));
        }

        let batches = batches(&graph, 2);

        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), graph.len());
        let holding_blank_nodes = batches
            .iter()
            .filter(|batch| batch.iter().any(|triple| !super::blank_nodes(*triple).is_empty()))
            .collect::<Vec<_>>();
        assert_eq!(holding_blank_nodes.len(), 1);
        assert_eq!(holding_blank_nodes[0].len(), 4);
        assert!(batches
            .iter()
            .filter(|batch| batch.iter().all(|triple| super::blank_nodes(*triple).is_empty()))
            .all(|batch| batch.len() <= 2));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SparqlGraphStore::new(&settings(Some("not an iri"), None)).is_err());
        assert!(SparqlGraphStore::new(&settings(None, Some(0))).is_err());
    }
}
