//! Query processor: runs one bound query per call and shapes the records
//! into JSON-ready results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProcgraphError, Result};
use crate::graph::{node_to_json, rel_to_json, JsonObject, OutputMode, AMOUNT, SPAREPART};
use crate::store::{GraphQuery, GraphStore, Record};

/// `{"nodes": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeList {
    pub nodes: Vec<JsonObject>,
}

/// `{"stuff": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StuffList {
    pub stuff: Vec<JsonObject>,
}

/// `{"type": "Graph", "nodes": [...], "rels": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    #[serde(rename = "type")]
    pub kind: String,
    pub nodes: Vec<JsonObject>,
    pub rels: Vec<JsonObject>,
}

impl Subgraph {
    pub fn new(nodes: Vec<JsonObject>, rels: Vec<JsonObject>) -> Self {
        Self {
            kind: "Graph".to_string(),
            nodes,
            rels,
        }
    }
}

pub struct QueryProcessor {
    store: Arc<dyn GraphStore>,
}

impl QueryProcessor {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    async fn run(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        log::debug!("Running {}", query);
        let records = self.store.run(query).await?;
        log::debug!("{:?} returned {} record(s)", query.template, records.len());
        Ok(records)
    }

    /// The node of the first record. No record is [`ProcgraphError::EmptyResult`].
    pub async fn fetch_single_node(&self, query: &GraphQuery) -> Result<JsonObject> {
        let records = self.run(query).await?;
        if records.len() > 1 {
            log::warn!(
                "{} matched {} records, using the first",
                query,
                records.len()
            );
        }
        match records.into_iter().next() {
            Some(Record::Node(node)) => Ok(node_to_json(&node, OutputMode::Tagged)),
            Some(_) => Err(unexpected_shape(query)),
            None => Err(ProcgraphError::EmptyResult(format!("no node for {}", query))),
        }
    }

    /// Every record's node; no records gives an empty list.
    pub async fn fetch_node_list(&self, query: &GraphQuery) -> Result<NodeList> {
        let nodes = self
            .run(query)
            .await?
            .into_iter()
            .map(|record| match record {
                Record::Node(node) => Ok(node_to_json(&node, OutputMode::Tagged)),
                _ => Err(unexpected_shape(query)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeList { nodes })
    }

    /// Attachment nodes in database order. Spareparts get the linking
    /// relationship's `amount` (null when the relationship has none).
    pub async fn fetch_attachments(&self, query: &GraphQuery) -> Result<StuffList> {
        let stuff = self
            .run(query)
            .await?
            .into_iter()
            .map(|record| match record {
                Record::Attachment { rel, node } => {
                    let mut data = node_to_json(&node, OutputMode::Tagged);
                    if node.has_label(SPAREPART) {
                        let amount = rel.properties.get(AMOUNT).map(Value::from).unwrap_or(Value::Null);
                        data.insert(AMOUNT.to_string(), amount);
                    }
                    Ok(data)
                }
                _ => Err(unexpected_shape(query)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(StuffList { stuff })
    }

    /// The single subgraph record, members untagged.
    pub async fn fetch_subgraph(&self, query: &GraphQuery) -> Result<Subgraph> {
        let records = self.run(query).await?;
        match records.into_iter().next() {
            Some(Record::Subgraph { nodes, rels }) => Ok(Subgraph::new(
                nodes
                    .iter()
                    .map(|n| node_to_json(n, OutputMode::Untagged))
                    .collect(),
                rels.iter()
                    .map(|r| rel_to_json(r, OutputMode::Untagged))
                    .collect(),
            )),
            Some(_) => Err(unexpected_shape(query)),
            None => Err(ProcgraphError::EmptyResult(format!(
                "no subgraph for {}",
                query
            ))),
        }
    }
}

fn unexpected_shape(query: &GraphQuery) -> ProcgraphError {
    ProcgraphError::Database(format!("unexpected record shape for {}", query))
}
