//! Neo4j backend over the Bolt protocol.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};

use super::{GraphQuery, GraphStore, ParamValue, Record, RecordShape, SessionTracker};
use crate::config::Neo4jConfig;
use crate::error::{ProcgraphError, Result};
use crate::graph::{Node, Properties, PropertyValue, Relationship};

/// Long-lived driver; the pool inside `Graph` hands out one connection per query.
pub struct Neo4jStore {
    graph: Graph,
    sessions: SessionTracker,
}

impl Neo4jStore {
    /// Connect using the configured credentials
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let password = config
            .resolve_password()
            .map_err(|e| ProcgraphError::Config(e.to_string()))?;

        let mut builder = ConfigBuilder::default()
            .uri(config.uri())
            .user(config.user.as_str())
            .password(password)
            .max_connections(config.max_connections);
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }

        log::info!("Connecting to Neo4j at {}", config.uri());
        let graph = Graph::connect(builder.build()?).await?;

        Ok(Self {
            graph,
            sessions: SessionTracker::new(),
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn run(&self, graph_query: &GraphQuery) -> Result<Vec<Record>> {
        // Dropping the guard and the row stream returns the connection on every path.
        let _session = self.sessions.checkout();

        let mut q = query(graph_query.template.cypher());
        for (key, value) in graph_query.params() {
            q = match value {
                ParamValue::Integer(v) => q.param(key, *v),
                ParamValue::String(v) => q.param(key, v.as_str()),
            };
        }

        let shape = graph_query.template.shape();
        let mut stream = self.graph.execute(q).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(decode_row(shape, &row)?);
        }
        Ok(records)
    }

    fn open_sessions(&self) -> usize {
        self.sessions.open()
    }
}

fn decode_row(shape: RecordShape, row: &Row) -> Result<Record> {
    match shape {
        RecordShape::Node => {
            let node: neo4rs::Node = row.get("node")?;
            Ok(Record::Node(convert_node(&node)?))
        }
        RecordShape::RelNode => {
            let rel: neo4rs::Relation = row.get("rel")?;
            let node: neo4rs::Node = row.get("node")?;
            Ok(Record::Attachment {
                rel: convert_rel(&rel)?,
                node: convert_node(&node)?,
            })
        }
        RecordShape::Subgraph => {
            let nodes: Vec<neo4rs::Node> = row.get("nodes")?;
            let rels: Vec<neo4rs::Relation> = row.get("rels")?;
            Ok(Record::Subgraph {
                nodes: nodes.iter().map(convert_node).collect::<Result<_>>()?,
                rels: rels.iter().map(convert_rel).collect::<Result<_>>()?,
            })
        }
    }
}

// Temporal values arrive as their string form; spatial values have no
// PropertyValue form and fail decoding.
fn convert_node(node: &neo4rs::Node) -> Result<Node> {
    let mut properties = Properties::new();
    for key in node.keys() {
        let value: PropertyValue = node.get(key)?;
        properties.insert(key, value);
    }
    Ok(Node::new(node.id(), node.labels(), properties))
}

fn convert_rel(rel: &neo4rs::Relation) -> Result<Relationship> {
    let mut properties = Properties::new();
    for key in rel.keys() {
        let value: PropertyValue = rel.get(key)?;
        properties.insert(key, value);
    }
    Ok(Relationship::new(
        rel.id(),
        rel.typ(),
        rel.start_node_id(),
        rel.end_node_id(),
        properties,
    ))
}
