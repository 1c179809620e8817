//! Graph database boundary.
//!
//! Every read goes through one of the fixed [`QueryTemplate`]s. A
//! [`GraphStore`] runs a bound [`GraphQuery`] inside a single scoped session
//! and hands back decoded [`Record`]s; it never interprets them.

pub mod memory;
mod neo4j;

pub use memory::MemoryGraph;
pub use neo4j::Neo4jStore;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::{Node, Relationship};

/// The fixed set of read queries the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTemplate {
    /// Start event by name. Params: `name`.
    StartByName,
    /// Any node by id. Params: `id`.
    NodeById,
    /// Direct successors over one outgoing `SEQ` edge. Params: `id`.
    NextById,
    /// Neighbours over any single non-`SEQ` edge, either direction. Params: `id`.
    StuffById,
    /// Neighbours over any single edge carrying a label. Params: `id`, `stuff_type`.
    StuffByIdWithLabel,
    /// Distinct nodes and relationships on all outgoing paths. Params: `id`.
    TraverseTree,
    /// End node and final edge of every outgoing path whose final edge is not `SEQ`.
    /// Params: `id`.
    AllStuffById,
    /// End node and final edge of every outgoing path ending at a label; `SEQ`
    /// final edges are kept. Params: `id`, `stuff_type`.
    AllStuffByIdWithLabel,
}

/// Columns a template returns, which decides how rows are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `node`
    Node,
    /// `rel`, `node`
    RelNode,
    /// `nodes`, `rels`
    Subgraph,
}

impl QueryTemplate {
    pub fn cypher(self) -> &'static str {
        match self {
            QueryTemplate::StartByName => {
                r#"
                MATCH (a:Event {type: 'start', name: $name})
                RETURN a AS node
                "#
            }
            QueryTemplate::NodeById => {
                r#"
                MATCH (a)
                WHERE id(a) = $id
                RETURN a AS node
                "#
            }
            QueryTemplate::NextById => {
                r#"
                MATCH (a)-[:SEQ]->(b)
                WHERE id(a) = $id
                RETURN b AS node
                "#
            }
            QueryTemplate::StuffById => {
                r#"
                MATCH (a)-[r]-(b)
                WHERE id(a) = $id
                  AND type(r) <> 'SEQ'
                RETURN r AS rel, b AS node
                "#
            }
            QueryTemplate::StuffByIdWithLabel => {
                r#"
                MATCH (a)-[r]-(b)
                WHERE id(a) = $id
                  AND $stuff_type IN labels(b)
                RETURN r AS rel, b AS node
                "#
            }
            QueryTemplate::TraverseTree => {
                r#"
                MATCH (a)
                WHERE id(a) = $id
                OPTIONAL MATCH p = (a)-[*]->(b)
                UNWIND (CASE WHEN p IS NULL THEN [null] ELSE relationships(p) END) AS rel
                WITH a, collect(DISTINCT b) AS reached, collect(DISTINCT rel) AS rels
                RETURN [a] + [n IN reached WHERE n <> a] AS nodes, rels
                "#
            }
            QueryTemplate::AllStuffById => {
                r#"
                MATCH (a)-[rs*]->(b)
                WHERE id(a) = $id
                WITH last(rs) AS rel, b
                WHERE type(rel) <> 'SEQ'
                RETURN rel, b AS node
                "#
            }
            QueryTemplate::AllStuffByIdWithLabel => {
                r#"
                MATCH (a)-[rs*]->(b)
                WHERE id(a) = $id
                  AND $stuff_type IN labels(b)
                WITH last(rs) AS rel, b
                RETURN rel, b AS node
                "#
            }
        }
    }

    pub fn shape(self) -> RecordShape {
        match self {
            QueryTemplate::StartByName | QueryTemplate::NodeById | QueryTemplate::NextById => {
                RecordShape::Node
            }
            QueryTemplate::StuffById
            | QueryTemplate::StuffByIdWithLabel
            | QueryTemplate::AllStuffById
            | QueryTemplate::AllStuffByIdWithLabel => RecordShape::RelNode,
            QueryTemplate::TraverseTree => RecordShape::Subgraph,
        }
    }
}

/// Value bound to a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    String(String),
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

/// A template plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub template: QueryTemplate,
    params: Vec<(&'static str, ParamValue)>,
}

impl GraphQuery {
    pub fn new(template: QueryTemplate) -> Self {
        Self {
            template,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<ParamValue>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    pub fn params(&self) -> &[(&'static str, ParamValue)] {
        &self.params
    }

    pub fn int_param(&self, key: &str) -> Option<i64> {
        self.params.iter().find(|(k, _)| *k == key).and_then(|(_, v)| match v {
            ParamValue::Integer(i) => Some(*i),
            ParamValue::String(_) => None,
        })
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| *k == key).and_then(|(_, v)| match v {
            ParamValue::String(s) => Some(s.as_str()),
            ParamValue::Integer(_) => None,
        })
    }
}

impl fmt::Display for GraphQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(", self.template)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                ParamValue::Integer(v) => write!(f, "{}={}", key, v)?,
                ParamValue::String(v) => write!(f, "{}={:?}", key, v)?,
            }
        }
        write!(f, ")")
    }
}

/// One decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Node(Node),
    Attachment { rel: Relationship, node: Node },
    Subgraph {
        nodes: Vec<Node>,
        rels: Vec<Relationship>,
    },
}

/// A read-only graph database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one query inside one session. The session is released before
    /// this returns, whatever the outcome.
    async fn run(&self, query: &GraphQuery) -> Result<Vec<Record>>;

    /// Number of sessions currently checked out.
    fn open_sessions(&self) -> usize;
}

/// Counts sessions checked out of a store.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    open: Arc<AtomicUsize>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkout(&self) -> SessionGuard {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        log::trace!("Session checked out ({} open)", open);
        SessionGuard {
            open: Arc::clone(&self.open),
        }
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Releases its session when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let open = self.open.fetch_sub(1, Ordering::SeqCst) - 1;
        log::trace!("Session released ({} open)", open);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_lookup() {
        let query = GraphQuery::new(QueryTemplate::StuffByIdWithLabel)
            .param("id", 4i64)
            .param("stuff_type", "Tool");
        assert_eq!(query.int_param("id"), Some(4));
        assert_eq!(query.str_param("stuff_type"), Some("Tool"));
        assert_eq!(query.str_param("id"), None);
        assert_eq!(query.int_param("missing"), None);
    }

    #[test]
    fn test_query_display() {
        let query = GraphQuery::new(QueryTemplate::StartByName).param("name", "Machine burns");
        assert_eq!(query.to_string(), r#"StartByName(name="Machine burns")"#);
    }

    #[test]
    fn test_template_shapes_match_return_columns() {
        let all = [
            QueryTemplate::StartByName,
            QueryTemplate::NodeById,
            QueryTemplate::NextById,
            QueryTemplate::StuffById,
            QueryTemplate::StuffByIdWithLabel,
            QueryTemplate::TraverseTree,
            QueryTemplate::AllStuffById,
            QueryTemplate::AllStuffByIdWithLabel,
        ];
        for template in all {
            let cypher = template.cypher();
            match template.shape() {
                RecordShape::Node => assert!(cypher.contains("AS node")),
                RecordShape::RelNode => {
                    assert!(cypher.contains("rel") && cypher.contains("b AS node"))
                }
                RecordShape::Subgraph => {
                    assert!(cypher.contains("AS nodes") && cypher.contains("rels"))
                }
            }
        }
    }

    #[test]
    fn test_only_unfiltered_templates_exclude_sequence() {
        assert!(QueryTemplate::StuffById.cypher().contains("<> 'SEQ'"));
        assert!(QueryTemplate::AllStuffById.cypher().contains("<> 'SEQ'"));
        assert!(!QueryTemplate::StuffByIdWithLabel.cypher().contains("'SEQ'"));
        assert!(!QueryTemplate::AllStuffByIdWithLabel.cypher().contains("'SEQ'"));
    }

    #[test]
    fn test_session_guard_releases_on_drop() {
        let tracker = SessionTracker::new();
        {
            let _a = tracker.checkout();
            let _b = tracker.checkout();
            assert_eq!(tracker.open(), 2);
        }
        assert_eq!(tracker.open(), 0);
    }
}
