//! In-memory property graph that answers the fixed query templates.
//!
//! Used by the test suites. Variable-length patterns follow
//! Cypher semantics: a path never repeats a relationship, and every distinct
//! path yields its own row.

use std::collections::HashSet;

use async_trait::async_trait;

use super::{GraphQuery, GraphStore, QueryTemplate, Record, SessionTracker};
use crate::error::{ProcgraphError, Result};
use crate::graph::{Node, Properties, PropertyValue, Relationship};

#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: Vec<Node>,
    rels: Vec<Relationship>,
    next_id: i64,
    failure: Option<String>,
    sessions: SessionTracker,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn add_node<L, S>(&mut self, labels: L, properties: Properties) -> i64
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.allocate_id();
        self.nodes.push(Node::new(id, labels, properties));
        id
    }

    /// Add a relationship `start -[rel_type]-> end` and return its id
    pub fn add_rel(
        &mut self,
        start: i64,
        rel_type: &str,
        end: i64,
        properties: Properties,
    ) -> i64 {
        let id = self.allocate_id();
        self.rels
            .push(Relationship::new(id, rel_type, start, end, properties));
        id
    }

    /// Make every subsequent query fail as if the database were unreachable
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn evaluate(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        if let Some(message) = &self.failure {
            return Err(ProcgraphError::Database(message.clone()));
        }

        let records: Vec<Record> = match query.template {
            QueryTemplate::StartByName => {
                let name = require_str(query, "name")?;
                self.nodes
                    .iter()
                    .filter(|n| {
                        n.has_label("Event")
                            && n.properties.get("type") == Some(&PropertyValue::from("start"))
                            && n.properties.get("name") == Some(&PropertyValue::from(name))
                    })
                    .cloned()
                    .map(Record::Node)
                    .collect()
            }
            QueryTemplate::NodeById => {
                let id = require_int(query, "id")?;
                self.node(id).cloned().map(Record::Node).into_iter().collect()
            }
            QueryTemplate::NextById => {
                let id = require_int(query, "id")?;
                self.rels
                    .iter()
                    .filter(|r| r.start == id && r.is_sequence())
                    .filter_map(|r| self.node(r.end))
                    .cloned()
                    .map(Record::Node)
                    .collect()
            }
            QueryTemplate::StuffById => {
                let id = require_int(query, "id")?;
                self.neighbours(id)
                    .filter(|(rel, _)| !rel.is_sequence())
                    .map(attachment)
                    .collect()
            }
            QueryTemplate::StuffByIdWithLabel => {
                let id = require_int(query, "id")?;
                let label = require_str(query, "stuff_type")?;
                self.neighbours(id)
                    .filter(|(_, node)| node.has_label(label))
                    .map(attachment)
                    .collect()
            }
            QueryTemplate::TraverseTree => {
                let id = require_int(query, "id")?;
                match self.node(id) {
                    Some(start) => vec![self.subgraph(start)],
                    None => Vec::new(),
                }
            }
            QueryTemplate::AllStuffById => {
                let id = require_int(query, "id")?;
                self.path_ends(id)
                    .into_iter()
                    .filter(|(rel, _)| !rel.is_sequence())
                    .map(attachment)
                    .collect()
            }
            QueryTemplate::AllStuffByIdWithLabel => {
                let id = require_int(query, "id")?;
                let label = require_str(query, "stuff_type")?;
                self.path_ends(id)
                    .into_iter()
                    .filter(|(_, node)| node.has_label(label))
                    .map(attachment)
                    .collect()
            }
        };
        Ok(records)
    }

    /// `(a)-[r]-(b)`: both directions, self-loops once.
    fn neighbours(&self, id: i64) -> impl Iterator<Item = (&Relationship, &Node)> + '_ {
        let exists = self.node(id).is_some();
        self.rels
            .iter()
            .filter(move |r| exists && (r.start == id || r.end == id))
            .filter_map(move |r| {
                let other = if r.start == id { r.end } else { r.start };
                self.node(other).map(|n| (r, n))
            })
    }

    /// Final relationship and end node of every outgoing path of length >= 1.
    fn path_ends(&self, id: i64) -> Vec<(&Relationship, &Node)> {
        let mut ends = Vec::new();
        if self.node(id).is_none() {
            return ends;
        }
        let mut used = HashSet::new();
        self.walk(id, &mut used, &mut |rel| {
            if let Some(node) = self.node(rel.end) {
                ends.push((rel, node));
            }
        });
        ends
    }

    fn subgraph(&self, start: &Node) -> Record {
        let mut node_ids = vec![start.id];
        let mut rel_ids = Vec::new();
        let mut used = HashSet::new();
        self.walk(start.id, &mut used, &mut |rel| {
            if !rel_ids.contains(&rel.id) {
                rel_ids.push(rel.id);
            }
            if !node_ids.contains(&rel.end) {
                node_ids.push(rel.end);
            }
        });
        Record::Subgraph {
            nodes: node_ids
                .iter()
                .filter_map(|id| self.node(*id))
                .cloned()
                .collect(),
            rels: rel_ids
                .iter()
                .filter_map(|id| self.rels.iter().find(|r| r.id == *id))
                .cloned()
                .collect(),
        }
    }

    // Depth-first over relationship-unique paths; `visit` sees each path's last edge.
    fn walk<'a>(
        &'a self,
        from: i64,
        used: &mut HashSet<i64>,
        visit: &mut dyn FnMut(&'a Relationship),
    ) {
        for rel in self.rels.iter().filter(|r| r.start == from) {
            if !used.insert(rel.id) {
                continue;
            }
            visit(rel);
            self.walk(rel.end, used, visit);
            used.remove(&rel.id);
        }
    }
}

fn attachment((rel, node): (&Relationship, &Node)) -> Record {
    Record::Attachment {
        rel: rel.clone(),
        node: node.clone(),
    }
}

fn require_int(query: &GraphQuery, key: &str) -> Result<i64> {
    query
        .int_param(key)
        .ok_or_else(|| ProcgraphError::Database(format!("missing integer parameter ${}", key)))
}

fn require_str<'q>(query: &'q GraphQuery, key: &str) -> Result<&'q str> {
    query
        .str_param(key)
        .ok_or_else(|| ProcgraphError::Database(format!("missing string parameter ${}", key)))
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn run(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        let _session = self.sessions.checkout();
        self.evaluate(query)
    }

    fn open_sessions(&self) -> usize {
        self.sessions.open()
    }
}
