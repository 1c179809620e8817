//! Named process-model operations.
//!
//! Each operation binds one fixed [`QueryTemplate`], hands it to the
//! [`QueryProcessor`] and renders the result as indented JSON text.
//! [`ProcessFacade::traverse_tree_by_id`] is the exception and returns the
//! structured [`Subgraph`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::Neo4jConfig;
use crate::error::{ProcgraphError, Result};
use crate::graph::JsonObject;
use crate::processor::{QueryProcessor, Subgraph};
use crate::store::{GraphQuery, GraphStore, Neo4jStore, QueryTemplate};

pub struct ProcessFacade {
    processor: QueryProcessor,
}

impl ProcessFacade {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            processor: QueryProcessor::new(store),
        }
    }

    /// Connect to Neo4j with the given settings
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let store = Neo4jStore::connect(config).await?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn processor(&self) -> &QueryProcessor {
        &self.processor
    }

    /// Start event (`Event` node with `type: 'start'`) with the given name.
    pub async fn get_start_by_name(&self, name: &str) -> Result<String> {
        let name = require_non_empty("name", name)?;
        let query = GraphQuery::new(QueryTemplate::StartByName).param("name", name);
        to_json_text(&self.processor.fetch_single_node(&query).await?)
    }

    pub async fn get_node_by_id(&self, id: &str) -> Result<String> {
        let query = GraphQuery::new(QueryTemplate::NodeById).param("id", parse_node_id(id)?);
        to_json_text(&self.processor.fetch_single_node(&query).await?)
    }

    /// Nodes one outgoing `SEQ` edge away, as `{"nodes": [...]}`.
    pub async fn get_next_by_id(&self, id: &str) -> Result<String> {
        let query = GraphQuery::new(QueryTemplate::NextById).param("id", parse_node_id(id)?);
        to_json_text(&self.processor.fetch_node_list(&query).await?)
    }

    pub async fn get_next(&self, node: &JsonObject) -> Result<String> {
        self.get_next_by_id(&node_id(node)?.to_string()).await
    }

    /// Attachments one edge away in either direction, as `{"stuff": [...]}`.
    ///
    /// Without `stuff_type` every non-`SEQ` neighbour is returned. With it,
    /// neighbours carrying that label are returned whatever the edge type.
    pub async fn get_stuff_by_id(&self, id: &str, stuff_type: Option<&str>) -> Result<String> {
        let id = parse_node_id(id)?;
        let query = match stuff_type {
            None => GraphQuery::new(QueryTemplate::StuffById).param("id", id),
            Some(label) => GraphQuery::new(QueryTemplate::StuffByIdWithLabel)
                .param("id", id)
                .param("stuff_type", require_non_empty("stuff_type", label)?),
        };
        to_json_text(&self.processor.fetch_attachments(&query).await?)
    }

    pub async fn get_stuff(&self, node: &JsonObject, stuff_type: Option<&str>) -> Result<String> {
        self.get_stuff_by_id(&node_id(node)?.to_string(), stuff_type)
            .await
    }

    /// Everything reachable over outgoing paths, start node first.
    pub async fn traverse_tree_by_id(&self, id: &str) -> Result<Subgraph> {
        let query = GraphQuery::new(QueryTemplate::TraverseTree).param("id", parse_node_id(id)?);
        self.processor.fetch_subgraph(&query).await
    }

    pub async fn traverse_tree(&self, node: &JsonObject) -> Result<Subgraph> {
        self.traverse_tree_by_id(&node_id(node)?.to_string()).await
    }

    /// Attachments at the end of every outgoing path, one entry per path.
    ///
    /// Without `stuff_type`, paths whose final edge is `SEQ` are dropped.
    /// With it, only the end node's label is checked and `SEQ` final edges
    /// are kept.
    pub async fn get_all_stuff_by_id(
        &self,
        id: &str,
        stuff_type: Option<&str>,
    ) -> Result<String> {
        let id = parse_node_id(id)?;
        let query = match stuff_type {
            None => GraphQuery::new(QueryTemplate::AllStuffById).param("id", id),
            Some(label) => GraphQuery::new(QueryTemplate::AllStuffByIdWithLabel)
                .param("id", id)
                .param("stuff_type", require_non_empty("stuff_type", label)?),
        };
        to_json_text(&self.processor.fetch_attachments(&query).await?)
    }

    pub async fn get_all_stuff(
        &self,
        node: &JsonObject,
        stuff_type: Option<&str>,
    ) -> Result<String> {
        self.get_all_stuff_by_id(&node_id(node)?.to_string(), stuff_type)
            .await
    }
}

/// Parse a node id, tolerating surrounding whitespace.
pub fn parse_node_id(id: &str) -> Result<i64> {
    id.trim()
        .parse::<i64>()
        .map_err(|_| ProcgraphError::InvalidArgument(format!("node id '{}' is not an integer", id)))
}

/// The `id` of a node object, given as a number or a numeric string.
pub fn node_id(node: &JsonObject) -> Result<i64> {
    match node.get("id") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            ProcgraphError::InvalidArgument(format!("node id {} is not an integer", n))
        }),
        Some(Value::String(s)) => parse_node_id(s),
        Some(other) => Err(ProcgraphError::InvalidArgument(format!(
            "node id {} is not an integer",
            other
        ))),
        None => Err(ProcgraphError::InvalidArgument(
            "node has no 'id' field".to_string(),
        )),
    }
}

/// Serialize with four-space indentation, keys in insertion order.
pub fn to_json_text<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf)
        .map_err(|e| ProcgraphError::Serialization(serde::ser::Error::custom(e)))
}

fn require_non_empty<'a>(param: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(ProcgraphError::InvalidArgument(format!(
            "{} must not be empty",
            param
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Properties;
    use crate::processor::{NodeList, StuffList};
    use crate::store::MemoryGraph;
    use std::collections::HashSet;

    /// Ids of the fixture process.
    struct Fixture {
        start: i64,
        check: i64,
        replace: i64,
        end: i64,
        multimeter: i64,
        fuse: i64,
        fuse_bin: i64,
    }

    fn named(name: &str) -> Properties {
        let mut props = Properties::new();
        props.insert("name", name);
        props
    }

    fn event(name: &str, kind: &str) -> Properties {
        let mut props = named(name);
        props.insert("type", kind);
        props
    }

    fn amount(n: i64) -> Properties {
        let mut props = Properties::new();
        props.insert("amount", n);
        props
    }

    /// Machine burns -SEQ-> Check fuse -SEQ-> Replace fuse -SEQ-> Fixed
    ///                      |  USES  -> Multimeter (Tool)
    ///                      |  NEEDS -> Fuse (Sparepart, amount 5)
    ///                      Replace fuse -NEEDS-> Fuse (amount 2)
    ///                      Replace fuse -SEQ-> Fuse bin (Sparepart)
    fn fixture() -> (ProcessFacade, Fixture) {
        let mut g = MemoryGraph::new();
        let start = g.add_node(["Event"], event("Machine burns", "start"));
        let check = g.add_node(["Task"], named("Check fuse"));
        let replace = g.add_node(["Task"], named("Replace fuse"));
        let end = g.add_node(["Event"], event("Fixed", "end"));
        let multimeter = g.add_node(["Tool"], named("Multimeter"));
        let fuse = g.add_node(["Sparepart"], named("Fuse"));
        let fuse_bin = g.add_node(["Sparepart"], named("Fuse bin"));

        g.add_rel(start, "SEQ", check, Properties::new());
        g.add_rel(check, "SEQ", replace, Properties::new());
        g.add_rel(replace, "SEQ", end, Properties::new());
        g.add_rel(check, "USES", multimeter, Properties::new());
        g.add_rel(check, "NEEDS", fuse, amount(5));
        g.add_rel(replace, "NEEDS", fuse, amount(2));
        g.add_rel(replace, "SEQ", fuse_bin, Properties::new());

        let facade = ProcessFacade::new(Arc::new(g));
        let ids = Fixture {
            start,
            check,
            replace,
            end,
            multimeter,
            fuse,
            fuse_bin,
        };
        (facade, ids)
    }

    fn ids_of(items: &[JsonObject]) -> Vec<i64> {
        items.iter().map(|i| i["id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_get_node_by_id_returns_same_id() {
        let (facade, f) = fixture();
        for id in [f.start, f.check, f.fuse, f.end] {
            let text = facade.get_node_by_id(&id.to_string()).await.unwrap();
            let node: JsonObject = serde_json::from_str(&text).unwrap();
            assert_eq!(node["id"], id);
            assert_eq!(node["type"], "Node");
        }
    }

    #[tokio::test]
    async fn test_get_node_by_id_missing_is_empty_result() {
        let (facade, _) = fixture();
        let err = facade.get_node_by_id("4242").await.unwrap_err();
        assert!(matches!(err, ProcgraphError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn test_non_integer_id_is_invalid_argument() {
        let (facade, _) = fixture();
        for bad in ["abc", "1.5", ""] {
            assert!(matches!(
                facade.get_node_by_id(bad).await.unwrap_err(),
                ProcgraphError::InvalidArgument(_)
            ));
        }
        assert!(matches!(
            facade.get_next_by_id("x").await.unwrap_err(),
            ProcgraphError::InvalidArgument(_)
        ));
        assert!(matches!(
            facade.get_stuff_by_id("x", None).await.unwrap_err(),
            ProcgraphError::InvalidArgument(_)
        ));
        assert!(matches!(
            facade.traverse_tree_by_id("x").await.unwrap_err(),
            ProcgraphError::InvalidArgument(_)
        ));
        assert!(matches!(
            facade.get_all_stuff_by_id("x", Some("Tool")).await.unwrap_err(),
            ProcgraphError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn test_id_with_whitespace_is_accepted() {
        let (facade, f) = fixture();
        let text = facade.get_node_by_id(&format!(" {} ", f.check)).await.unwrap();
        assert!(text.contains("Check fuse"));
    }

    #[tokio::test]
    async fn test_next_without_successors_is_empty_list() {
        let (facade, f) = fixture();
        let text = facade.get_next_by_id(&f.end.to_string()).await.unwrap();
        let list: NodeList = serde_json::from_str(&text).unwrap();
        assert!(list.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_stuff_never_includes_sequence_neighbours() {
        let (facade, f) = fixture();
        let text = facade.get_stuff_by_id(&f.replace.to_string(), None).await.unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        // check (SEQ in), end and fuse_bin (SEQ out) are excluded
        assert_eq!(ids_of(&stuff.stuff), vec![f.fuse]);
        assert_eq!(stuff.stuff[0]["amount"], 2);
    }

    #[tokio::test]
    async fn test_stuff_with_label_ignores_edge_type() {
        let (facade, f) = fixture();
        let text = facade
            .get_stuff_by_id(&f.replace.to_string(), Some("Sparepart"))
            .await
            .unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        let found: HashSet<_> = ids_of(&stuff.stuff).into_iter().collect();
        assert_eq!(found, HashSet::from([f.fuse, f.fuse_bin]));
    }

    #[tokio::test]
    async fn test_sparepart_amount_merged() {
        let (facade, f) = fixture();
        let text = facade
            .get_stuff_by_id(&f.check.to_string(), Some("Sparepart"))
            .await
            .unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        assert_eq!(stuff.stuff.len(), 1);
        assert_eq!(stuff.stuff[0]["name"], "Fuse");
        assert_eq!(stuff.stuff[0]["amount"], 5);
    }

    #[tokio::test]
    async fn test_all_stuff_unfiltered_excludes_sequence_final_edge() {
        let (facade, f) = fixture();
        let text = facade.get_all_stuff_by_id(&f.check.to_string(), None).await.unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        let found: Vec<_> = ids_of(&stuff.stuff);
        assert!(found.contains(&f.multimeter));
        assert!(found.contains(&f.fuse));
        // Fuse bin is only reached over a final SEQ edge
        assert!(!found.contains(&f.fuse_bin));
        assert!(!found.contains(&f.replace));
        assert!(!found.contains(&f.end));
    }

    #[tokio::test]
    async fn test_all_stuff_filtered_keeps_sequence_final_edge() {
        let (facade, f) = fixture();
        let text = facade
            .get_all_stuff_by_id(&f.check.to_string(), Some("Sparepart"))
            .await
            .unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        let found: HashSet<_> = ids_of(&stuff.stuff).into_iter().collect();
        assert_eq!(found, HashSet::from([f.fuse, f.fuse_bin]));
        let bin = stuff.stuff.iter().find(|s| s["id"] == f.fuse_bin).unwrap();
        // The SEQ edge carries no amount
        assert_eq!(bin["amount"], Value::Null);
    }

    #[tokio::test]
    async fn test_all_stuff_one_entry_per_path() {
        let (facade, f) = fixture();
        let text = facade.get_all_stuff_by_id(&f.check.to_string(), None).await.unwrap();
        let stuff: StuffList = serde_json::from_str(&text).unwrap();
        let amounts: HashSet<_> = stuff
            .stuff
            .iter()
            .filter(|s| s["id"] == f.fuse)
            .map(|s| s["amount"].as_i64().unwrap())
            .collect();
        assert_eq!(amounts, HashSet::from([5, 2]));
    }

    #[tokio::test]
    async fn test_traverse_deduplicates() {
        let mut g = MemoryGraph::new();
        // Diamond with a back edge: a -> b -> d, a -> c -> d, d -> a
        let a = g.add_node(["Event"], named("a"));
        let b = g.add_node(["Task"], named("b"));
        let c = g.add_node(["Task"], named("c"));
        let d = g.add_node(["Task"], named("d"));
        g.add_rel(a, "SEQ", b, Properties::new());
        g.add_rel(a, "SEQ", c, Properties::new());
        g.add_rel(b, "SEQ", d, Properties::new());
        g.add_rel(c, "SEQ", d, Properties::new());
        g.add_rel(d, "SEQ", a, Properties::new());
        let facade = ProcessFacade::new(Arc::new(g));

        let graph = facade.traverse_tree_by_id(&a.to_string()).await.unwrap();
        let node_ids = ids_of(&graph.nodes);
        let rel_ids = ids_of(&graph.rels);
        assert_eq!(node_ids.len(), 4);
        assert_eq!(node_ids.iter().collect::<HashSet<_>>().len(), 4);
        assert_eq!(node_ids[0], a);
        assert_eq!(rel_ids.len(), 5);
        assert_eq!(rel_ids.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[tokio::test]
    async fn test_traverse_leaf_is_start_only() {
        let (facade, f) = fixture();
        let graph = facade.traverse_tree_by_id(&f.multimeter.to_string()).await.unwrap();
        assert_eq!(ids_of(&graph.nodes), vec![f.multimeter]);
        assert!(graph.rels.is_empty());
    }

    #[tokio::test]
    async fn test_machine_burns_walkthrough() {
        let (facade, f) = fixture();

        let start: JsonObject =
            serde_json::from_str(&facade.get_start_by_name("Machine burns").await.unwrap()).unwrap();
        assert_eq!(start["id"], f.start);

        let next: NodeList = serde_json::from_str(&facade.get_next(&start).await.unwrap()).unwrap();
        assert_eq!(ids_of(&next.nodes), vec![f.check]);

        let stuff: StuffList =
            serde_json::from_str(&facade.get_stuff(&next.nodes[0], None).await.unwrap()).unwrap();
        let found: HashSet<_> = ids_of(&stuff.stuff).into_iter().collect();
        assert_eq!(found, HashSet::from([f.multimeter, f.fuse]));

        let all: StuffList =
            serde_json::from_str(&facade.get_all_stuff(&next.nodes[0], Some("Tool")).await.unwrap())
                .unwrap();
        assert_eq!(ids_of(&all.stuff), vec![f.multimeter]);

        let graph = facade.traverse_tree(&next.nodes[0]).await.unwrap();
        assert_eq!(graph.nodes[0]["id"], f.check);
    }

    #[tokio::test]
    async fn test_start_by_name_unknown_or_not_start() {
        let (facade, _) = fixture();
        assert!(matches!(
            facade.get_start_by_name("Unknown").await.unwrap_err(),
            ProcgraphError::EmptyResult(_)
        ));
        // An end event is not a start event
        assert!(matches!(
            facade.get_start_by_name("Fixed").await.unwrap_err(),
            ProcgraphError::EmptyResult(_)
        ));
        assert!(matches!(
            facade.get_start_by_name("  ").await.unwrap_err(),
            ProcgraphError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn test_start_event_type_property_replaced_by_tag() {
        let (facade, f) = fixture();
        let text = facade.get_start_by_name("Machine burns").await.unwrap();
        let expected = format!(
            "{{\n    \"id\": {},\n    \"labels\": [\n        \"Event\"\n    ],\n    \"name\": \"Machine burns\",\n    \"type\": \"Node\"\n}}",
            f.start
        );
        assert_eq!(text, expected);

        // Subgraph members are untagged and keep it
        let graph = facade.traverse_tree_by_id(&f.start.to_string()).await.unwrap();
        assert_eq!(graph.nodes[0]["id"], f.start);
        assert_eq!(graph.nodes[0]["type"], "start");
    }

    #[tokio::test]
    async fn test_text_is_four_space_indented_in_insertion_order() {
        let (facade, f) = fixture();
        let text = facade.get_node_by_id(&f.check.to_string()).await.unwrap();
        let expected = format!(
            "{{\n    \"id\": {},\n    \"labels\": [\n        \"Task\"\n    ],\n    \"name\": \"Check fuse\",\n    \"type\": \"Node\"\n}}",
            f.check
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_to_json_text_keeps_non_ascii() {
        let mut node = JsonObject::new();
        node.insert("name".to_string(), Value::from("Sicherung prüfen ⚡"));
        let text = to_json_text(&node).unwrap();
        assert_eq!(text, "{\n    \"name\": \"Sicherung prüfen ⚡\"\n}");
    }

    #[test]
    fn test_node_id_from_object() {
        let mut node = JsonObject::new();
        node.insert("id".to_string(), Value::from(7));
        assert_eq!(node_id(&node).unwrap(), 7);
        node.insert("id".to_string(), Value::from("8"));
        assert_eq!(node_id(&node).unwrap(), 8);
        node.insert("id".to_string(), Value::from(1.5));
        assert!(matches!(node_id(&node), Err(ProcgraphError::InvalidArgument(_))));
        node.remove("id");
        assert!(matches!(node_id(&node), Err(ProcgraphError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_sessions_released_on_every_path() {
        let (facade, f) = fixture();
        let _ = facade.get_node_by_id(&f.start.to_string()).await;
        let _ = facade.get_node_by_id("999").await;
        let _ = facade.get_next_by_id("nope").await;
        let _ = facade.traverse_tree_by_id(&f.start.to_string()).await;
        assert_eq!(facade.processor().store().open_sessions(), 0);
    }
}
