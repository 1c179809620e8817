//! Normalization of graph entities into flat JSON objects.

use serde_json::{Map, Value};

use super::{Node, Properties, Relationship};

/// JSON object with keys in insertion order.
pub type JsonObject = Map<String, Value>;

/// Whether an entity carries its own `type` discriminator.
///
/// Single-node and list results are `Tagged`; subgraph members are
/// `Untagged` because the subgraph carries `type: "Graph"` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Tagged,
    Untagged,
}

const NODE_KEYS: &[&str] = &["id", "labels"];
const REL_KEYS: &[&str] = &["id", "start", "end", "rel_type"];

/// `{"id", "labels", ...properties, "type": "Node"}`
pub fn node_to_json(node: &Node, mode: OutputMode) -> JsonObject {
    let mut obj = JsonObject::new();
    obj.insert("id".to_string(), Value::from(node.id));
    obj.insert(
        "labels".to_string(),
        Value::Array(node.labels().iter().cloned().map(Value::String).collect()),
    );
    copy_properties(&mut obj, &node.properties, NODE_KEYS);
    if mode == OutputMode::Tagged {
        obj.insert("type".to_string(), Value::from("Node"));
    }
    obj
}

/// `{"id", "start", "end", "rel_type", ...properties, "type": "Rel"}`
pub fn rel_to_json(rel: &Relationship, mode: OutputMode) -> JsonObject {
    let mut obj = JsonObject::new();
    obj.insert("id".to_string(), Value::from(rel.id));
    obj.insert("start".to_string(), Value::from(rel.start));
    obj.insert("end".to_string(), Value::from(rel.end));
    obj.insert("rel_type".to_string(), Value::from(rel.rel_type.as_str()));
    copy_properties(&mut obj, &rel.properties, REL_KEYS);
    if mode == OutputMode::Tagged {
        obj.insert("type".to_string(), Value::from("Rel"));
    }
    obj
}

// Structural keys win over same-named properties. A `type` property survives
// only in untagged mode; the tag overwrites it in place otherwise.
fn copy_properties(obj: &mut JsonObject, props: &Properties, reserved: &[&str]) {
    for (key, value) in props.iter() {
        if reserved.contains(&key) {
            log::debug!("Property '{}' shadowed by structural field", key);
            continue;
        }
        obj.insert(key.to_string(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use std::collections::HashSet;

    fn sample_node() -> Node {
        let props: Properties = [
            ("name", PropertyValue::from("Machine burns")),
            ("type", PropertyValue::from("start")),
            ("priority", PropertyValue::from(2i64)),
        ]
        .into_iter()
        .collect();
        Node::new(12, ["Event"], props)
    }

    #[test]
    fn test_node_tagged_key_order() {
        let obj = node_to_json(&sample_node(), OutputMode::Tagged);
        let keys: Vec<_> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "labels", "name", "type", "priority"]);
        assert_eq!(obj["id"], 12);
        assert_eq!(obj["type"], "Node");
    }

    #[test]
    fn test_node_untagged_keeps_type_property() {
        let obj = node_to_json(&sample_node(), OutputMode::Untagged);
        assert_eq!(obj["type"], "start");
        assert_eq!(obj["name"], "Machine burns");
    }

    #[test]
    fn test_node_property_named_id_is_shadowed() {
        let mut props = Properties::new();
        props.insert("id", "external-17");
        let obj = node_to_json(&Node::new(4, ["Task"], props), OutputMode::Tagged);
        assert_eq!(obj["id"], 4);
    }

    #[test]
    fn test_node_json_parse_back_keeps_properties() {
        let mut props = Properties::new();
        props.insert("name", "Drill");
        props.insert("weight", 1.5f64);
        props.insert("electric", true);
        let node = Node::new(3, ["Tool", "Equipment"], props);

        let text = serde_json::to_string(&node_to_json(&node, OutputMode::Untagged)).unwrap();
        let parsed: JsonObject = serde_json::from_str(&text).unwrap();

        let labels: HashSet<_> = parsed["labels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l.as_str().unwrap().to_string())
            .collect();
        assert_eq!(labels, HashSet::from(["Tool".to_string(), "Equipment".to_string()]));

        let property_keys: HashSet<_> = parsed
            .keys()
            .filter(|k| !NODE_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        assert_eq!(
            property_keys,
            HashSet::from(["name".to_string(), "weight".to_string(), "electric".to_string()])
        );
        assert_eq!(parsed["weight"], 1.5);
        assert_eq!(parsed["electric"], true);
    }

    #[test]
    fn test_node_tagged_parse_back_loses_only_type_property() {
        let text = serde_json::to_string(&node_to_json(&sample_node(), OutputMode::Tagged)).unwrap();
        let parsed: JsonObject = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["name"], "Machine burns");
        assert_eq!(parsed["priority"], 2);
        assert_eq!(parsed["type"], "Node");
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_rel_tagged_and_untagged() {
        let mut props = Properties::new();
        props.insert("amount", 5i64);
        let rel = Relationship::new(40, "NEEDS", 12, 30, props);

        let tagged = rel_to_json(&rel, OutputMode::Tagged);
        let keys: Vec<_> = tagged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "start", "end", "rel_type", "amount", "type"]);
        assert_eq!(tagged["type"], "Rel");

        let untagged = rel_to_json(&rel, OutputMode::Untagged);
        assert!(!untagged.contains_key("type"));
        assert_eq!(untagged["rel_type"], "NEEDS");
        assert_eq!(untagged["amount"], 5);
    }
}
