//! Cypher queries against the teacher graph.

pub mod explore;
pub mod search;

use kgf_core::{AttributeValue, Attributes, GraphNode};
use neo4rs::Node;

/// Strings longer than this are carried as text blobs.
const TEXT_THRESHOLD: usize = 200;

/// Only allow alphanumeric + underscore in labels interpolated into Cypher.
pub(crate) fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Convert a bolt node into a [`GraphNode`]. Nodes without a name are skipped.
pub(crate) fn to_graph_node(node: &Node, degree: i64) -> Option<GraphNode> {
    let name: String = node.get("name").ok()?;
    if name.is_empty() {
        return None;
    }

    let mut properties = Attributes::new();
    for key in node.keys() {
        if key == "name" {
            continue;
        }
        if let Some(value) = property_value(node, key) {
            properties.insert(key.to_string(), value);
        }
    }

    Some(GraphNode {
        name,
        properties,
        degree: degree.max(0) as usize,
    })
}

/// Scalar properties only; lists, maps and temporal values are dropped.
fn property_value(node: &Node, key: &str) -> Option<AttributeValue> {
    if let Ok(s) = node.get::<String>(key) {
        return Some(if s.chars().count() > TEXT_THRESHOLD {
            AttributeValue::Text(s)
        } else {
            AttributeValue::String(s)
        });
    }
    if let Ok(n) = node.get::<i64>(key) {
        return Some(AttributeValue::Number(n as f64));
    }
    if let Ok(n) = node.get::<f64>(key) {
        return Some(AttributeValue::Number(n));
    }
    if let Ok(b) = node.get::<bool>(key) {
        return Some(AttributeValue::String(b.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Teacher"), "Teacher");
        assert_eq!(sanitize_label("Teacher) DETACH DELETE (n"), "TeacherDETACHDELETEn");
        assert_eq!(sanitize_label("教师"), "教师");
    }
}
