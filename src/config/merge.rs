//! Configuration layering
//!
//! Layers are merged as raw YAML values before deserializing, so a drop-in
//! that only names `web.user` does not reset every other field to its
//! default. Precedence, lowest first:
//! 1. Built-in defaults
//! 2. /etc/ec2-bootstrap/config.yaml
//! 3. /etc/ec2-bootstrap/config.d/*.yaml (sorted alphabetically)

use serde_yaml::Value;
use tracing::debug;

/// Merge two YAML values recursively
///
/// Mappings merge key by key. Sequences and scalars from `overlay` replace
/// the base value; a null overlay keeps the base.
pub fn merge_yaml_values(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                if let Some(base_value) = result.get(key) {
                    let merged = merge_yaml_values(base_value, overlay_value);
                    result.insert(key.clone(), merged);
                } else {
                    result.insert(key.clone(), overlay_value.clone());
                }
            }

            Value::Mapping(result)
        }

        (base_value, Value::Null) => base_value.clone(),

        (_, overlay_value) => overlay_value.clone(),
    }
}

/// Fold layers over a base document (later layers have higher priority)
pub fn merge_all(base: Value, layers: &[Value]) -> Value {
    layers.iter().fold(base, |acc, layer| {
        debug!("Merging configuration layer");
        merge_yaml_values(&acc, layer)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_overlay_scalar_wins() {
        let merged = merge_yaml_values(
            &yaml("web:\n  user: apache"),
            &yaml("web:\n  user: www-data"),
        );
        assert_eq!(merged, yaml("web:\n  user: www-data"));
    }

    #[test]
    fn test_keeps_base_when_overlay_missing() {
        let merged = merge_yaml_values(
            &yaml("web:\n  user: apache\n  group: apache"),
            &yaml("web:\n  group: www-data\nreport_dir: /tmp/r"),
        );
        assert_eq!(
            merged,
            yaml("web:\n  user: apache\n  group: www-data\nreport_dir: /tmp/r")
        );
    }

    #[test]
    fn test_lists_replace() {
        let merged = merge_yaml_values(
            &yaml("php:\n  packages: [httpd, php, php-fpm]"),
            &yaml("php:\n  packages: [nginx]"),
        );
        let packages = merged["php"]["packages"].as_sequence().unwrap();
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_null_overlay_keeps_base() {
        let merged = merge_yaml_values(&yaml("report_dir: /run/x"), &yaml("report_dir: ~"));
        assert_eq!(merged, yaml("report_dir: /run/x"));
    }

    #[test]
    fn test_merge_all_in_order() {
        let merged = merge_all(
            yaml("a: 1\nb: 1"),
            &[yaml("a: 2"), yaml("a: 3\nc: 3")],
        );
        assert_eq!(merged, yaml("a: 3\nb: 1\nc: 3"));
    }

    #[test]
    fn test_merge_all_without_layers() {
        assert_eq!(merge_all(yaml("a: 1"), &[]), yaml("a: 1"));
    }
}
