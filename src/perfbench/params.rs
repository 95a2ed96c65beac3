use serde::de::DeserializeOwned;
use serde_json;
use serde_json::Value;
use std::path::Path;

use super::error::{Error, Result};

/// Hierarchical parameter source backed by a JSON document.
///
/// Lookups are keyed by path-like namespace strings, e.g.
/// `/run/ior/client_processes/*`. The path segments are walked from the
/// document root; a trailing `*` means the parameter may live at that node or
/// anywhere below it (first match in depth-first order wins). Absence is not
/// an error here — callers decide which parameters are required.
pub struct Params {
    root: Value,
}

impl Params {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Params> {
        use std::fs::File;
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::Configuration(format!("failed to open {:?}: {}", path.as_ref(), e))
        })?;
        let root = serde_json::from_reader(file).map_err(|e| {
            Error::Configuration(format!("failed to parse {:?}: {}", path.as_ref(), e))
        })?;
        Ok(Params { root: root })
    }

    pub fn from_value(root: Value) -> Params {
        Params { root: root }
    }

    /// Deserialize a top-level section of the document, e.g. the run context.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.root
            .get(key)
            .ok_or_else(|| Error::Configuration(format!("missing config section '{}'", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::Configuration(format!("invalid config section '{}': {}", key, e)))
    }

    pub fn get(&self, name: &str, namespace: &str) -> Option<&Value> {
        let mut node = &self.root;
        let mut wildcard = false;
        for segment in namespace.split('/').filter(|s| !s.is_empty()) {
            if segment == "*" {
                wildcard = true;
                break;
            }
            node = node.get(segment)?;
        }
        if let Some(value) = node.get(name) {
            return Some(value);
        }
        if wildcard {
            find_below(node, name)
        } else {
            None
        }
    }

    pub fn get_str(&self, name: &str, namespace: &str) -> Option<String> {
        match self.get(name, namespace) {
            Some(&Value::String(ref s)) => Some(s.clone()),
            Some(&Value::Number(ref n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get_u64(&self, name: &str, namespace: &str) -> Option<u64> {
        self.get(name, namespace).and_then(|v| v.as_u64())
    }
}

// Depth-first search for `name` in the subtree below `node`.
fn find_below<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
    let map = node.as_object()?;
    for child in map.values() {
        if let Some(found) = child.get(name) {
            return Some(found);
        }
    }
    for child in map.values() {
        if let Some(found) = find_below(child, name) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::Params;

    fn params() -> Params {
        let doc = r#"{
            "run": {
                "ior": {
                    "client_processes": {
                        "hw": { "np": 32, "ppn": 16 }
                    },
                    "api": "DFS"
                },
                "ior_dfs_sx": {
                    "write_flags": "-w -C -e -g -G 27 -k",
                    "read_flags": "-r -R -C -e -g -G 27"
                }
            }
        }"#;
        Params::from_value(::serde_json::from_str(doc).unwrap())
    }

    #[test]
    fn direct_lookup() {
        let p = params();
        assert_eq!(p.get_str("api", "/run/ior/*"), Some("DFS".to_string()));
        assert_eq!(
            p.get_str("write_flags", "/run/ior_dfs_sx/*"),
            Some("-w -C -e -g -G 27 -k".to_string())
        );
    }

    #[test]
    fn wildcard_searches_subtree() {
        // np lives two levels below client_processes
        let p = params();
        assert_eq!(p.get_u64("np", "/run/ior/client_processes/*"), Some(32));
        assert_eq!(p.get_u64("ppn", "/run/ior/client_processes/*"), Some(16));
    }

    #[test]
    fn missing_is_none() {
        let p = params();
        assert!(p.get("np", "/run/mdtest/client_processes/*").is_none());
        assert!(p.get_str("nonexistent", "/run/ior/*").is_none());
    }

    #[test]
    fn no_wildcard_means_exact_node() {
        let p = params();
        assert!(p.get("np", "/run/ior").is_none());
        assert_eq!(p.get_str("api", "/run/ior"), Some("DFS".to_string()));
    }

    #[test]
    fn numbers_render_as_strings() {
        let p = params();
        assert_eq!(
            p.get_str("np", "/run/ior/client_processes/*"),
            Some("32".to_string())
        );
    }
}
