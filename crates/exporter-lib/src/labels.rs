//! Resolution of swarm service labels
//!
//! Both the event supervisor and the stats gatherer key their series by
//! service name and id. Missing labels collapse onto a single sentinel so
//! series cardinality stays bounded.

use std::collections::HashMap;

pub const SERVICE_NAME_LABEL: &str = "com.docker.swarm.service.name";
pub const SERVICE_ID_LABEL: &str = "com.docker.swarm.service.id";
pub const DEFAULT_LABEL_VALUE: &str = "unknown";

/// Look up `key`, treating an empty value the same as a missing one.
pub fn label_or_default<'a>(
    labels: &'a HashMap<String, String>,
    key: &str,
    default: &'a str,
) -> &'a str {
    match labels.get(key) {
        Some(value) if !value.is_empty() => value,
        _ => default,
    }
}

/// Normalized `(serviceName, serviceID)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLabels {
    pub name: String,
    pub id: String,
}

impl ServiceLabels {
    pub fn resolve(labels: &HashMap<String, String>) -> Self {
        Self {
            name: label_or_default(labels, SERVICE_NAME_LABEL, DEFAULT_LABEL_VALUE).to_string(),
            id: label_or_default(labels, SERVICE_ID_LABEL, DEFAULT_LABEL_VALUE).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_present_labels() {
        let resolved = ServiceLabels::resolve(&labels(&[
            (SERVICE_NAME_LABEL, "web"),
            (SERVICE_ID_LABEL, "k3x9"),
            ("other", "ignored"),
        ]));

        assert_eq!(resolved.name, "web");
        assert_eq!(resolved.id, "k3x9");
    }

    #[test]
    fn test_resolve_missing_labels_use_default() {
        let resolved = ServiceLabels::resolve(&HashMap::new());

        assert_eq!(resolved.name, DEFAULT_LABEL_VALUE);
        assert_eq!(resolved.id, DEFAULT_LABEL_VALUE);
    }

    #[test]
    fn test_resolve_empty_value_treated_as_absent() {
        let resolved = ServiceLabels::resolve(&labels(&[
            (SERVICE_NAME_LABEL, ""),
            (SERVICE_ID_LABEL, "k3x9"),
        ]));

        assert_eq!(resolved.name, DEFAULT_LABEL_VALUE);
        assert_eq!(resolved.id, "k3x9");
    }

    #[test]
    fn test_label_or_default_custom_default() {
        let map = labels(&[("a", "1")]);
        assert_eq!(label_or_default(&map, "a", "none"), "1");
        assert_eq!(label_or_default(&map, "b", "none"), "none");
    }
}
