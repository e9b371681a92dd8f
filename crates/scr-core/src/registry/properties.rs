use std::collections::BTreeMap;

use crate::kernel::constants::PRIVATE_PROPERTY_PREFIX;

/// Component and service properties, ordered by key
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Copy of `properties` without the keys reserved for component-internal use
pub fn public_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| !is_private_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keys prefixed with the private marker are never published
pub fn is_private_key(key: &str) -> bool {
    key.starts_with(PRIVATE_PROPERTY_PREFIX)
}
