//! Cache key derivation.
//!
//! A key has the shape
//!
//! ```text
//! {RequestTypeFullName}{CustomerCode:<code>,AttributeKey:<guid>,<field1:value1,field2:value2,...>}
//! ```
//!
//! Fields are the top-level members of the request's JSON serialization in
//! declaration order. The attribute key is a GUID-shaped rendering of the
//! first 16 bytes of a SHA-256 digest over the caller's sorted attributes.

use rampart_core::Request;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::CacheError;

/// Derives the cache key for a typed request.
///
/// # Errors
///
/// Returns `CacheError::Serialization` if the request cannot be serialized.
///
/// # Example
///
/// ```
/// use rampart_cache::derive_request_key;
/// use rampart_core::Request;
/// use serde::Serialize;
/// use std::collections::BTreeMap;
///
/// #[derive(Serialize)]
/// struct GetCityListQuery {
///     country: String,
/// }
///
/// impl Request for GetCityListQuery {
///     type Response = Vec<String>;
/// }
///
/// let query = GetCityListQuery { country: "NL".into() };
/// let key = derive_request_key(&query, "ACME", &BTreeMap::new()).unwrap();
/// assert!(key.ends_with(
///     "{CustomerCode:ACME,AttributeKey:42c4b0e3-fc98-141c-9afb-f4c8996fb924,country:NL}"
/// ));
/// ```
pub fn derive_request_key<R: Request>(
    request: &R,
    customer_code: &str,
    attributes: &BTreeMap<String, Vec<String>>,
) -> Result<String, CacheError> {
    let fields = serde_json::to_value(request)?;
    Ok(derive_key(
        R::request_type().full_name(),
        &fields,
        customer_code,
        attributes,
    ))
}

/// Derives a cache key from already-serialized request fields.
#[must_use]
pub fn derive_key(
    type_name: &str,
    fields: &Value,
    customer_code: &str,
    attributes: &BTreeMap<String, Vec<String>>,
) -> String {
    format!(
        "{type_name}{{CustomerCode:{customer_code},AttributeKey:{},{}}}",
        attribute_key(attributes),
        render_fields(fields)
    )
}

/// Hashes the caller's attributes into a GUID-shaped string.
///
/// Segments are `key:[v1,v2]`, ordered by key and joined with `,`. Value
/// order within a key is significant.
#[must_use]
pub fn attribute_key(attributes: &BTreeMap<String, Vec<String>>) -> String {
    let joined = attributes
        .iter()
        .map(|(key, values)| format!("{key}:[{}]", values.join(",")))
        .collect::<Vec<_>>()
        .join(",");

    let digest = Sha256::digest(joined.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes_le(bytes).to_string()
}

fn render_fields(fields: &Value) -> String {
    match fields {
        Value::Object(members) => members
            .iter()
            .map(|(name, value)| format!("{name}:{}", render_value(value)))
            .collect::<Vec<_>>()
            .join(","),
        // unit structs and non-struct requests carry no named fields
        _ => String::new(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct GetCityListQuery {
        search: Option<String>,
        codes: Vec<String>,
        page: u32,
        active: bool,
    }

    impl Request for GetCityListQuery {
        type Response = Vec<String>;
    }

    #[derive(Serialize)]
    struct PingQuery;

    impl Request for PingQuery {
        type Response = ();
    }

    fn attrs(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_empty_attributes_hash() {
        assert_eq!(
            attribute_key(&BTreeMap::new()),
            "42c4b0e3-fc98-141c-9afb-f4c8996fb924"
        );
    }

    #[test]
    fn test_attribute_hash_is_sorted_by_key() {
        let attributes = attrs(&[("Role", &["Admin"]), ("Region", &["EU", "US"])]);
        assert_eq!(
            attribute_key(&attributes),
            "00bd9196-1306-d197-9648-886265f9715d"
        );
    }

    #[test]
    fn test_attribute_value_order_is_significant() {
        let a = attrs(&[("Region", &["EU", "US"])]);
        let b = attrs(&[("Region", &["US", "EU"])]);
        assert_ne!(attribute_key(&a), attribute_key(&b));
    }

    #[test]
    fn test_field_rendering() {
        let query = GetCityListQuery {
            search: None,
            codes: vec!["AMS".into(), "RTM".into()],
            page: 2,
            active: true,
        };

        let key = derive_request_key(&query, "ACME", &BTreeMap::new()).unwrap();
        let type_name = GetCityListQuery::request_type().full_name();
        assert_eq!(
            key,
            format!(concat!(
                "{type_name}{{CustomerCode:ACME,",
                "AttributeKey:42c4b0e3-fc98-141c-9afb-f4c8996fb924,",
                "search:,codes:AMS,RTM,page:2,active:true}}"
            ), type_name = type_name)
        );
    }

    #[test]
    fn test_nested_object_is_compact_json() {
        let fields = json!({"filter": {"country": "NL", "min": 3}});
        let key = derive_key("Q", &fields, "C", &BTreeMap::new());
        assert!(key.ends_with(r#",filter:{"country":"NL","min":3}}"#));
    }

    #[test]
    fn test_request_without_fields() {
        let key = derive_request_key(&PingQuery, "ACME", &BTreeMap::new()).unwrap();
        assert!(key.ends_with("AttributeKey:42c4b0e3-fc98-141c-9afb-f4c8996fb924,}"));
    }

    #[test]
    fn test_customer_code_distinguishes_keys() {
        let fields = json!({"page": 1});
        let a = derive_key("Q", &fields, "ACME", &BTreeMap::new());
        let b = derive_key("Q", &fields, "GLOBEX", &BTreeMap::new());
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn key_is_deterministic(
            customer in "[A-Z]{1,8}",
            search in proptest::option::of("[a-z ]{0,12}"),
            page in any::<u32>(),
            attributes in proptest::collection::btree_map(
                "[A-Za-z]{1,6}",
                proptest::collection::vec("[a-z0-9]{0,4}", 0..3),
                0..4,
            ),
        ) {
            let fields = json!({"search": search, "page": page});
            let first = derive_key("Q", &fields, &customer, &attributes);
            let second = derive_key("Q", &fields.clone(), &customer, &attributes.clone());
            prop_assert_eq!(first, second);
        }
    }
}
