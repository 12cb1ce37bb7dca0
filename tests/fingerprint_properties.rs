//! Property tests for fingerprints and field diffs.

use proptest::prelude::*;
use serde_json::{Map, Value};
use settings_monitor::core::{FieldSet, diff_fields, fingerprint_of};
use std::collections::BTreeMap;

fn settings_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[A-Za-z.]{1,8}", "[a-z0-9]{0,8}", 0..8)
}

fn to_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect::<Map<String, Value>>(),
    )
}

proptest! {
    #[test]
    fn fingerprint_is_deterministic(map in settings_map()) {
        let value = to_value(&map);
        let before = value.clone();

        prop_assert_eq!(fingerprint_of(&value).unwrap(), fingerprint_of(&value).unwrap());
        prop_assert_eq!(value, before);
    }

    #[test]
    fn distinct_settings_have_distinct_fingerprints(
        a in settings_map(),
        b in settings_map(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(
            fingerprint_of(&to_value(&a)).unwrap(),
            fingerprint_of(&to_value(&b)).unwrap()
        );
    }

    #[test]
    fn diff_is_empty_exactly_when_equal(a in settings_map(), b in settings_map()) {
        let old = FieldSet::from_settings(&to_value(&a)).unwrap();
        let new = FieldSet::from_settings(&to_value(&b)).unwrap();
        prop_assert_eq!(diff_fields(&old, &new).is_empty(), a == b);
    }

    #[test]
    fn split_point_changes_fingerprint(key in "[a-z]{2,6}", value in "[a-z]{1,6}", split in 1usize..6) {
        prop_assume!(split < key.len());
        let (head, tail) = key.split_at(split);

        let whole = serde_json::json!({ key.clone(): value.clone() });
        let moved = serde_json::json!({ head: format!("{tail}{value}") });
        prop_assert_ne!(fingerprint_of(&whole).unwrap(), fingerprint_of(&moved).unwrap());
    }
}
