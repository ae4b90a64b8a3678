use proptest::prelude::*;
use serde_json::{json, Map, Value};
use varcontext::{builder, DefaultVariable};

fn small_map() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-e]", any::<i64>(), 0..5)
        .prop_map(|m| m.into_iter().map(|(k, v)| (k, json!(v))).collect())
}

proptest! {
    #[test]
    fn merge_map_is_last_writer_wins(maps in prop::collection::vec(small_map(), 0..4)) {
        let mut expected = Map::new();
        let mut b = builder();
        for m in &maps {
            expected.extend(m.clone());
            b = b.merge_map(m.clone());
        }
        prop_assert_eq!(b.build_map().unwrap(), expected);
    }

    #[test]
    fn merge_defaults_follow_overwrite_policy(existing in any::<i64>(), default in any::<i64>(), overwrite in any::<bool>()) {
        let out = builder()
            .merge_map([("k", json!(existing))])
            .merge_defaults([DefaultVariable::new("k", default).with_overwrite(overwrite)])
            .build_map()
            .unwrap();
        let want = if overwrite { default } else { existing };
        prop_assert_eq!(out.get("k"), Some(&json!(want)));
    }
}
