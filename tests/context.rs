mod common;

use common::init_tracing;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use varcontext::{builder, DefaultVariable};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct Provision {
    name: String,
    #[serde(rename = "instance_count")]
    count: String,
    labels: Option<String>,
}

#[test]
fn built_context_extracts_into_a_struct() {
    init_tracing();
    let ctx = builder()
        .merge_json_object(r#"{"name": "db", "tier": "gold"}"#)
        .merge_defaults([DefaultVariable::new("instance_count", "${len(name) + 1}")])
        .build()
        .unwrap();

    let p: Provision = ctx.to_struct().unwrap();
    assert_eq!(
        p,
        Provision { name: "db".into(), count: "3".into(), labels: None }
    );
    assert_eq!(ctx.get_i64("instance_count").unwrap(), 3);
}

#[test]
fn rendered_booleans_read_back_as_booleans() {
    init_tracing();
    let ctx = builder()
        .merge_map([("plan", json!("large"))])
        .merge_eval_result("ha", "${plan == 'large' ? true : false}")
        .build()
        .unwrap();
    assert!(ctx.get_bool("ha").unwrap());
    assert_eq!(ctx.get_string("ha").unwrap(), "true");
}

#[test]
fn constants_stay_out_of_the_output() {
    let ctx = builder()
        .set_eval_constants([("secret", json!("s3"))])
        .merge_eval_result("masked", "${str.truncate(1, secret)}***")
        .build()
        .unwrap();
    assert!(!ctx.contains_key("secret"));
    assert_eq!(ctx.keys().collect::<Vec<_>>(), ["masked"]);
    assert_eq!(ctx.get_as::<String>("masked").unwrap(), "s***");
}

#[test]
fn context_is_shareable_across_threads() {
    let ctx = builder().merge_map([("a", json!(1))]).build().unwrap();
    let ctx = std::sync::Arc::new(ctx);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            std::thread::spawn(move || ctx.get_i64("a").unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 1);
    }
}

#[test]
fn iterates_in_key_order() {
    let ctx = builder()
        .merge_map([("b", json!(2)), ("a", json!(1))])
        .build()
        .unwrap();
    let pairs: Vec<_> = (&ctx).into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    assert_eq!(pairs, ["a=1", "b=2"]);
    assert_eq!(ctx.len(), 2);
}
