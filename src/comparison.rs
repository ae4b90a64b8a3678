use std::cmp::Ordering;

use serde_json::Value;

/// Orders two values the way the expression language compares them.
/// Numbers compare numerically, also against numeric strings; everything
/// else falls back to comparing the JSON text.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Number(na), Value::Number(nb)) => match (na.as_i64(), nb.as_i64()) {
            (Some(ia), Some(ib)) => ia.cmp(&ib),
            _ => cmp_f64(na.as_f64(), nb.as_f64()),
        },
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        (Value::Number(na), Value::String(sb)) => match sb.trim().parse::<f64>() {
            Ok(db) => cmp_f64(na.as_f64(), Some(db)),
            Err(_) => a.to_string().cmp(&b.to_string()),
        },
        (Value::String(sa), Value::Number(nb)) => match sa.trim().parse::<f64>() {
            Ok(da) => cmp_f64(Some(da), nb.as_f64()),
            Err(_) => a.to_string().cmp(&b.to_string()),
        },
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Loose equality: `1 == "1"` and `"true" == true` hold.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(ba), Value::String(sb)) | (Value::String(sb), Value::Bool(ba)) => {
            sb.parse::<bool>().map(|v| v == *ba).unwrap_or(false)
        }
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => cmp_values(a, b) == Ordering::Equal,
    }
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(da), Some(db)) => da.partial_cmp(&db).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}
