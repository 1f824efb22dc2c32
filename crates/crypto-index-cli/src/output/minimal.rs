use serde_json::Value;

use super::{cell, result_of};

/// Fields that answer each command, most specific first.
const KEY_FIELDS: [&str; 4] = ["passed", "last_value", "final_anchor", "points"];

/// Print only the headline value: verification verdict, latest index level,
/// or one label per listed period.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    match result {
        Value::Object(map) => {
            let headline = KEY_FIELDS
                .iter()
                .filter_map(|k| map.get(*k))
                .find(|v| !v.is_null());
            match headline {
                Some(v) => println!("{}", cell(v)),
                None => {
                    if let Some((key, val)) = map.iter().next() {
                        println!("{key}: {}", cell(val));
                    }
                }
            }
        }
        Value::Array(rows) => {
            for row in rows {
                match row.get("label") {
                    Some(label) => println!("{}", cell(label)),
                    None => println!("{}", cell(row)),
                }
            }
        }
        other => println!("{}", cell(other)),
    }
}
