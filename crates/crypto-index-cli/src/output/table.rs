use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, is_record_list, record_headers, result_of, scalar_fields};

/// Render the result as tables: scalar fields first, then one table per
/// record list (periods, history).
pub fn print_table(value: &Value) {
    match result_of(value) {
        Value::Object(result) => print_result(result),
        Value::Array(rows) => print_records(rows),
        other => println!("{}", cell(other)),
    }

    if let Some(envelope) = value.as_object().filter(|m| m.contains_key("result")) {
        print_envelope_notes(envelope);
    }
}

fn print_result(result: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in scalar_fields(result) {
        builder.push_record([key.clone(), cell(val)]);
    }
    println!("{}", Table::from(builder));

    for (key, val) in result {
        if let Value::Array(rows) = val {
            if is_record_list(val) {
                println!("\n{key}:");
                print_records(rows);
            }
        }
    }
}

fn print_records(rows: &[Value]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }
    if !rows.iter().all(Value::is_object) {
        for row in rows {
            println!("{}", cell(row));
        }
        return;
    }

    let headers = record_headers(rows);
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }

    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {methodology}");
    }
}
