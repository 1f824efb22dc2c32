use serde_json::{Map, Value};
use std::io;

use super::{cell, is_record_list, record_headers, result_of, scalar_fields};

/// Result as CSV on stdout. A full run prints its history, a summary its
/// periods, a listing one row per record; anything else is `field,value`.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = result_of(value);
    let written = match result {
        Value::Object(map) => write_object(&mut wtr, map),
        Value::Array(_) if is_record_list(result) => write_records(&mut wtr, result),
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| wtr.write_record([cell(item)])),
        other => wtr.write_record([cell(other)]),
    };

    if let Err(e) = written.and_then(|_| wtr.flush().map_err(csv::Error::from)) {
        eprintln!("CSV output error: {e}");
    }
}

fn write_object<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    result: &Map<String, Value>,
) -> csv::Result<()> {
    for key in ["history", "periods"] {
        if let Some(rows) = result.get(key).filter(|v| is_record_list(v)) {
            return write_records(wtr, rows);
        }
    }

    wtr.write_record(["field", "value"])?;
    for (key, val) in scalar_fields(result) {
        wtr.write_record([key.as_str(), &cell(val)])?;
    }
    Ok(())
}

fn write_records<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &Value) -> csv::Result<()> {
    let Value::Array(rows) = rows else {
        return Ok(());
    };
    let headers = record_headers(rows);
    wtr.write_record(&headers)?;
    for row in rows {
        wtr.write_record(
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default()),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        match result_of(value) {
            Value::Object(result) => write_object(&mut wtr, result).unwrap(),
            rows => write_records(&mut wtr, rows).unwrap(),
        }
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_full_run_prints_history() {
        let v = json!({"result": {
            "final_anchor": "100",
            "history": [
                {"timestamp": 1609632000, "index_value": "100"},
                {"timestamp": 1609718400, "index_value": "101.5"}
            ]
        }});
        assert_eq!(
            render(&v),
            "index_value,timestamp\n100,1609632000\n101.5,1609718400\n"
        );
    }

    #[test]
    fn test_scalar_result_is_field_value() {
        let v = json!({"result": {"passed": true, "max_gap_days": 1}});
        assert_eq!(render(&v), "field,value\nmax_gap_days,1\npassed,true\n");
    }
}
