//! CSV生成（画像は含めない）

use super::column_value;
use crate::layout::EXPORT_COLUMNS;
use crate::types::Row;

/// RFC 4180 形式でCSV文字列を生成
pub fn generate_csv(rows: &[Row]) -> String {
    let mut out = String::new();

    let header: Vec<String> = EXPORT_COLUMNS.iter().map(|c| escape_field(c.label)).collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");

    for row in rows {
        let fields: Vec<String> = EXPORT_COLUMNS
            .iter()
            .map(|c| escape_field(column_value(row, c.key)))
            .collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }

    out
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
