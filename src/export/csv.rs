use crate::error::Result;
use observer_common::export::csv_core::generate_csv;
use observer_common::Row;
use std::path::Path;

/// CSVを書き出す（UTF-8 BOM付き）
pub fn write_csv(rows: &[Row], output_path: &Path) -> Result<()> {
    let mut content = String::from('\u{feff}');
    content.push_str(&generate_csv(rows));
    std::fs::write(output_path, content)?;
    Ok(())
}
