//! スプレッドシート取込
//!
//! 先頭シートの2行目以降を固定の列順で読み込む:
//! SR No / 部品名 / OP番号 / 観察 / 施策前写真(未使用) / 施策後写真(未使用) / 施策 / 担当 / 備考

use crate::editor::new_row_id;
use crate::error::{ObserverError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use observer_common::export::excel_core::generate_template_buffer;
use observer_common::Row;
use std::path::Path;
use tracing::{debug, info};

const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// 取込対象の拡張子か
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// スプレッドシートから行を読み込む
pub fn import_spreadsheet(path: &Path) -> Result<Vec<Row>> {
    if !is_supported(path) {
        return Err(ObserverError::Import(format!(
            "対応していないファイル形式です（xlsx/xls/ods）: {}",
            path.display()
        )));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ObserverError::Import(format!("{}: {}", path.display(), e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ObserverError::Import("シートがありません".into()))?
        .map_err(|e| ObserverError::Import(e.to_string()))?;

    let records = range
        .rows()
        .skip(1)
        .map(|cells| cells.iter().map(cell_text).collect::<Vec<String>>());
    let rows = rows_from_records(records);
    info!(path = %path.display(), count = rows.len(), "スプレッドシートを取込");
    Ok(rows)
}

/// 文字列化した各行を Row に変換
///
/// SR No と部品名の両方が空の行は捨てる。
pub fn rows_from_records<I>(records: I) -> Vec<Row>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut rows = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let col = |i: usize| record.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let srno = col(0);
        let part_name = col(1);
        if srno.is_empty() && part_name.is_empty() {
            debug!(line = index + 2, "SR No・部品名が空の行をスキップ");
            continue;
        }
        rows.push(Row {
            srno,
            part_name,
            op_number: col(2),
            observation: col(3),
            action_plan: col(6),
            responsibility: col(7),
            remarks: col(8),
            ..Row::new(new_row_id())
        });
    }
    rows
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // 整数値は小数点なしで
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// 取込用テンプレート（見出し＋サンプル2行）を書き出す
pub fn write_template(path: &Path) -> Result<()> {
    let buffer = generate_template_buffer().map_err(ObserverError::ExcelGeneration)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, buffer)?;
    Ok(())
}
