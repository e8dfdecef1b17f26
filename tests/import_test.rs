//! スプレッドシート取込テスト

use observer_sync::import;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tempfile::tempdir;

fn record(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn write_workbook(path: &Path, rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *value).expect("セル書き込み失敗");
        }
    }
    workbook.save(path).expect("ブック保存失敗");
}

/// SR No・部品名が両方空の行は捨てる
#[test]
fn test_rows_without_key_columns_are_dropped() {
    let rows = import::rows_from_records(vec![
        record(&["001", "Engine Block", "OP-100", "Oil leak", "", "", "Replace gasket", "Maintenance", "Urgent"]),
        record(&["", "", "OP-200", "Orphan observation"]),
    ]);

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.srno, "001");
    assert_eq!(row.part_name, "Engine Block");
    assert_eq!(row.op_number, "OP-100");
    assert_eq!(row.observation, "Oil leak");
    assert_eq!(row.action_plan, "Replace gasket");
    assert_eq!(row.responsibility, "Maintenance");
    assert_eq!(row.remarks, "Urgent");
    assert!(!row.id.is_empty());
}

/// xlsx を書いて読み込む（見出し行は読み飛ばす）
#[test]
fn test_import_xlsx() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("rows.xlsx");
    write_workbook(
        &path,
        &[
            vec!["SR No", "Part Name", "Operation Number", "Observation", "Before Photo", "After Photo", "Action Plan", "Responsibility", "Remarks"],
            vec!["001", " Engine Block ", "OP-100", "Oil leak", "", "", "Replace gasket", "Maintenance", ""],
            vec!["", "", "", "ignored"],
            vec!["", "Brake", "", "Pad wear"],
        ],
    );

    let rows = import::import_spreadsheet(&path).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].part_name, "Engine Block");
    assert_eq!(rows[0].action_plan, "Replace gasket");
    assert_eq!(rows[1].srno, "");
    assert_eq!(rows[1].part_name, "Brake");
    assert_ne!(rows[0].id, rows[1].id);
}

/// 数値セルは整数なら小数点なしで取り込む
#[test]
fn test_import_numeric_cells() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("numbers.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "SR No").unwrap();
    sheet.write_number(1, 0, 7.0).unwrap();
    sheet.write_string(1, 1, "Gear").unwrap();
    sheet.write_number(1, 2, 12.5).unwrap();
    workbook.save(&path).unwrap();

    let rows = import::import_spreadsheet(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].srno, "7");
    assert_eq!(rows[0].op_number, "12.5");
}

/// テンプレートをそのまま取り込むとサンプル2行になる
#[test]
fn test_template_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("observation_template.xlsx");

    import::write_template(&path).unwrap();
    assert!(path.exists());

    let rows = import::import_spreadsheet(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].part_name, "Sample Part");
    assert_eq!(rows[1].responsibility, "Jane Smith");
}

/// 対応拡張子の判定
#[test]
fn test_supported_extensions() {
    assert!(import::is_supported(Path::new("a.xlsx")));
    assert!(import::is_supported(Path::new("a.XLS")));
    assert!(import::is_supported(Path::new("a.ods")));
    assert!(!import::is_supported(Path::new("a.csv")));
    assert!(!import::is_supported(Path::new("noext")));
}
