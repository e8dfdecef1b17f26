//! PDF/Excel/CSV出力の統合テスト

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use observer_common::export::pdf_core::build_report;
use observer_common::{PhotoSlot, Row, Status};
use observer_sync::cli::{ExportFormat, PdfQuality};
use observer_sync::error::ObserverError;
use observer_sync::export::{self, csv, excel, images, pdf, ExportOptions};
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

fn create_test_row(index: usize) -> Row {
    Row {
        srno: format!("{:03}", index),
        part_name: format!("Part {}", index),
        op_number: format!("OP-{}", index * 100),
        observation: format!("Observation text {}, with comma", index),
        action_plan: "Replace gasket".to_string(),
        responsibility: "Maintenance".to_string(),
        remarks: if index % 2 == 0 { "Check weekly".to_string() } else { String::new() },
        status: if index % 2 == 0 { Status::Completed } else { Status::Pending },
        ..Row::new(format!("r{}", index))
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("PNGエンコード失敗");
    std::fs::write(path, buf).expect("PNG書き込み失敗");
}

fn options(format: ExportFormat, output: &Path) -> ExportOptions {
    ExportOptions {
        format,
        output: output.to_path_buf(),
        pdf_quality: PdfQuality::Medium,
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
    }
}

#[test]
fn test_pdf_generation_without_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("test_output.pdf");

    let rows: Vec<Row> = (1..=3).map(create_test_row).collect();
    let report = build_report(&rows, "Line 4", "2026-03-14");

    let result = pdf::generate_pdf(&report, &output_path, |_| None);

    assert!(result.is_ok(), "PDF生成に失敗: {:?}", result.err());
    let bytes = std::fs::read(&output_path).expect("PDF読み込み失敗");
    assert!(bytes.starts_with(b"%PDF"), "PDFヘッダがない");
}

/// 多数のエントリで改ページしても生成できる
#[test]
fn test_pdf_generation_many_entries() {
    let rows: Vec<Row> = (1..=25).map(create_test_row).collect();
    let report = build_report(&rows, "Line 4", "2026-03-14");

    let few = pdf::generate_pdf_buffer(&build_report(&rows[..1], "Line 4", "2026-03-14"), |_| None).unwrap();
    let many = pdf::generate_pdf_buffer(&report, |_| None).unwrap();
    assert!(many.len() > few.len());
}

/// 写真付きのエントリ
#[test]
fn test_pdf_generation_with_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let photo = dir.path().join("before.png");
    write_png(&photo, 1200, 900);
    let image = images::prepare_image(&std::fs::read(&photo).unwrap(), PdfQuality::Low)
        .expect("画像の準備に失敗");

    let mut row = create_test_row(1);
    row.before_photo = PhotoSlot::Remote("https://cdn.example/p1/before/1.png".into());
    let report = build_report(&[row], "Line 4", "2026-03-14");
    assert!(report.sections[0].has_images());

    let with_image = pdf::generate_pdf_buffer(&report, |reference| {
        (reference == "https://cdn.example/p1/before/1.png").then(|| image.clone())
    })
    .unwrap();
    let without_image = pdf::generate_pdf_buffer(&report, |_| None).unwrap();

    assert!(with_image.starts_with(b"%PDF"));
    assert!(with_image.len() > without_image.len());
}

/// 画像品質ごとに生成できる
#[test]
fn test_pdf_quality_options() {
    let dir = tempdir().expect("Failed to create temp dir");
    let photo = dir.path().join("after.png");
    write_png(&photo, 1600, 800);
    let bytes = std::fs::read(&photo).unwrap();

    for quality in [PdfQuality::Low, PdfQuality::Medium, PdfQuality::High] {
        let image = images::prepare_image(&bytes, quality).expect("画像の準備に失敗");
        assert_eq!(image.width_px, quality.max_width());

        let mut row = create_test_row(2);
        row.after_photo = PhotoSlot::Remote("after".into());
        let report = build_report(&[row], "Line 4", "2026-03-14");
        let output_path = dir.path().join(format!("test_{}.pdf", quality));

        let result = pdf::generate_pdf(&report, &output_path, |_| Some(image.clone()));
        assert!(result.is_ok(), "PDF生成({})に失敗: {:?}", quality, result.err());
        assert!(output_path.exists(), "PDFファイル({})が作成されていない", quality);
    }
}

/// Excelを書き出して読み戻す
#[test]
fn test_excel_generation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("test_output.xlsx");

    let mut rows: Vec<Row> = (1..=5).map(create_test_row).collect();
    rows[0].before_photo = PhotoSlot::Remote("https://cdn.example/a.jpg".into());

    let result = excel::generate_excel(&rows, &output_path);
    assert!(result.is_ok(), "Excel生成に失敗: {:?}", result.err());

    let mut workbook = open_workbook_auto(&output_path).expect("Excelを開けない");
    let range = workbook
        .worksheet_range_at(0)
        .expect("シートがない")
        .expect("シートを読めない");

    assert_eq!(range.height(), 6);
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("SR No".into())));
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("001".into())));
    assert_eq!(range.get_value((1, 1)), Some(&Data::String("Part 1".into())));
    // 写真はURLのみ
    assert_eq!(
        range.get_value((1, 4)),
        Some(&Data::String("https://cdn.example/a.jpg".into()))
    );
}

#[test]
fn test_excel_generation_empty_rows() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("empty.xlsx");

    let result = excel::generate_excel(&[], &output_path);
    assert!(result.is_ok(), "空のExcel生成に失敗: {:?}", result.err());
}

/// CSVはBOM付きで、カンマを含む値を引用する
#[test]
fn test_csv_generation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("test_output.csv");

    csv::write_csv(&[create_test_row(1)], &output_path).unwrap();

    let content = std::fs::read_to_string(&output_path).unwrap();
    assert!(content.starts_with('\u{feff}'));
    let mut lines = content.trim_start_matches('\u{feff}').lines();
    assert!(lines.next().unwrap().starts_with("SR No,Part Name,Operation Number"));
    let data = lines.next().unwrap();
    assert!(data.starts_with("001,Part 1,OP-100,\"Observation text 1, with comma\""));
    assert!(data.ends_with(",pending"));
}

/// 全形式をディレクトリへ出力（ファイル名はプロジェクト名と日付）
#[tokio::test]
async fn test_export_all_formats() {
    let dir = tempdir().expect("Failed to create temp dir");
    let photo = dir.path().join("before.png");
    write_png(&photo, 300, 200);

    let mut rows: Vec<Row> = (1..=3).map(create_test_row).collect();
    rows[0].before_photo = PhotoSlot::Remote(format!("file://{}", photo.display()));
    // 出力対象外（SR No・部品名・観察が空）
    rows.push(Row {
        remarks: "only remarks".into(),
        ..Row::new("r-remarks")
    });

    let out = dir.path().join("exports");
    let files = export::export_rows(&rows, "Line 4", &options(ExportFormat::All, &out))
        .await
        .unwrap();

    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["Line 4-2026-03-14.pdf", "Line 4-2026-03-14.xlsx", "Line 4-2026-03-14.csv"]
    );
    assert!(files.iter().all(|p| p.exists()));

    let csv_content = std::fs::read_to_string(&files[2]).unwrap();
    // 見出し + 3行
    assert_eq!(csv_content.lines().count(), 4);
    assert!(!csv_content.contains("only remarks"));
}

/// 取得できない写真は省略してPDFを出力する
#[tokio::test]
async fn test_export_pdf_with_missing_photo() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut row = create_test_row(1);
    row.after_photo = PhotoSlot::Remote(dir.path().join("missing.jpg").display().to_string());

    let output = dir.path().join("report.pdf");
    let files = export::export_rows(&[row], "Line 4", &options(ExportFormat::Pdf, &output))
        .await
        .unwrap();

    assert_eq!(files, vec![output.clone()]);
    assert!(std::fs::read(&output).unwrap().starts_with(b"%PDF"));
}

/// 出力対象が無ければエラー
#[tokio::test]
async fn test_export_without_exportable_rows() {
    let dir = tempdir().expect("Failed to create temp dir");
    let rows = vec![
        Row::new("blank"),
        Row {
            action_plan: "plan only".into(),
            ..Row::new("plan")
        },
    ];

    let result = export::export_rows(&rows, "Line 4", &options(ExportFormat::Csv, dir.path())).await;
    assert!(matches!(result, Err(ObserverError::NoMeaningfulData)));
}
