//! Excel生成（共通ライブラリ）
//!
//! layout.rs の列定義を使用して一覧表形式のExcelを生成。画像は含めない

use super::column_value;
use crate::layout::{EXPORT_COLUMNS, TEMPLATE_HEADERS, TEMPLATE_SAMPLES};
use crate::types::Row;
use rust_xlsxwriter::*;

const SHEET_NAME: &str = "Observations";
const TEMPLATE_SHEET_NAME: &str = "Observation Template";

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA))
}

/// Excelをバッファに生成
pub fn generate_excel_buffer(rows: &[Row]) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let header_format = header_format();
    let value_format = Format::new()
        .set_font_size(10.0)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    for (col, column) in EXPORT_COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, column.width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        worksheet.write_string_with_format(0, col, column.label, &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
    }
    worksheet.set_freeze_panes(1, 0)
        .map_err(|e| format!("ウィンドウ枠固定エラー: {}", e))?;

    for (i, row) in rows.iter().enumerate() {
        let excel_row = (i + 1) as u32;
        for (col, column) in EXPORT_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(excel_row, col as u16, column_value(row, column.key), &value_format)
                .map_err(|e| format!("値書き込みエラー: {}", e))?;
        }
    }

    workbook.save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

/// 取込用テンプレートをバッファに生成
pub fn generate_template_buffer() -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();
    let header_format = header_format();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET_NAME)
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    for (col, header) in TEMPLATE_HEADERS.iter().enumerate() {
        let col = col as u16;
        // 列幅は最長の値 + 2（10〜50文字）
        let longest = TEMPLATE_SAMPLES
            .iter()
            .map(|sample| sample[col as usize].len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let width = (longest + 2).clamp(10, 50) as f64;
        worksheet.set_column_width(col, width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        worksheet.write_string_with_format(0, col, *header, &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
    }

    for (i, sample) in TEMPLATE_SAMPLES.iter().enumerate() {
        for (col, value) in sample.iter().enumerate() {
            worksheet.write_string((i + 1) as u32, col as u16, *value)
                .map_err(|e| format!("サンプル書き込みエラー: {}", e))?;
        }
    }

    workbook.save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}
