//! Excel生成（CLI版）
//!
//! 共通ライブラリでバッファを作り、ファイルに書き出す。写真は含めない。

use crate::error::{ObserverError, Result};
use observer_common::export::excel_core::generate_excel_buffer;
use observer_common::Row;
use std::path::Path;

pub fn generate_excel(rows: &[Row], output_path: &Path) -> Result<()> {
    let buffer = generate_excel_buffer(rows).map_err(ObserverError::ExcelGeneration)?;
    std::fs::write(output_path, buffer)?;
    Ok(())
}
