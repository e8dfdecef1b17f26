//! Export core modules shared by the CLI and library wrappers.

pub mod pdf_core;
pub mod csv_core;

#[cfg(feature = "excel")]
pub mod excel_core;

/// 画像データ（バイト配列）
#[derive(Debug, Clone)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// 表形式エクスポートのセル値
pub fn column_value<'a>(row: &'a crate::types::Row, key: &str) -> &'a str {
    match key {
        "srno" => &row.srno,
        "partName" => &row.part_name,
        "opNumber" => &row.op_number,
        "observation" => &row.observation,
        "beforePhoto" => row.before_photo.remote_url().unwrap_or(""),
        "afterPhoto" => row.after_photo.remote_url().unwrap_or(""),
        "actionPlan" => &row.action_plan,
        "responsibility" => &row.responsibility,
        "remarks" => &row.remarks,
        "status" => row.status.as_str(),
        _ => "",
    }
}
