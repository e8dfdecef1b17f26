//! レイアウト設定モジュール
//!
//! PDFはmm基準、表形式（Excel/CSV）は列定義で管理する

// ============================================
// PDF（mm基準）
// ============================================

/// A4サイズ（mm）
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// 余白（mm）
pub const MARGIN_MM: f32 = 20.0;

/// 写真枠（mm）
pub const IMAGE_WIDTH_MM: f32 = 60.0;
pub const IMAGE_HEIGHT_MM: f32 = 45.0;
pub const IMAGE_SPACING_MM: f32 = 10.0;

/// 1エントリに必要な高さの目安（mm）。足りなければ改ページ
pub const ENTRY_MIN_SPACE_MM: f32 = 80.0;
pub const IMAGE_MIN_SPACE_MM: f32 = 60.0;

/// 本文の行送り（mm）
pub const LINE_HEIGHT_MM: f32 = 4.0;

/// 利用可能幅（mm）
pub const USABLE_WIDTH_MM: f32 = A4_WIDTH_MM - MARGIN_MM * 2.0;

/// mm → pt変換 (1mm = 72/25.4 pt)
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// Helvetica の平均文字幅（フォントサイズ比）
pub const AVG_CHAR_WIDTH_RATIO: f32 = 0.5;

// ============================================
// 表形式の列定義
// ============================================

/// 表の1列
#[derive(Debug, Clone, Copy)]
pub struct ColumnDefinition {
    pub key: &'static str,
    pub label: &'static str,
    /// Excel列幅（文字数）
    pub width: f64,
}

/// エクスポート列（Excel/CSV共通）
pub const EXPORT_COLUMNS: &[ColumnDefinition] = &[
    ColumnDefinition { key: "srno", label: "SR No", width: 8.0 },
    ColumnDefinition { key: "partName", label: "Part Name", width: 20.0 },
    ColumnDefinition { key: "opNumber", label: "Operation Number", width: 16.0 },
    ColumnDefinition { key: "observation", label: "Observation", width: 40.0 },
    ColumnDefinition { key: "beforePhoto", label: "Before Photo", width: 30.0 },
    ColumnDefinition { key: "afterPhoto", label: "After Photo", width: 30.0 },
    ColumnDefinition { key: "actionPlan", label: "Action Plan", width: 40.0 },
    ColumnDefinition { key: "responsibility", label: "Responsibility", width: 18.0 },
    ColumnDefinition { key: "remarks", label: "Remarks", width: 30.0 },
    ColumnDefinition { key: "status", label: "Status", width: 12.0 },
];

/// 取込テンプレートの見出し（列順は取込と同じ）
pub const TEMPLATE_HEADERS: &[&str] = &[
    "SR No",
    "Part Name",
    "Operation Number",
    "Observation",
    "Before Photo",
    "After Photo",
    "Action Plan",
    "Responsibility",
    "Remarks",
];

/// 取込テンプレートのサンプル行
pub const TEMPLATE_SAMPLES: &[[&str; 9]] = &[
    ["001", "Sample Part", "OP-100", "Sample observation text", "", "", "Sample action plan", "John Doe", "Sample remarks"],
    ["002", "Another Part", "OP-200", "Another observation", "", "", "Another action plan", "Jane Smith", "More remarks"],
];

// ============================================
// ヘルパー関数
// ============================================

/// mm → pt 変換
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * MM_TO_PT
}

/// pt → mm 変換
#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / MM_TO_PT
}

/// 指定フォントサイズで幅に収まるおおよその文字数
pub fn chars_per_line(width_mm: f32, font_size_pt: f32) -> usize {
    let char_width_mm = pt_to_mm(font_size_pt * AVG_CHAR_WIDTH_RATIO);
    ((width_mm / char_width_mm).floor() as usize).max(1)
}

/// テキストのおおよその描画幅（mm）
pub fn text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    text.chars().count() as f32 * pt_to_mm(font_size_pt * AVG_CHAR_WIDTH_RATIO)
}
