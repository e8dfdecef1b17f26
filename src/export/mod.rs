pub mod csv;
pub mod excel;
pub mod images;
pub mod pdf;

use crate::cli::{ExportFormat, PdfQuality};
use crate::error::{ObserverError, Result};
use chrono::NaiveDate;
use observer_common::export::pdf_core::build_report;
use observer_common::Row;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// 出力ディレクトリ、または拡張子付きのファイルパス
    pub output: PathBuf,
    pub pdf_quality: PdfQuality,
    pub date: NaiveDate,
}

/// 出力ファイル名の基本部分 `{project}-{YYYY-MM-DD}`
pub fn file_stem(project_name: &str, date: NaiveDate) -> String {
    let name: String = project_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let name = if name.is_empty() { "observations".to_string() } else { name };
    format!("{}-{}", name, date.format("%Y-%m-%d"))
}

fn output_path_for_format(output: &Path, stem: &str, extension: &str, single: bool) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", stem, extension))
    } else if single {
        output.to_path_buf()
    } else {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(stem);
        parent.join(format!("{}.{}", stem, extension))
    }
}

/// 行をエクスポートし、書き出したファイルを返す
///
/// 対象はSR No・部品名・観察のいずれかが入力された行。1行も無ければエラー。
pub async fn export_rows(rows: &[Row], project_name: &str, options: &ExportOptions) -> Result<Vec<PathBuf>> {
    let rows: Vec<Row> = rows.iter().filter(|r| r.is_exportable()).cloned().collect();
    if rows.is_empty() {
        return Err(ObserverError::NoMeaningfulData);
    }

    if options.output.extension().is_none() && !options.output.exists() {
        std::fs::create_dir_all(&options.output)?;
    }

    let stem = file_stem(project_name, options.date);
    let targets = options.format.targets();
    let single = targets.len() == 1;
    let mut written = Vec::new();

    for target in targets {
        let path = output_path_for_format(&options.output, &stem, target.extension(), single);
        match target {
            ExportFormat::Pdf => {
                let report = build_report(&rows, project_name, &options.date.format("%Y-%m-%d").to_string());
                let refs = report
                    .sections
                    .iter()
                    .flat_map(|s| [s.before_photo.as_deref(), s.after_photo.as_deref()])
                    .flatten();
                let images = images::fetch_images(refs, options.pdf_quality).await;
                pdf::generate_pdf(&report, &path, |reference| images.get(reference).cloned())?;
            }
            ExportFormat::Excel => excel::generate_excel(&rows, &path)?,
            ExportFormat::Csv => csv::write_csv(&rows, &path)?,
            ExportFormat::All => continue,
        }
        info!(path = %path.display(), count = rows.len(), "エクスポート完了");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Line 4", date()), "Line 4-2026-03-14");
        assert_eq!(file_stem("A/B", date()), "A_B-2026-03-14");
        assert_eq!(file_stem("  ", date()), "observations-2026-03-14");
    }

    #[test]
    fn test_output_path_single_file() {
        let path = output_path_for_format(Path::new("out/report.pdf"), "Line 4-2026-03-14", "pdf", true);
        assert_eq!(path, PathBuf::from("out/report.pdf"));
    }

    #[test]
    fn test_output_path_multiple_files_share_stem() {
        let path = output_path_for_format(Path::new("out/report.pdf"), "x", "csv", false);
        assert_eq!(path, PathBuf::from("out/report.csv"));
    }

    #[test]
    fn test_output_path_directory() {
        let path = output_path_for_format(Path::new("exports"), "Line 4-2026-03-14", "xlsx", true);
        assert_eq!(path, PathBuf::from("exports/Line 4-2026-03-14.xlsx"));
    }
}
