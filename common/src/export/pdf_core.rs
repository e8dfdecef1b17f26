//! PDF export core utilities.
//!
//! 描画ライブラリに依存しないレポート構造（見出し・折り返し済み本文・写真URL）を組み立てる。

use crate::summary::Summary;
use crate::types::Row;

pub const REPORT_TITLE: &str = "Observation Data Report";

/// 1エントリ分のセクション
#[derive(Debug, Clone)]
pub struct EntrySection {
    pub heading: String,
    pub op_number: String,
    pub responsibility: String,
    pub status: String,
    pub observation: String,
    pub action_plan: String,
    /// 空なら描画しない
    pub remarks: String,
    pub before_photo: Option<String>,
    pub after_photo: Option<String>,
}

impl EntrySection {
    pub fn has_images(&self) -> bool {
        self.before_photo.is_some() || self.after_photo.is_some()
    }
}

/// レポート全体
#[derive(Debug, Clone)]
pub struct PdfReport {
    pub title: &'static str,
    pub project_name: String,
    pub generated_on: String,
    pub summary: Summary,
    pub sections: Vec<EntrySection>,
}

impl PdfReport {
    pub fn footer(&self) -> String {
        format!("Total {} entries processed", self.sections.len())
    }
}

/// レポート構造を構築
pub fn build_report(rows: &[Row], project_name: &str, generated_on: &str) -> PdfReport {
    let sections = rows
        .iter()
        .map(|row| EntrySection {
            heading: format!("Entry #{} - {}", row.srno, row.part_name),
            op_number: row.op_number.clone(),
            responsibility: row.responsibility.clone(),
            status: row.status.as_str().to_uppercase(),
            observation: row.observation.clone(),
            action_plan: row.action_plan.clone(),
            remarks: row.remarks.clone(),
            before_photo: row.before_photo.remote_url().map(str::to_string),
            after_photo: row.after_photo.remote_url().map(str::to_string),
        })
        .collect();

    PdfReport {
        title: REPORT_TITLE,
        project_name: project_name.to_string(),
        generated_on: generated_on.to_string(),
        summary: Summary::of(rows),
        sections,
    }
}

/// 単語単位で折り返し。1語が長すぎる場合は文字単位で分割
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
