//! 検索・絞り込み
//!
//! 表示用の派生ビュー。副作用なし。

use crate::types::{Row, Status};

/// ステータス絞り込み
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl std::str::FromStr for StatusFilter {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            Ok(StatusFilter::Only(s.parse()?))
        }
    }
}

/// 検索語・ステータス・担当者による絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    /// 部分一致（大文字小文字を区別しない）
    pub search: String,
    pub status: StatusFilter,
    /// None は「全員」
    pub responsibility: Option<String>,
}

impl RowFilter {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_responsibility(mut self, responsibility: Option<String>) -> Self {
        // "all" は絞り込みなしと同じ
        self.responsibility = responsibility.filter(|r| !r.eq_ignore_ascii_case("all"));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.matches_search(row) && self.matches_status(row) && self.matches_responsibility(row)
    }

    pub fn apply<'a>(&self, rows: &'a [Row]) -> Vec<&'a Row> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }

    fn matches_search(&self, row: &Row) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        [
            &row.srno,
            &row.part_name,
            &row.observation,
            &row.action_plan,
            &row.responsibility,
            &row.remarks,
        ]
        .iter()
        .any(|value| value.to_lowercase().contains(&needle))
    }

    fn matches_status(&self, row: &Row) -> bool {
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => row.status == status,
        }
    }

    fn matches_responsibility(&self, row: &Row) -> bool {
        match &self.responsibility {
            None => true,
            Some(r) => &row.responsibility == r,
        }
    }
}
