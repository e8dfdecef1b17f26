//! 入力補完候補
//!
//! 既存の行から項目ごとの候補を作る。
//! 並び順は出現頻度の降順、同頻度なら辞書順。

use crate::types::Row;
use std::collections::HashMap;

/// 検索結果の最大件数
pub const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestField {
    PartName,
    OpNumber,
    Observation,
    ActionPlan,
    Responsibility,
    Remarks,
}

impl SuggestField {
    pub const ALL: [SuggestField; 6] = [
        SuggestField::PartName,
        SuggestField::OpNumber,
        SuggestField::Observation,
        SuggestField::ActionPlan,
        SuggestField::Responsibility,
        SuggestField::Remarks,
    ];

    fn value<'a>(&self, row: &'a Row) -> &'a str {
        match self {
            SuggestField::PartName => &row.part_name,
            SuggestField::OpNumber => &row.op_number,
            SuggestField::Observation => &row.observation,
            SuggestField::ActionPlan => &row.action_plan,
            SuggestField::Responsibility => &row.responsibility,
            SuggestField::Remarks => &row.remarks,
        }
    }
}

impl std::str::FromStr for SuggestField {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        use crate::types::RowField;
        match s.parse::<RowField>()? {
            RowField::PartName => Ok(SuggestField::PartName),
            RowField::OpNumber => Ok(SuggestField::OpNumber),
            RowField::Observation => Ok(SuggestField::Observation),
            RowField::ActionPlan => Ok(SuggestField::ActionPlan),
            RowField::Responsibility => Ok(SuggestField::Responsibility),
            RowField::Remarks => Ok(SuggestField::Remarks),
            _ => Err(crate::error::Error::UnknownField(s.to_string())),
        }
    }
}

/// 項目ごとの候補一覧
#[derive(Debug, Clone, Default)]
pub struct Suggestions {
    by_field: HashMap<SuggestField, Vec<String>>,
}

impl Suggestions {
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut by_field = HashMap::new();

        for field in SuggestField::ALL {
            // 小文字キー → (最初の表記, 出現数)
            let mut seen: HashMap<String, (String, usize)> = HashMap::new();
            let mut order: Vec<String> = Vec::new();

            for row in rows {
                let value = field.value(row).trim();
                if value.is_empty() {
                    continue;
                }
                let key = value.to_lowercase();
                match seen.get_mut(&key) {
                    Some(entry) => entry.1 += 1,
                    None => {
                        seen.insert(key.clone(), (value.to_string(), 1));
                        order.push(key);
                    }
                }
            }

            let mut ranked: Vec<(String, usize)> = order
                .into_iter()
                .filter_map(|key| seen.remove(&key))
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            by_field.insert(field, ranked.into_iter().map(|(v, _)| v).collect());
        }

        Self { by_field }
    }

    pub fn get(&self, field: SuggestField) -> &[String] {
        self.by_field.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 候補を検索
    ///
    /// 空クエリは先頭から最大10件。それ以外は部分一致を
    /// 完全一致 → 前方一致 → 辞書順 で並べる。
    pub fn search(&self, field: SuggestField, query: &str) -> Vec<String> {
        let candidates = self.get(field);
        let query = query.trim().to_lowercase();

        if query.is_empty() {
            return candidates.iter().take(MAX_SUGGESTIONS).cloned().collect();
        }

        let mut matches: Vec<&String> = candidates
            .iter()
            .filter(|c| c.to_lowercase().contains(&query))
            .collect();

        matches.sort_by(|a, b| {
            let a_lower = a.to_lowercase();
            let b_lower = b.to_lowercase();
            let rank = |s: &str| {
                if s == query {
                    0
                } else if s.starts_with(&query) {
                    1
                } else {
                    2
                }
            };
            rank(&a_lower).cmp(&rank(&b_lower)).then_with(|| a.cmp(b))
        });

        matches.into_iter().take(MAX_SUGGESTIONS).cloned().collect()
    }
}
