//! 行エディタ
//!
//! 画面に表示する行の順序付き集合。常に1行以上（空のプレースホルダ）を保持する。
//! 永続化は行わず、キャッシュへの反映は同期エンジンが担当する。

use crate::error::{ObserverError, Result};
use observer_common::{PhotoSide, PhotoSlot, Row, RowField, RowFilter, Summary};

/// 時刻順に並ぶ一意な識別子（タブ・プロセス間でも衝突しない）
pub fn new_row_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[derive(Debug, Clone)]
pub struct RowEditor {
    rows: Vec<Row>,
}

impl Default for RowEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RowEditor {
    /// プレースホルダ1行で開始
    pub fn new() -> Self {
        Self {
            rows: vec![Row::new(new_row_id())],
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Row> {
        self.rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ObserverError::RowNotFound(id.to_string()))
    }

    /// 新しい行を末尾に追加し、その識別子を返す
    pub fn add(&mut self) -> String {
        let id = new_row_id();
        self.rows.push(Row::new(id.clone()));
        id
    }

    /// 1項目だけを書き換える
    pub fn update(&mut self, id: &str, field: RowField, value: &str) -> Result<()> {
        self.get_mut(id)?.set(field, value)?;
        Ok(())
    }

    pub fn set_photo(&mut self, id: &str, side: PhotoSide, slot: PhotoSlot) -> Result<()> {
        *self.get_mut(id)?.photo_mut(side) = slot;
        Ok(())
    }

    /// アップロード完了時の反映
    ///
    /// スロットがまだ同じローカル参照のアップロード中である場合のみ置き換える。
    pub fn resolve_upload(&mut self, id: &str, side: PhotoSide, local: &str, slot: PhotoSlot) -> bool {
        match self.rows.iter_mut().find(|r| r.id == id) {
            Some(row) if matches!(row.photo(side), PhotoSlot::Uploading(r) if r == local) => {
                *row.photo_mut(side) = slot;
                true
            }
            _ => false,
        }
    }

    /// 行を削除。最後の1行を消した場合はプレースホルダを補う
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        let removed = self.rows.len() != before;
        self.ensure_placeholder();
        removed
    }

    /// `from` の行を `to` の位置へ移動
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.rows.len() || to >= self.rows.len() {
            return false;
        }
        if from != to {
            let row = self.rows.remove(from);
            self.rows.insert(to, row);
        }
        true
    }

    pub fn filtered(&self, filter: &RowFilter) -> Vec<&Row> {
        filter.apply(&self.rows)
    }

    /// 保存対象の行
    pub fn meaningful_rows(&self) -> Vec<Row> {
        self.rows.iter().filter(|r| r.is_meaningful()).cloned().collect()
    }

    /// エクスポート対象の行
    pub fn exportable_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .filter(|r| r.is_meaningful() && r.is_exportable())
            .cloned()
            .collect()
    }

    /// 全行を置き換える（リモートからの読込）
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        self.ensure_placeholder();
    }

    /// キャッシュから復元した行を重ねる
    ///
    /// 同じ識別子の行は置き換え、それ以外は末尾に追加する。
    pub fn overlay(&mut self, rows: Vec<Row>) {
        if rows.is_empty() {
            return;
        }
        // プレースホルダだけなら捨てる
        self.rows.retain(|r| r.is_meaningful());
        for row in rows {
            match self.rows.iter_mut().find(|r| r.id == row.id) {
                Some(existing) => *existing = row,
                None => self.rows.push(row),
            }
        }
        self.ensure_placeholder();
    }

    /// 取込結果を追加。空のプレースホルダは取り除く
    pub fn append_imported(&mut self, rows: Vec<Row>) -> usize {
        let count = rows.len();
        if count == 0 {
            return 0;
        }
        self.rows.retain(|r| r.is_meaningful());
        self.rows.extend(rows);
        self.ensure_placeholder();
        count
    }

    /// 全行を消去してプレースホルダ1行に戻す
    pub fn clear_all(&mut self) {
        self.rows = vec![Row::new(new_row_id())];
    }

    /// 担当者の一覧（重複・空を除いた出現順）
    pub fn responsibilities(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for row in &self.rows {
            let value = row.responsibility.trim();
            if !value.is_empty() && !seen.iter().any(|s| s == value) {
                seen.push(value.to_string());
            }
        }
        seen
    }

    pub fn summary(&self) -> Summary {
        Summary::of(self.rows.iter().filter(|r| r.is_meaningful()))
    }

    fn ensure_placeholder(&mut self) {
        if self.rows.is_empty() {
            self.rows.push(Row::new(new_row_id()));
        }
    }
}
