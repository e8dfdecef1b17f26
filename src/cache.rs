//! ローカルキャッシュモジュール
//!
//! 未同期の行をJSONファイルに保持し、再起動後も復元できるようにする。
//! ファイルは1つだけで、保存のたびに丸ごと上書きされる（プロジェクト単位のスコープ付き）。
//!
//! 書き込み・読み込みの失敗は呼び出し元へ返さず、ログに残してキャッシュミスとして扱う。

use crate::error::Result;
use chrono::{DateTime, Utc};
use observer_common::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CACHE_FILE_NAME: &str = "local-cache.json";

/// キャッシュされた行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRow {
    #[serde(flatten)]
    pub row: Row,
    /// 最後にローカルで変更された日時
    pub last_modified: DateTime<Utc>,
    pub project_id: String,
}

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheSnapshot {
    entries: Vec<CachedRow>,
    project_id: Option<String>,
    last_updated: DateTime<Utc>,
}

/// ローカルキャッシュ
///
/// 1つのプロジェクトを1プロセスだけが扱う前提。複数プロセスからの同時書き込みは後勝ち。
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// ディレクトリ直下の既定ファイル名で作成
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// プロジェクトの保存内容を丸ごと置き換える
    ///
    /// 内容が変わっていない行は前回の `last_modified` を引き継ぐ。
    pub fn save(&self, rows: &[Row], project_id: &str) {
        let now = Utc::now();
        let previous: HashMap<String, CachedRow> = self
            .load(project_id)
            .into_iter()
            .map(|c| (c.row.id.clone(), c))
            .collect();

        let entries = rows
            .iter()
            .map(|row| {
                let last_modified = previous
                    .get(&row.id)
                    .filter(|c| &c.row == row)
                    .map(|c| c.last_modified)
                    .unwrap_or(now);
                CachedRow {
                    row: row.clone(),
                    last_modified,
                    project_id: project_id.to_string(),
                }
            })
            .collect();

        self.store(entries, project_id);
    }

    /// プロジェクトの保存内容を読み込む
    ///
    /// 保存されているスコープが別プロジェクトなら空。
    pub fn load(&self, project_id: &str) -> Vec<CachedRow> {
        match self.read_snapshot() {
            Ok(Some(snapshot)) if snapshot.project_id.as_deref() == Some(project_id) => {
                snapshot.entries
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ローカルキャッシュの読み込みに失敗");
                Vec::new()
            }
        }
    }

    /// 1行を追加または置き換える
    pub fn upsert_one(&self, row: &Row, project_id: &str) {
        let mut entries = self.load(project_id);
        let cached = CachedRow {
            row: row.clone(),
            last_modified: Utc::now(),
            project_id: project_id.to_string(),
        };
        match entries.iter_mut().find(|c| c.row.id == row.id) {
            Some(existing) => *existing = cached,
            None => entries.push(cached),
        }
        self.store(entries, project_id);
    }

    /// 1行を削除。削除した場合は true
    pub fn remove_one(&self, id: &str, project_id: &str) -> bool {
        let mut entries = self.load(project_id);
        let before = entries.len();
        entries.retain(|c| c.row.id != id);
        if entries.len() == before {
            return false;
        }
        self.store(entries, project_id);
        true
    }

    /// プロジェクトの保存内容を消去
    pub fn clear(&self, project_id: &str) {
        self.store(Vec::new(), project_id);
    }

    /// 未同期の行数
    pub fn unsynced_count(&self, project_id: &str) -> usize {
        self.load(project_id).len()
    }

    fn store(&self, entries: Vec<CachedRow>, project_id: &str) {
        if let Ok(Some(existing)) = self.read_snapshot() {
            if let Some(other) = existing.project_id.as_deref().filter(|p| *p != project_id) {
                if !existing.entries.is_empty() {
                    warn!(
                        previous_project = other,
                        dropped = existing.entries.len(),
                        "別プロジェクトの未同期データを上書きします"
                    );
                }
            }
        }

        let snapshot = CacheSnapshot {
            entries,
            project_id: Some(project_id.to_string()),
            last_updated: Utc::now(),
        };
        match self.write_snapshot(&snapshot) {
            Ok(()) => debug!(entries = snapshot.entries.len(), "ローカルキャッシュを保存"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "ローカルキャッシュの保存に失敗"),
        }
    }

    fn read_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    /// 一時ファイルに書いてから rename で置き換える
    fn write_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
