//! 同期エンジン
//!
//! 行エディタ・ローカルキャッシュ・リモートストアの整合を取る。
//!
//! - 状態が `Idle` のときだけ、編集内容（意味のある行）をローカルキャッシュへ反映する
//! - 読込・同期の後は一定時間 `Idle` に戻さない。その間の編集は戻った時点で反映する
//! - 状態の確認と遷移はロック内で同期的に行い、ロックを保持したまま await しない
//! - 同期の実行中フラグは読込・待機の状態とは別に持ち、`sync` だけが変更する

mod state;

pub use state::{SyncOutcome, SyncState, SyncTimings};

use crate::cache::LocalCache;
use crate::editor::RowEditor;
use crate::error::{ObserverError, Result};
use crate::remote::{blob_path, content_type_for, RemoteStore};
use chrono::Utc;
use observer_common::{EntryRecord, PhotoSide, PhotoSlot, Row, RowField, RowFilter, Suggestions, Summary};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// エンジンが使う外部資源
#[derive(Clone)]
pub struct SyncContext {
    pub cache: LocalCache,
    pub remote: Arc<dyn RemoteStore>,
}

impl SyncContext {
    pub fn new(cache: LocalCache, remote: Arc<dyn RemoteStore>) -> Self {
        Self { cache, remote }
    }
}

struct Inner {
    project_id: Option<String>,
    editor: RowEditor,
    /// 読込・待機の状態（同期中かどうかは `syncing`）
    state: SyncState,
    /// 一括アップサートから再読込までの間 true
    syncing: bool,
    /// この時刻を過ぎたら `Idle` に戻す
    settle_at: Option<Instant>,
    /// 反映が保留されている編集がある
    dirty: bool,
    unsynced: usize,
}

/// 終了前ガードの結果
pub struct UnloadGuard {
    /// 未同期の変更がある旨を利用者に警告すべきか
    pub prompt: bool,
    /// 投げっぱなしで開始した同期
    pub sync: Option<JoinHandle<Result<SyncOutcome>>>,
}

pub struct SyncEngine {
    ctx: SyncContext,
    timings: SyncTimings,
    inner: Mutex<Inner>,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext, timings: SyncTimings) -> Self {
        Self {
            ctx,
            timings,
            inner: Mutex::new(Inner {
                project_id: None,
                editor: RowEditor::new(),
                state: SyncState::Idle,
                syncing: false,
                settle_at: None,
                dirty: false,
                unsynced: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 期限切れの待機を解除し、保留中の編集を反映する
    fn settle(&self, inner: &mut Inner) {
        if let Some(at) = inner.settle_at {
            if Instant::now() >= at {
                debug!(from = %inner.state, "Idle に戻ります");
                inner.state = SyncState::Idle;
                inner.settle_at = None;
            }
        }
        if inner.dirty && Self::can_mirror(inner) {
            inner.dirty = false;
            self.mirror(inner);
        }
    }

    fn can_mirror(inner: &Inner) -> bool {
        inner.state == SyncState::Idle && !inner.syncing
    }

    /// 行の集合が変わったときの自動キャッシュ
    fn changed(&self, inner: &mut Inner) {
        if Self::can_mirror(inner) {
            self.mirror(inner);
        } else {
            inner.dirty = true;
        }
    }

    fn mirror(&self, inner: &mut Inner) {
        let Some(project_id) = inner.project_id.clone() else {
            return;
        };
        let meaningful = inner.editor.meaningful_rows();
        if meaningful.is_empty() {
            self.ctx.cache.clear(&project_id);
        } else {
            self.ctx.cache.save(&meaningful, &project_id);
        }
        inner.unsynced = meaningful.len();
    }

    fn active_project(inner: &Inner) -> Result<String> {
        inner.project_id.clone().ok_or(ObserverError::NoActiveProject)
    }

    // ---- 読み取り ----

    pub fn state(&self) -> SyncState {
        let mut inner = self.lock();
        self.settle(&mut inner);
        if inner.syncing {
            SyncState::SyncingToRemote
        } else {
            inner.state
        }
    }

    pub fn project_id(&self) -> Option<String> {
        self.lock().project_id.clone()
    }

    pub fn unsynced_count(&self) -> usize {
        let mut inner = self.lock();
        self.settle(&mut inner);
        inner.unsynced
    }

    pub fn rows(&self) -> Vec<Row> {
        self.lock().editor.rows().to_vec()
    }

    pub fn row(&self, id: &str) -> Option<Row> {
        self.lock().editor.get(id).cloned()
    }

    pub fn filtered(&self, filter: &RowFilter) -> Vec<Row> {
        self.lock().editor.filtered(filter).into_iter().cloned().collect()
    }

    pub fn summary(&self) -> Summary {
        self.lock().editor.summary()
    }

    pub fn responsibilities(&self) -> Vec<String> {
        self.lock().editor.responsibilities()
    }

    pub fn suggestions(&self) -> Suggestions {
        Suggestions::from_rows(self.lock().editor.rows())
    }

    /// エクスポート対象の行
    pub fn export_rows(&self) -> Vec<Row> {
        self.lock().editor.exportable_rows()
    }

    /// 期限切れの待機を処理する
    pub fn tick(&self) {
        let mut inner = self.lock();
        self.settle(&mut inner);
    }

    /// `Idle` に戻るまで待つ
    pub async fn wait_settled(&self) {
        loop {
            let deadline = {
                let mut inner = self.lock();
                self.settle(&mut inner);
                inner.settle_at
            };
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => break,
            }
        }
    }

    // ---- 編集 ----

    pub fn add_row(&self) -> String {
        let mut inner = self.lock();
        self.settle(&mut inner);
        let id = inner.editor.add();
        self.changed(&mut inner);
        id
    }

    pub fn update_row(&self, id: &str, field: RowField, value: &str) -> Result<()> {
        let mut inner = self.lock();
        self.settle(&mut inner);
        inner.editor.update(id, field, value)?;
        self.changed(&mut inner);
        Ok(())
    }

    /// 行を削除し、キャッシュからも取り除く（無くても失敗しない）
    pub fn delete_row(&self, id: &str) -> bool {
        let mut inner = self.lock();
        self.settle(&mut inner);
        let removed = inner.editor.delete(id);
        if let Some(project_id) = inner.project_id.clone() {
            if self.ctx.cache.remove_one(id, &project_id) {
                inner.unsynced = inner.unsynced.saturating_sub(1);
            }
        }
        if removed {
            self.changed(&mut inner);
        }
        removed
    }

    pub fn reorder(&self, from: usize, to: usize) -> bool {
        let mut inner = self.lock();
        self.settle(&mut inner);
        let moved = inner.editor.reorder(from, to);
        if moved && from != to {
            self.changed(&mut inner);
        }
        moved
    }

    /// 取込結果を追加
    pub fn import_rows(&self, rows: Vec<Row>) -> usize {
        let mut inner = self.lock();
        self.settle(&mut inner);
        let count = inner.editor.append_imported(rows);
        if count > 0 {
            self.changed(&mut inner);
        }
        count
    }

    /// 全行とキャッシュを消去
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        self.settle(&mut inner);
        inner.editor.clear_all();
        if let Some(project_id) = inner.project_id.clone() {
            self.ctx.cache.clear(&project_id);
        }
        inner.unsynced = 0;
        inner.dirty = false;
    }

    // ---- リモート ----

    /// プロジェクトを開く
    ///
    /// リモートの行を読み込み、キャッシュに残る未同期の行を重ねる。
    /// 読込に失敗してもキャッシュの行は復元し、エラーを返す。
    pub async fn activate(&self, project_id: &str) -> Result<usize> {
        {
            let mut inner = self.lock();
            inner.project_id = Some(project_id.to_string());
            inner.editor = RowEditor::new();
            inner.state = SyncState::LoadingFromRemote;
            inner.settle_at = None;
            inner.dirty = false;
            inner.unsynced = self.ctx.cache.unsynced_count(project_id);
        }

        let result = self
            .ctx
            .remote
            .select(project_id)
            .instrument(info_span!("load", project_id))
            .await;

        let mut inner = self.lock();
        if inner.project_id.as_deref() != Some(project_id) {
            // 読込中に別プロジェクトへ切り替わった
            return result.map(|records| records.len());
        }
        let loaded = Self::apply_remote(&mut inner, result);

        let cached: Vec<Row> = self
            .ctx
            .cache
            .load(project_id)
            .into_iter()
            .map(|c| c.row)
            .collect();
        if !cached.is_empty() {
            info!(count = cached.len(), "未同期の行をローカルキャッシュから復元");
            inner.editor.overlay(cached);
        }

        inner.dirty = false;
        inner.settle_at = Some(Instant::now() + self.timings.load_quiet_period);
        loaded
    }

    fn apply_remote(inner: &mut Inner, result: Result<Vec<EntryRecord>>) -> Result<usize> {
        match result {
            Ok(records) => {
                let count = records.len();
                if count > 0 {
                    inner
                        .editor
                        .replace_all(records.into_iter().map(EntryRecord::into_row).collect());
                }
                debug!(count, "リモートの行を反映");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "リモートからの読込に失敗");
                Err(e)
            }
        }
    }

    /// キャッシュの行をまとめてリモートへ送る
    ///
    /// 実行中に呼ばれた場合は何もせず `InProgress` を返す。
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let (project_id, rows) = {
            let mut inner = self.lock();
            self.settle(&mut inner);
            if inner.syncing {
                info!("同期中のため要求を拒否");
                return Ok(SyncOutcome::InProgress);
            }
            let project_id = Self::active_project(&inner)?;
            let cached = self.ctx.cache.load(&project_id);
            if cached.is_empty() {
                return Ok(SyncOutcome::NothingToSync);
            }
            let rows: Vec<Row> = cached
                .into_iter()
                .map(|c| c.row)
                .filter(Row::is_meaningful)
                .collect();
            if rows.is_empty() {
                return Err(ObserverError::NoMeaningfulData);
            }
            inner.syncing = true;
            (project_id, rows)
        };

        let records: Vec<EntryRecord> = rows
            .iter()
            .map(|row| EntryRecord::from_row(row, &project_id))
            .collect();
        let count = records.len();
        let span = info_span!("sync", project_id = %project_id, count);

        if let Err(e) = self.ctx.remote.upsert(&records).instrument(span.clone()).await {
            let mut inner = self.lock();
            inner.syncing = false;
            // 同期中に保留した編集をキャッシュへ反映する
            self.settle(&mut inner);
            warn!(error = %e, "同期に失敗。ローカルキャッシュは保持します");
            return Err(e);
        }

        // 同期中に別プロジェクトへ切り替わっていたら、そちらのキャッシュは消さない
        if !self.ctx.cache.load(&project_id).is_empty() {
            self.ctx.cache.clear(&project_id);
        }
        info!(count, "同期が完了");

        let reload = self
            .ctx
            .remote
            .select(&project_id)
            .instrument(span)
            .await;

        let mut inner = self.lock();
        inner.syncing = false;
        if inner.project_id.as_deref() == Some(project_id.as_str()) {
            // 再読込の失敗は同期結果に影響しない
            let _ = Self::apply_remote(&mut inner, reload);
            inner.unsynced = 0;
            inner.dirty = false;
            inner.state = SyncState::SyncCooldown;
            inner.settle_at = Some(Instant::now() + self.timings.sync_cooldown);
        }
        Ok(SyncOutcome::Synced { count })
    }

    /// 1行だけをリモートへ直接保存
    pub async fn save_row(&self, id: &str) -> Result<()> {
        let (project_id, record) = {
            let mut inner = self.lock();
            self.settle(&mut inner);
            let project_id = Self::active_project(&inner)?;
            let row = inner
                .editor
                .get(id)
                .ok_or_else(|| ObserverError::RowNotFound(id.to_string()))?;
            if !row.is_meaningful() {
                return Err(ObserverError::NoMeaningfulData);
            }
            let record = EntryRecord::from_row(row, &project_id);
            (project_id, record)
        };

        self.ctx
            .remote
            .upsert(std::slice::from_ref(&record))
            .instrument(info_span!("save_row", id))
            .await?;

        let mut inner = self.lock();
        if self.ctx.cache.remove_one(id, &project_id) {
            inner.unsynced = inner.unsynced.saturating_sub(1);
        }
        debug!(id, "行を保存");
        Ok(())
    }

    /// 行を削除し、リモートからも削除する
    pub async fn purge_row(&self, id: &str) -> Result<bool> {
        let removed = self.delete_row(id);
        self.ctx.remote.delete(id).await?;
        Ok(removed)
    }

    /// 写真を添付してアップロード
    ///
    /// アップロード中は `Uploading`、成功で `Remote`、失敗で `Local` になる。
    pub async fn attach_photo(&self, id: &str, side: PhotoSide, file: &Path) -> Result<String> {
        let local = file.display().to_string();
        let project_id = {
            let mut inner = self.lock();
            self.settle(&mut inner);
            let project_id = Self::active_project(&inner)?;
            inner
                .editor
                .set_photo(id, side, PhotoSlot::Uploading(local.clone()))?;
            self.changed(&mut inner);
            project_id
        };

        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_lowercase();
        let path = blob_path(&project_id, side, Utc::now().timestamp_millis(), &ext);

        let result = async {
            let bytes = tokio::fs::read(file).await?;
            self.ctx
                .remote
                .upload_blob(&path, bytes, content_type_for(&ext))
                .await
        }
        .instrument(info_span!("upload", path = %path))
        .await;

        let mut inner = self.lock();
        let slot = match &result {
            Ok(url) => PhotoSlot::Remote(url.clone()),
            Err(e) => {
                warn!(error = %e, "写真のアップロードに失敗");
                PhotoSlot::Local(local.clone())
            }
        };
        if inner.editor.resolve_upload(id, side, &local, slot) {
            self.changed(&mut inner);
        }
        result
    }

    /// 終了前ガード
    ///
    /// 未同期の行があれば同期を開始し、警告すべきことを返す。
    /// tokio ランタイム内から呼ぶこと。
    pub fn before_unload(self: &Arc<Self>) -> UnloadGuard {
        let unsynced = self.unsynced_count();
        if unsynced == 0 {
            return UnloadGuard {
                prompt: false,
                sync: None,
            };
        }
        info!(unsynced, "未同期の行があるため終了前に同期を試みます");
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.sync().await });
        UnloadGuard {
            prompt: true,
            sync: Some(handle),
        }
    }
}
