//! プロセス内リモートストア
//!
//! テスト・オフライン確認用。呼び出し回数の記録と障害注入ができる。

use super::RemoteStore;
use crate::error::{ObserverError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use observer_common::{EntryRecord, NewProject, Project};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const PUBLIC_URL_BASE: &str = "memory://project-images";

#[derive(Debug, Clone)]
struct StoredEntry {
    record: EntryRecord,
    /// 作成順（同一時刻の並び替え用）
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: Vec<Project>,
    entries: Vec<StoredEntry>,
    blobs: HashMap<String, Vec<u8>>,
    next_seq: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
    select_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fail_select: AtomicBool,
    fail_upsert: AtomicBool,
    fail_upload: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出しに遅延を入れる（中断点を作る）
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_select(&self, fail: bool) {
        self.fail_select.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    /// 保存済みの行（作成日時の降順）
    pub fn entries(&self, project_id: &str) -> Vec<EntryRecord> {
        let state = self.lock();
        sorted_entries(&state, project_id)
    }

    pub fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(path).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn sorted_entries(state: &MemoryState, project_id: &str) -> Vec<EntryRecord> {
    let mut entries: Vec<&StoredEntry> = state
        .entries
        .iter()
        .filter(|e| e.record.project_id == project_id)
        .collect();
    entries.sort_by(|a, b| {
        b.record
            .created_at
            .cmp(&a.record.created_at)
            .then_with(|| b.seq.cmp(&a.seq))
    });
    entries.into_iter().map(|e| e.record.clone()).collect()
}

fn unavailable(op: &str) -> ObserverError {
    ObserverError::Remote(format!("{}: store unavailable", op))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, project_id: &str) -> Result<Vec<EntryRecord>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(unavailable("select"));
        }
        Ok(self.entries(project_id))
    }

    async fn upsert(&self, records: &[EntryRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(unavailable("upsert"));
        }

        let mut state = self.lock();

        // 全件検証してから適用する
        for record in records {
            if record.id.is_empty() {
                return Err(ObserverError::RemoteStatus {
                    status: 400,
                    body: "id must not be empty".into(),
                });
            }
            if record.project_id.is_empty() {
                return Err(ObserverError::RemoteStatus {
                    status: 400,
                    body: format!("project_id missing for {}", record.id),
                });
            }
        }

        let now = Utc::now();
        for record in records {
            match state.entries.iter_mut().find(|e| e.record.id == record.id) {
                Some(existing) => {
                    let created_at = existing.record.created_at;
                    existing.record = EntryRecord {
                        created_at,
                        ..record.clone()
                    };
                }
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.entries.push(StoredEntry {
                        record: EntryRecord {
                            created_at: Some(now),
                            ..record.clone()
                        },
                        seq,
                    });
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.simulate_latency().await;
        self.lock().entries.retain(|e| e.record.id != id);
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ObserverError::Upload(format!("{}: store unavailable", path)));
        }
        self.lock().blobs.insert(path.to_string(), bytes);
        Ok(format!("{}/{}", PUBLIC_URL_BASE, path))
    }

    async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        self.simulate_latency().await;
        let now: DateTime<Utc> = Utc::now();
        let created = Project {
            id: uuid::Uuid::now_v7().to_string(),
            name: project.name.clone(),
            description: project.description.clone(),
            password_hash: project.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        self.lock().projects.push(created.clone());
        Ok(created)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.simulate_latency().await;
        let mut projects = self.lock().projects.clone();
        projects.reverse();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.simulate_latency().await;
        Ok(self.lock().projects.iter().find(|p| p.id == id).cloned())
    }

    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<Project> {
        self.simulate_latency().await;
        let mut state = self.lock();
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ObserverError::ProjectNotFound(id.to_string()))?;
        project.password_hash = password_hash.to_string();
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.projects.retain(|p| p.id != id);
        // entries は project_id で連鎖削除
        state.entries.retain(|e| e.record.project_id != id);
        Ok(())
    }
}
