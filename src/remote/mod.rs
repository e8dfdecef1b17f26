//! リモートストア
//!
//! 行・プロジェクトのCRUDと写真アップロードの契約。
//! `upsert` は1回の呼び出し単位で全件適用か全件不適用のどちらか。

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::error::Result;
use async_trait::async_trait;
use observer_common::{EntryRecord, NewProject, PhotoSide, Project};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// プロジェクトの全行（作成日時の降順）
    async fn select(&self, project_id: &str) -> Result<Vec<EntryRecord>>;

    /// 識別子を競合キーとしたアップサート
    async fn upsert(&self, records: &[EntryRecord]) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// バイナリを保存して公開URLを返す
    async fn upload_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn insert_project(&self, project: &NewProject) -> Result<Project>;

    /// 全プロジェクト（作成日時の降順）
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<Project>;

    async fn delete_project(&self, id: &str) -> Result<()>;
}

/// 写真の保存パス `{projectId}/{before|after}/{timestamp}.{ext}`
pub fn blob_path(project_id: &str, side: PhotoSide, timestamp_ms: i64, ext: &str) -> String {
    format!("{}/{}/{}.{}", project_id, side.folder(), timestamp_ms, ext.to_lowercase())
}

/// 拡張子からContent-Typeを推定
pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
