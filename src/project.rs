//! プロジェクトの作成・一覧・パスワード確認

use crate::error::{ObserverError, Result};
use crate::remote::RemoteStore;
use observer_common::{NewProject, Project};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// パスワードのハッシュ（SHA-256 の16進表記）
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub struct ProjectService {
    remote: Arc<dyn RemoteStore>,
    master_password: Option<String>,
}

impl ProjectService {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            master_password: None,
        }
    }

    /// 全プロジェクト共通で受け付けるパスワード
    pub fn with_master_password(mut self, password: Option<String>) -> Self {
        self.master_password = password.filter(|p| !p.is_empty());
        self
    }

    pub async fn create(&self, name: &str, description: &str, password: &str) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ObserverError::Config("プロジェクト名を入力してください".into()));
        }
        if password.is_empty() {
            return Err(ObserverError::MissingPassword);
        }
        let project = self
            .remote
            .insert_project(&NewProject {
                name: name.to_string(),
                description: description.trim().to_string(),
                password_hash: hash_password(password),
            })
            .await?;
        info!(id = %project.id, name = %project.name, "プロジェクトを作成");
        Ok(project)
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        self.remote.list_projects().await
    }

    /// パスワードを確認してプロジェクトを返す
    pub async fn open(&self, id: &str, password: &str) -> Result<Project> {
        if password.is_empty() {
            return Err(ObserverError::MissingPassword);
        }
        let project = self
            .remote
            .get_project(id)
            .await?
            .ok_or_else(|| ObserverError::ProjectNotFound(id.to_string()))?;
        if self.verify(&project, password) {
            Ok(project)
        } else {
            Err(ObserverError::InvalidPassword)
        }
    }

    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> Result<Project> {
        if new.is_empty() {
            return Err(ObserverError::MissingPassword);
        }
        self.open(id, current).await?;
        self.remote.update_password_hash(id, &hash_password(new)).await
    }

    pub async fn delete(&self, id: &str, password: &str) -> Result<()> {
        let project = self.open(id, password).await?;
        self.remote.delete_project(&project.id).await?;
        info!(id, "プロジェクトを削除");
        Ok(())
    }

    fn verify(&self, project: &Project, password: &str) -> bool {
        if self.master_password.as_deref() == Some(password) {
            return true;
        }
        project.password_hash == hash_password(password)
    }
}
