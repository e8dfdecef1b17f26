//! PostgREST互換のリモートストアクライアント
//!
//! テーブル: `entries` / `projects`、写真はストレージバケットに保存する。

use super::RemoteStore;
use crate::config::Config;
use crate::error::{ObserverError, Result};
use async_trait::async_trait;
use observer_common::{EntryRecord, NewProject, Project};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    bucket: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: Option<String>, bucket: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("observer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket: bucket.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.remote_url()?, config.api_key(), &config.photo_bucket)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    /// アップロード済みオブジェクトの公開URL
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        request
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ObserverError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }

    async fn insert_returning<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<Project> {
        let request = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let mut rows: Vec<Project> = self.send_json(request).await?;
        rows.pop()
            .ok_or_else(|| ObserverError::Remote(format!("{}: 作成結果が空です", table)))
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, project_id: &str) -> Result<Vec<EntryRecord>> {
        let request = self
            .request(Method::GET, &self.table_url("entries"))
            .query(&[
                ("select", "*".to_string()),
                ("project_id", format!("eq.{}", project_id)),
                ("order", "created_at.desc".to_string()),
            ]);
        let records: Vec<EntryRecord> = self.send_json(request).await?;
        debug!(project_id, count = records.len(), "entries を取得");
        Ok(records)
    }

    async fn upsert(&self, records: &[EntryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::POST, &self.table_url("entries"))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);
        self.send(request).await?;
        debug!(count = records.len(), "entries をアップサート");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.table_url("entries"))
            .query(&[("id", format!("eq.{}", id))]);
        self.send(request).await?;
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let request = self
            .request(Method::POST, &self.object_url(path))
            .header(header::CONTENT_TYPE, content_type)
            .header("cache-control", "3600")
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request)
            .await
            .map_err(|e| ObserverError::Upload(format!("{}: {}", path, e)))?;
        Ok(self.public_url(path))
    }

    async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        self.insert_returning("projects", project).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let request = self
            .request(Method::GET, &self.table_url("projects"))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.send_json(request).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let request = self
            .request(Method::GET, &self.table_url("projects"))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        let mut rows: Vec<Project> = self.send_json(request).await?;
        Ok(rows.pop())
    }

    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<Project> {
        let body = serde_json::json!({
            "password_hash": password_hash,
            "updated_at": chrono::Utc::now(),
        });
        let request = self
            .request(Method::PATCH, &self.table_url("projects"))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body);
        let mut rows: Vec<Project> = self.send_json(request).await?;
        rows.pop()
            .ok_or_else(|| ObserverError::ProjectNotFound(id.to_string()))
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.table_url("projects"))
            .query(&[("id", format!("eq.{}", id))]);
        self.send(request).await?;
        Ok(())
    }
}
