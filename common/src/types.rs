//! 観察記録の型定義
//!
//! - Row: 編集中の1行（画面・ローカルキャッシュで使用）
//! - EntryRecord: リモートストアの entries テーブル形式
//! - Project: 行をまとめるパスワード付きコンテナ

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 行の進捗ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" | "complete" | "done" => Ok(Status::Completed),
            _ => Err(Error::InvalidValue {
                field: "status".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 写真スロットの状態
///
/// プレビュー用のローカル参照と、アップロード完了後のURLを1つのフィールドで表す。
/// 永続化されるのは `Remote` のURLのみ。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "ref", rename_all = "camelCase")]
pub enum PhotoSlot {
    #[default]
    Empty,
    /// ローカルのみ（アップロード失敗、再選択待ち）
    Local(String),
    /// アップロード中
    Uploading(String),
    /// アップロード済みの公開URL
    Remote(String),
}

impl PhotoSlot {
    /// 永続化される公開URL
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            PhotoSlot::Remote(url) if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    /// 表示用の参照（ローカル参照またはURL）
    pub fn preview(&self) -> Option<&str> {
        match self {
            PhotoSlot::Empty => None,
            PhotoSlot::Local(r) | PhotoSlot::Uploading(r) | PhotoSlot::Remote(r) => {
                if r.is_empty() { None } else { Some(r) }
            }
        }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, PhotoSlot::Uploading(_))
    }

    fn from_url(url: Option<String>) -> Self {
        match url {
            Some(u) if !u.is_empty() => PhotoSlot::Remote(u),
            _ => PhotoSlot::Empty,
        }
    }
}

/// 写真の種類（施策前/施策後）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoSide {
    Before,
    After,
}

impl PhotoSide {
    /// ストレージ上のフォルダ名
    pub fn folder(&self) -> &'static str {
        match self {
            PhotoSide::Before => "before",
            PhotoSide::After => "after",
        }
    }
}

impl std::str::FromStr for PhotoSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "before" | "b" => Ok(PhotoSide::Before),
            "after" | "a" => Ok(PhotoSide::After),
            _ => Err(Error::InvalidValue {
                field: "photo side".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// 編集可能なテキスト項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowField {
    Srno,
    PartName,
    OpNumber,
    Observation,
    ActionPlan,
    Responsibility,
    Remarks,
    Status,
}

impl RowField {
    pub const ALL: [RowField; 8] = [
        RowField::Srno,
        RowField::PartName,
        RowField::OpNumber,
        RowField::Observation,
        RowField::ActionPlan,
        RowField::Responsibility,
        RowField::Remarks,
        RowField::Status,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RowField::Srno => "srno",
            RowField::PartName => "partName",
            RowField::OpNumber => "opNumber",
            RowField::Observation => "observation",
            RowField::ActionPlan => "actionPlan",
            RowField::Responsibility => "responsibility",
            RowField::Remarks => "remarks",
            RowField::Status => "status",
        }
    }
}

impl std::str::FromStr for RowField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // partName / part_name / part-name を同一視
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "srno" | "sr" => Ok(RowField::Srno),
            "partname" | "part" => Ok(RowField::PartName),
            "opnumber" | "op" => Ok(RowField::OpNumber),
            "observation" => Ok(RowField::Observation),
            "actionplan" | "action" => Ok(RowField::ActionPlan),
            "responsibility" | "owner" => Ok(RowField::Responsibility),
            "remarks" | "remark" => Ok(RowField::Remarks),
            "status" => Ok(RowField::Status),
            _ => Err(Error::UnknownField(s.to_string())),
        }
    }
}

/// 観察記録の1行
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Row {
    /// 識別子（割り当て後は不変）
    pub id: String,
    pub srno: String,
    pub part_name: String,
    pub op_number: String,
    pub observation: String,
    pub before_photo: PhotoSlot,
    pub after_photo: PhotoSlot,
    pub action_plan: String,
    pub responsibility: String,
    pub remarks: String,
    pub status: Status,
}

impl Row {
    /// 空の行（ステータスは pending）
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// 保存対象となる「意味のある」行か
    ///
    /// 写真は公開URLが確定しているもののみ数える。
    pub fn is_meaningful(&self) -> bool {
        !self.srno.is_empty()
            || !self.part_name.is_empty()
            || !self.observation.is_empty()
            || !self.action_plan.is_empty()
            || !self.responsibility.is_empty()
            || !self.remarks.is_empty()
            || self.before_photo.remote_url().is_some()
            || self.after_photo.remote_url().is_some()
    }

    /// エクスポート対象の行か（SR No・部品名・観察のいずれかが入力済み）
    pub fn is_exportable(&self) -> bool {
        !self.srno.is_empty() || !self.part_name.is_empty() || !self.observation.is_empty()
    }

    pub fn text(&self, field: RowField) -> &str {
        match field {
            RowField::Srno => &self.srno,
            RowField::PartName => &self.part_name,
            RowField::OpNumber => &self.op_number,
            RowField::Observation => &self.observation,
            RowField::ActionPlan => &self.action_plan,
            RowField::Responsibility => &self.responsibility,
            RowField::Remarks => &self.remarks,
            RowField::Status => self.status.as_str(),
        }
    }

    /// 1項目を書き換える
    pub fn set(&mut self, field: RowField, value: &str) -> Result<()> {
        let value = value.to_string();
        match field {
            RowField::Srno => self.srno = value,
            RowField::PartName => self.part_name = value,
            RowField::OpNumber => self.op_number = value,
            RowField::Observation => self.observation = value,
            RowField::ActionPlan => self.action_plan = value,
            RowField::Responsibility => self.responsibility = value,
            RowField::Remarks => self.remarks = value,
            RowField::Status => self.status = value.parse()?,
        }
        Ok(())
    }

    pub fn photo(&self, side: PhotoSide) -> &PhotoSlot {
        match side {
            PhotoSide::Before => &self.before_photo,
            PhotoSide::After => &self.after_photo,
        }
    }

    pub fn photo_mut(&mut self, side: PhotoSide) -> &mut PhotoSlot {
        match side {
            PhotoSide::Before => &mut self.before_photo,
            PhotoSide::After => &mut self.after_photo,
        }
    }
}

/// プロジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// プロジェクト作成リクエスト
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub password_hash: String,
}

/// リモートストアの entries テーブル形式
///
/// 文字列項目は null にせず空文字で送る。写真URLのみ null 可。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub srno: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub op_number: String,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub before_photo_url: Option<String>,
    #[serde(default)]
    pub after_photo_url: Option<String>,
    #[serde(default)]
    pub action_plan: String,
    #[serde(default)]
    pub responsibility: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub status: Status,
    /// サーバ側で付与される作成日時
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EntryRecord {
    /// 行をアップサート形式に変換（識別子を競合キーとして維持）
    pub fn from_row(row: &Row, project_id: &str) -> Self {
        Self {
            id: row.id.clone(),
            project_id: project_id.to_string(),
            srno: row.srno.clone(),
            part_name: row.part_name.clone(),
            op_number: row.op_number.clone(),
            observation: row.observation.clone(),
            before_photo_url: row.before_photo.remote_url().map(str::to_string),
            after_photo_url: row.after_photo.remote_url().map(str::to_string),
            action_plan: row.action_plan.clone(),
            responsibility: row.responsibility.clone(),
            remarks: row.remarks.clone(),
            status: row.status,
            created_at: None,
        }
    }

    pub fn into_row(self) -> Row {
        Row {
            id: self.id,
            srno: self.srno,
            part_name: self.part_name,
            op_number: self.op_number,
            observation: self.observation,
            before_photo: PhotoSlot::from_url(self.before_photo_url),
            after_photo: PhotoSlot::from_url(self.after_photo_url),
            action_plan: self.action_plan,
            responsibility: self.responsibility,
            remarks: self.remarks,
            status: self.status,
        }
    }
}
