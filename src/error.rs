use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("リモートストアが設定されていません。`observer config --set-remote-url URL` で設定してください")]
    MissingRemote,

    #[error("プロジェクトが選択されていません")]
    NoActiveProject,

    #[error("プロジェクトが見つかりません: {0}")]
    ProjectNotFound(String),

    #[error("行が見つかりません: {0}")]
    RowNotFound(String),

    #[error("パスワードを入力してください")]
    MissingPassword,

    #[error("パスワードが正しくありません")]
    InvalidPassword,

    #[error("保存できるデータがありません")]
    NoMeaningfulData,

    #[error("リモートストア通信エラー: {0}")]
    Remote(String),

    #[error("リモートストアがエラーを返しました ({status}): {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("写真アップロードエラー: {0}")]
    Upload(String),

    #[error("取込エラー: {0}")]
    Import(String),

    #[error("PDF生成エラー: {0}")]
    PdfGeneration(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] observer_common::Error),
}

impl ObserverError {
    /// 再試行で回復しうる通信系のエラーか
    pub fn is_transient(&self) -> bool {
        match self {
            ObserverError::Remote(_) | ObserverError::Http(_) => true,
            ObserverError::RemoteStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ObserverError>;
