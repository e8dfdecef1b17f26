use clap::{Parser, Subcommand};
use observer_common::{PhotoSide, RowField, StatusFilter, SuggestField};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "observer")]
#[command(about = "観察記録の入力・同期・PDF/Excel/CSV出力ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 対象プロジェクトID（省略時は最後に開いたプロジェクト）
    #[arg(short, long, global = true, env = "OBSERVER_PROJECT")]
    pub project: Option<String>,

    /// プロジェクトのパスワード
    #[arg(long, global = true, env = "OBSERVER_PROJECT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// 終了時の自動同期を行わない（ローカルキャッシュに保持）
    #[arg(long, global = true)]
    pub keep_local: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// プロジェクト管理
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },

    /// 行を追加
    Add {
        #[arg(long)]
        srno: Option<String>,
        #[arg(long)]
        part: Option<String>,
        #[arg(long)]
        op: Option<String>,
        #[arg(long)]
        observation: Option<String>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        responsibility: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
        /// pending/completed
        #[arg(long)]
        status: Option<String>,
    },

    /// 行の1項目を書き換える
    Set {
        /// 行ID
        id: String,
        /// 項目 (srno/partName/opNumber/observation/actionPlan/responsibility/remarks/status)
        field: RowField,
        value: String,
    },

    /// 行を削除
    Remove {
        id: String,
        /// リモートストアからも削除
        #[arg(long)]
        remote: bool,
    },

    /// 行を並べ替える（0始まりの位置）
    Move { from: usize, to: usize },

    /// 1行だけをリモートへ保存
    SaveRow { id: String },

    /// 写真を添付
    Photo {
        id: String,
        /// before/after
        side: PhotoSide,
        file: PathBuf,
    },

    /// 行を一覧表示
    List {
        /// 検索語（SR No・部品名・観察・施策・担当・備考）
        #[arg(short, long, default_value = "")]
        search: String,

        /// all/pending/completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// 担当で絞り込み（all で全件）
        #[arg(long)]
        responsibility: Option<String>,
    },

    /// ローカルキャッシュをリモートへ同期
    Sync,

    /// 同期状態と集計を表示
    Status,

    /// 全行とローカルキャッシュを消去
    Clear,

    /// スプレッドシートから行を取込
    Import {
        /// .xlsx/.xls/.ods ファイル
        file: PathBuf,
    },

    /// 取込用テンプレートを出力
    Template {
        #[arg(short, long, default_value = "observation_template.xlsx")]
        output: PathBuf,
    },

    /// PDF/Excel/CSVを出力
    Export {
        /// 出力形式 (pdf/excel/csv/all)
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// PDF画像品質 (high/medium/low)
        #[arg(long, default_value = "medium")]
        pdf_quality: PdfQuality,
    },

    /// 入力候補を表示
    Suggest {
        /// partName/opNumber/observation/actionPlan/responsibility/remarks
        field: SuggestField,
        #[arg(default_value = "")]
        query: String,
    },

    /// 設定を表示/編集
    Config {
        /// リモートストアのURLを設定
        #[arg(long)]
        set_remote_url: Option<String>,

        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 共通パスワードを設定（空文字で解除）
        #[arg(long)]
        set_master_password: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// プロジェクトを作成（--password 必須）
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// プロジェクト一覧
    List,
    /// プロジェクトを開いて既定にする
    Open { id: String },
    /// プロジェクトを削除
    Delete { id: String },
    /// パスワードを変更（--password に現在のパスワード）
    Passwd {
        id: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Excel,
    Csv,
    All,
}

impl ExportFormat {
    /// 実際に出力する形式
    pub fn targets(&self) -> &'static [ExportFormat] {
        match self {
            ExportFormat::Pdf => &[ExportFormat::Pdf],
            ExportFormat::Excel => &[ExportFormat::Excel],
            ExportFormat::Csv => &[ExportFormat::Csv],
            ExportFormat::All => &[ExportFormat::Pdf, ExportFormat::Excel, ExportFormat::Csv],
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::All => "",
        }
    }

    /// 写真を含まない表形式を出力するか
    pub fn is_tabular(&self) -> bool {
        !matches!(self, ExportFormat::Pdf)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "csv" => Ok(ExportFormat::Csv),
            "all" => Ok(ExportFormat::All),
            _ => Err(format!("Unknown format: {}. Use pdf, excel, csv, or all", s)),
        }
    }
}

/// PDF画像品質設定
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PdfQuality {
    /// 高品質: 1400px, 85%
    High,
    /// 中品質: 800px, 75%（デフォルト）
    #[default]
    Medium,
    /// 低品質: 500px, 60%
    Low,
}

impl PdfQuality {
    /// 最大ピクセル幅
    pub fn max_width(&self) -> u32 {
        match self {
            PdfQuality::High => 1400,
            PdfQuality::Medium => 800,
            PdfQuality::Low => 500,
        }
    }

    /// JPEG品質 (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            PdfQuality::High => 85,
            PdfQuality::Medium => 75,
            PdfQuality::Low => 60,
        }
    }
}

impl std::str::FromStr for PdfQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Ok(PdfQuality::High),
            "medium" | "med" | "m" => Ok(PdfQuality::Medium),
            "low" | "l" => Ok(PdfQuality::Low),
            _ => Err(format!("Unknown quality: {}. Use high, medium, or low", s)),
        }
    }
}

impl std::fmt::Display for PdfQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfQuality::High => write!(f, "high"),
            PdfQuality::Medium => write!(f, "medium"),
            PdfQuality::Low => write!(f, "low"),
        }
    }
}
