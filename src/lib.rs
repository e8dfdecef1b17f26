//! 観察記録のローカルファースト同期ライブラリ
//!
//! 行エディタ・ローカルキャッシュ・リモートストアの同期と、PDF/Excel/CSV出力。

pub mod cache;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod import;
pub mod project;
pub mod remote;
pub mod sync;

pub use error::{ObserverError, Result};
