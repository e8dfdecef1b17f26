//! Observer Common Library
//!
//! 同期エンジン・CLI・エクスポートで共有される型と純粋関数

pub mod types;
pub mod layout;
pub mod error;
pub mod filter;
pub mod suggest;
pub mod summary;
pub mod export;

pub use types::{EntryRecord, NewProject, PhotoSide, PhotoSlot, Project, Row, RowField, Status};
pub use filter::{RowFilter, StatusFilter};
pub use suggest::{SuggestField, Suggestions};
pub use summary::Summary;
pub use error::{Error, Result};
