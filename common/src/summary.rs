//! 行集合の集計

use crate::types::{Row, Status};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub with_photos: usize,
    pub with_action_plans: usize,
    pub with_remarks: usize,
    pub completed: usize,
    pub pending: usize,
}

impl Summary {
    pub fn of<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Self {
        let mut summary = Summary::default();
        for row in rows {
            summary.total += 1;
            if row.before_photo.preview().is_some() || row.after_photo.preview().is_some() {
                summary.with_photos += 1;
            }
            if !row.action_plan.is_empty() {
                summary.with_action_plans += 1;
            }
            if !row.remarks.is_empty() {
                summary.with_remarks += 1;
            }
            match row.status {
                Status::Completed => summary.completed += 1,
                Status::Pending => summary.pending += 1,
            }
        }
        summary
    }
}
