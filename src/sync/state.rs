use crate::config::Config;
use std::time::Duration;

/// 同期エンジンの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// 編集内容をローカルキャッシュへ反映する
    #[default]
    Idle,
    /// リモートから読込中（読込後の静穏期間を含む）
    LoadingFromRemote,
    SyncingToRemote,
    /// 同期後の再読込が落ち着くまでの待機
    SyncCooldown,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::LoadingFromRemote => "loading",
            SyncState::SyncingToRemote => "syncing",
            SyncState::SyncCooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// エラーではない同期結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { count: usize },
    /// キャッシュが空（リモートには接続しない）
    NothingToSync,
    /// 別の同期が実行中
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub load_quiet_period: Duration,
    pub sync_cooldown: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            load_quiet_period: Duration::from_secs(2),
            sync_cooldown: Duration::from_secs(5),
        }
    }
}

impl SyncTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            load_quiet_period: config.load_quiet_period(),
            sync_cooldown: config.sync_cooldown(),
        }
    }
}
