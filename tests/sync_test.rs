//! 同期エンジンテスト
//!
//! 自動キャッシュ・一括同期・行単位保存・静穏期間/クールダウン・終了前ガードを
//! メモリ上のリモートストアと一時ディレクトリのキャッシュで検証

use observer_common::{EntryRecord, PhotoSide, PhotoSlot, Row, RowField, Status};
use observer_sync::cache::LocalCache;
use observer_sync::error::ObserverError;
use observer_sync::project::ProjectService;
use observer_sync::remote::{MemoryStore, RemoteStore};
use observer_sync::sync::{SyncContext, SyncEngine, SyncOutcome, SyncState, SyncTimings};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const PROJECT: &str = "p1";

struct Harness {
    dir: TempDir,
    store: Arc<MemoryStore>,
    cache: LocalCache,
    engine: Arc<SyncEngine>,
}

fn harness_with(store: MemoryStore) -> Harness {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(store);
    let cache = LocalCache::in_dir(dir.path());
    let engine = engine_for(&store, &cache);
    Harness { dir, store, cache, engine }
}

fn harness() -> Harness {
    harness_with(MemoryStore::new())
}

fn engine_for(store: &Arc<MemoryStore>, cache: &LocalCache) -> Arc<SyncEngine> {
    let remote: Arc<dyn RemoteStore> = store.clone();
    Arc::new(SyncEngine::new(
        SyncContext::new(cache.clone(), remote),
        SyncTimings::default(),
    ))
}

/// プロジェクトを開いて Idle まで待つ
async fn open(h: &Harness) {
    h.engine.activate(PROJECT).await.expect("activate");
    h.engine.wait_settled().await;
    assert_eq!(h.engine.state(), SyncState::Idle);
}

fn add(engine: &SyncEngine, srno: &str, part: &str) -> String {
    let id = engine.add_row();
    engine.update_row(&id, RowField::Srno, srno).unwrap();
    engine.update_row(&id, RowField::PartName, part).unwrap();
    id
}

fn record(id: &str, srno: &str, part: &str) -> EntryRecord {
    let row = Row {
        srno: srno.to_string(),
        part_name: part.to_string(),
        ..Row::new(id)
    };
    EntryRecord::from_row(&row, PROJECT)
}

/// 「Line 4」シナリオ：2行を追加して同期
#[tokio::test(start_paused = true)]
async fn test_line4_scenario() {
    let h = harness();
    let projects = ProjectService::new(h.store.clone());
    let project = projects.create("Line 4", "", "abc123").await.unwrap();
    projects.open(&project.id, "abc123").await.unwrap();

    h.engine.activate(&project.id).await.unwrap();
    h.engine.wait_settled().await;

    let r1 = add(&h.engine, "001", "Engine Block");
    h.engine.update_row(&r1, RowField::Status, "pending").unwrap();
    let r2 = add(&h.engine, "002", "Brake");
    h.engine.update_row(&r2, RowField::Status, "completed").unwrap();
    assert_eq!(h.engine.unsynced_count(), 2);

    let outcome = h.engine.sync().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Synced { count: 2 });

    let stored = h.store.entries(&project.id);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|e| e.project_id == project.id));
    assert!(h.cache.load(&project.id).is_empty());
    assert_eq!(h.engine.unsynced_count(), 0);

    let brake = stored.iter().find(|e| e.id == r2).unwrap();
    assert_eq!(brake.status, Status::Completed);
}

/// 同じ行を2回同期しても1件のまま（P1）
#[tokio::test(start_paused = true)]
async fn test_sync_is_idempotent() {
    let h = harness();
    open(&h).await;
    let id = add(&h.engine, "001", "Engine Block");
    let row = h.engine.row(&id).unwrap();

    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::Synced { count: 1 });
    let first = h.store.entries(PROJECT);

    // 変更していない同じ行を再度キャッシュして同期
    h.cache.save(&[row], PROJECT);
    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::Synced { count: 1 });

    let second = h.store.entries(PROJECT);
    assert_eq!(second.len(), 1);
    assert_eq!(first, second);
}

/// ステータスだけの行は保存されない（P2）
#[tokio::test(start_paused = true)]
async fn test_status_only_row_is_never_persisted() {
    let h = harness();
    open(&h).await;

    let id = h.engine.add_row();
    h.engine.update_row(&id, RowField::Status, "completed").unwrap();

    assert!(h.cache.load(PROJECT).is_empty());
    assert_eq!(h.engine.unsynced_count(), 0);
    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::NothingToSync);
    assert!(h.store.entries(PROJECT).is_empty());

    assert!(matches!(h.engine.save_row(&id).await, Err(ObserverError::NoMeaningfulData)));
    assert_eq!(h.store.upsert_calls(), 0);
}

/// キャッシュ→同期→再読込で内容が一致し、キャッシュは空（P3）
#[tokio::test(start_paused = true)]
async fn test_cache_then_sync_round_trip() {
    let h = harness();
    open(&h).await;

    let a = add(&h.engine, "001", "Engine Block");
    h.engine.update_row(&a, RowField::Observation, "Oil leak near gasket").unwrap();
    let b = add(&h.engine, "002", "Brake");
    h.engine.update_row(&b, RowField::Responsibility, "Maintenance").unwrap();
    let c = add(&h.engine, "003", "Axle");
    h.engine.update_row(&c, RowField::Remarks, "Check weekly").unwrap();

    let mut before: Vec<Row> = h.cache.load(PROJECT).into_iter().map(|c| c.row).collect();
    assert_eq!(before.len(), 3);

    h.engine.sync().await.unwrap();

    let mut after: Vec<Row> = h.engine.rows().into_iter().filter(|r| r.is_meaningful()).collect();
    before.sort_by(|x, y| x.id.cmp(&y.id));
    after.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(before, after);
    assert!(h.cache.load(PROJECT).is_empty());
}

/// キャッシュが空なら通信しない（P4）
#[tokio::test(start_paused = true)]
async fn test_empty_cache_does_not_contact_remote() {
    let h = harness();
    open(&h).await;
    let selects = h.store.select_calls();

    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::NothingToSync);
    assert_eq!(h.store.upsert_calls(), 0);
    assert_eq!(h.store.select_calls(), selects);
}

/// 行単位の保存は他の行のキャッシュに影響しない（P5）
#[tokio::test(start_paused = true)]
async fn test_save_row_keeps_other_cached_rows() {
    let h = harness();
    open(&h).await;

    let a = add(&h.engine, "001", "Engine Block");
    let b = add(&h.engine, "002", "Brake");
    let cached_b = h.cache.load(PROJECT).into_iter().find(|c| c.row.id == b).unwrap();
    assert_eq!(h.engine.unsynced_count(), 2);

    h.engine.save_row(&a).await.unwrap();

    let remaining = h.cache.load(PROJECT);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0], cached_b);
    assert_eq!(h.engine.unsynced_count(), 1);
    assert_eq!(h.store.entries(PROJECT).len(), 1);
    assert_eq!(h.store.entries(PROJECT)[0].id, a);
}

/// 行単位の保存失敗ではキャッシュを残す
#[tokio::test(start_paused = true)]
async fn test_save_row_failure_keeps_cache() {
    let h = harness();
    open(&h).await;
    let a = add(&h.engine, "001", "Engine Block");

    h.store.set_fail_upsert(true);
    assert!(h.engine.save_row(&a).await.is_err());
    assert_eq!(h.cache.unsynced_count(PROJECT), 1);
    assert_eq!(h.engine.unsynced_count(), 1);
}

/// 同期中の2回目の同期は拒否される（P6）
#[tokio::test(start_paused = true)]
async fn test_single_flight_sync() {
    let h = harness_with(MemoryStore::with_latency(Duration::from_millis(100)));
    open(&h).await;
    add(&h.engine, "001", "Engine Block");

    let (first, second) = tokio::join!(h.engine.sync(), h.engine.sync());

    assert_eq!(first.unwrap(), SyncOutcome::Synced { count: 1 });
    assert_eq!(second.unwrap(), SyncOutcome::InProgress);
    assert_eq!(h.store.upsert_calls(), 1);
}

/// 同期失敗時はキャッシュを残し、再試行できる
#[tokio::test(start_paused = true)]
async fn test_sync_failure_keeps_cache_for_retry() {
    let h = harness();
    open(&h).await;
    add(&h.engine, "001", "Engine Block");
    add(&h.engine, "002", "Brake");

    h.store.set_fail_upsert(true);
    let err = h.engine.sync().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.cache.unsynced_count(PROJECT), 2);
    assert_eq!(h.engine.unsynced_count(), 2);
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert!(h.store.entries(PROJECT).is_empty());

    h.store.set_fail_upsert(false);
    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::Synced { count: 2 });
    assert_eq!(h.store.entries(PROJECT).len(), 2);
}

/// キャッシュに意味のある行が無ければ通信せずに失敗
#[tokio::test(start_paused = true)]
async fn test_sync_without_meaningful_rows() {
    let h = harness();
    open(&h).await;
    h.cache.save(&[Row::new("blank")], PROJECT);

    assert!(matches!(h.engine.sync().await, Err(ObserverError::NoMeaningfulData)));
    assert_eq!(h.store.upsert_calls(), 0);
}

/// プロジェクト未選択
#[tokio::test(start_paused = true)]
async fn test_sync_requires_project() {
    let h = harness();
    assert!(matches!(h.engine.sync().await, Err(ObserverError::NoActiveProject)));
}

/// 読込直後の静穏期間中は自動キャッシュしない
#[tokio::test(start_paused = true)]
async fn test_quiet_period_after_load() {
    let h = harness();
    h.store
        .upsert(&[record("r1", "001", "Engine Block"), record("r2", "002", "Brake")])
        .await
        .unwrap();

    assert_eq!(h.engine.activate(PROJECT).await.unwrap(), 2);
    assert_eq!(h.engine.state(), SyncState::LoadingFromRemote);
    // 読み込んだ行はキャッシュされない
    assert!(h.cache.load(PROJECT).is_empty());

    h.engine.update_row("r1", RowField::Remarks, "edited").unwrap();
    assert!(h.cache.load(PROJECT).is_empty());

    tokio::time::advance(Duration::from_millis(1999)).await;
    h.engine.tick();
    assert_eq!(h.engine.state(), SyncState::LoadingFromRemote);
    assert!(h.cache.load(PROJECT).is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    h.engine.tick();
    assert_eq!(h.engine.state(), SyncState::Idle);
    // 保留していた編集が反映される
    let cached = h.cache.load(PROJECT);
    assert_eq!(cached.len(), 2);
    assert!(cached.iter().any(|c| c.row.remarks == "edited"));
}

/// 編集が無ければ静穏期間の後もキャッシュは空
#[tokio::test(start_paused = true)]
async fn test_load_without_edits_leaves_cache_empty() {
    let h = harness();
    h.store.upsert(&[record("r1", "001", "Engine Block")]).await.unwrap();

    open(&h).await;
    assert!(h.cache.load(PROJECT).is_empty());
    assert_eq!(h.engine.unsynced_count(), 0);
    assert_eq!(h.engine.rows().len(), 1);
}

/// 同期後のクールダウン中は自動キャッシュしない
#[tokio::test(start_paused = true)]
async fn test_cooldown_after_sync() {
    let h = harness();
    open(&h).await;
    let id = add(&h.engine, "001", "Engine Block");

    h.engine.sync().await.unwrap();
    assert_eq!(h.engine.state(), SyncState::SyncCooldown);
    assert!(h.cache.load(PROJECT).is_empty());

    tokio::time::advance(Duration::from_millis(4999)).await;
    assert_eq!(h.engine.state(), SyncState::SyncCooldown);
    assert!(h.cache.load(PROJECT).is_empty());
    assert_eq!(h.engine.unsynced_count(), 0);

    h.engine.update_row(&id, RowField::Remarks, "after sync").unwrap();
    assert!(h.cache.load(PROJECT).is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert_eq!(h.cache.load(PROJECT).len(), 1);
    assert_eq!(h.engine.unsynced_count(), 1);
}

/// 再起動後にキャッシュから未同期の編集を復元する
#[tokio::test(start_paused = true)]
async fn test_recovers_unsynced_rows_after_restart() {
    let h = harness();
    h.store.upsert(&[record("r1", "001", "Engine Block")]).await.unwrap();
    open(&h).await;
    h.engine.update_row("r1", RowField::Observation, "crack found").unwrap();
    add(&h.engine, "002", "Brake");
    assert_eq!(h.engine.unsynced_count(), 2);

    // 同期せずに破棄して作り直す
    let restarted = engine_for(&h.store, &LocalCache::in_dir(h.dir.path()));
    restarted.activate(PROJECT).await.unwrap();
    assert_eq!(restarted.unsynced_count(), 2);

    let rows = restarted.rows();
    assert_eq!(rows.len(), 2);
    let r1 = rows.iter().find(|r| r.id == "r1").unwrap();
    assert_eq!(r1.observation, "crack found");
    assert!(rows.iter().any(|r| r.part_name == "Brake"));
}

/// 読込失敗でもキャッシュの行は復元し、静穏期間の後に Idle へ戻る
#[tokio::test(start_paused = true)]
async fn test_load_failure_restores_cache() {
    let h = harness();
    h.cache.save(
        &[Row {
            srno: "009".into(),
            ..Row::new("cached")
        }],
        PROJECT,
    );
    h.store.set_fail_select(true);

    assert!(h.engine.activate(PROJECT).await.is_err());
    assert_eq!(h.engine.state(), SyncState::LoadingFromRemote);
    assert!(h.engine.row("cached").is_some());

    h.engine.wait_settled().await;
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert_eq!(h.cache.unsynced_count(PROJECT), 1);
}

/// 未同期3件で終了 → 同期を試み、警告を求める
#[tokio::test(start_paused = true)]
async fn test_unload_guard_with_unsynced_rows() {
    let h = harness();
    open(&h).await;
    add(&h.engine, "001", "A");
    add(&h.engine, "002", "B");
    add(&h.engine, "003", "C");
    assert_eq!(h.engine.unsynced_count(), 3);

    let guard = h.engine.before_unload();
    assert!(guard.prompt);
    let handle = guard.sync.expect("sync should be attempted");
    assert_eq!(handle.await.unwrap().unwrap(), SyncOutcome::Synced { count: 3 });
    assert_eq!(h.store.upsert_calls(), 1);
    assert_eq!(h.store.entries(PROJECT).len(), 3);
}

/// 未同期が無ければ何もしない
#[tokio::test(start_paused = true)]
async fn test_unload_guard_without_unsynced_rows() {
    let h = harness();
    open(&h).await;

    let guard = h.engine.before_unload();
    assert!(!guard.prompt);
    assert!(guard.sync.is_none());
    assert_eq!(h.store.upsert_calls(), 0);
}

/// 削除はキャッシュからも取り除く
#[tokio::test(start_paused = true)]
async fn test_delete_removes_cache_entry() {
    let h = harness();
    open(&h).await;
    let a = add(&h.engine, "001", "A");
    add(&h.engine, "002", "B");

    assert!(h.engine.delete_row(&a));
    assert_eq!(h.cache.unsynced_count(PROJECT), 1);
    assert_eq!(h.engine.unsynced_count(), 1);
    assert!(!h.engine.delete_row("missing"));
}

/// 全消去
#[tokio::test(start_paused = true)]
async fn test_clear_all() {
    let h = harness();
    open(&h).await;
    add(&h.engine, "001", "A");

    h.engine.clear_all();
    assert!(h.cache.load(PROJECT).is_empty());
    assert_eq!(h.engine.unsynced_count(), 0);
    assert_eq!(h.engine.rows().len(), 1);
    assert!(!h.engine.rows()[0].is_meaningful());
}

/// 写真アップロード成功で公開URLが入り、行が保存対象になる
#[tokio::test(start_paused = true)]
async fn test_attach_photo_success() {
    let h = harness();
    open(&h).await;
    let id = h.engine.add_row();
    let photo = h.dir.path().join("leak.JPG");
    std::fs::write(&photo, b"jpeg bytes").unwrap();

    let url = h.engine.attach_photo(&id, PhotoSide::Before, &photo).await.unwrap();

    assert!(url.starts_with("memory://project-images/p1/before/"));
    assert!(url.ends_with(".jpg"));
    let row = h.engine.row(&id).unwrap();
    assert_eq!(row.before_photo.remote_url(), Some(url.as_str()));
    assert!(row.is_meaningful());
    assert_eq!(h.cache.unsynced_count(PROJECT), 1);
    assert_eq!(h.store.upload_calls(), 1);
}

/// 写真アップロード失敗ではローカル参照だけが残る
#[tokio::test(start_paused = true)]
async fn test_attach_photo_failure_keeps_local_preview() {
    let h = harness();
    open(&h).await;
    let id = h.engine.add_row();
    let photo = h.dir.path().join("leak.png");
    std::fs::write(&photo, b"png bytes").unwrap();
    h.store.set_fail_upload(true);

    let result = h.engine.attach_photo(&id, PhotoSide::After, &photo).await;
    assert!(matches!(result, Err(ObserverError::Upload(_))));

    let row = h.engine.row(&id).unwrap();
    assert_eq!(row.after_photo, PhotoSlot::Local(photo.display().to_string()));
    assert!(!row.is_meaningful());
    assert!(h.cache.load(PROJECT).is_empty());
}

/// 取込行は自動キャッシュされる
#[tokio::test(start_paused = true)]
async fn test_import_rows_are_cached() {
    let h = harness();
    open(&h).await;
    let rows = vec![
        Row {
            srno: "010".into(),
            ..Row::new("i1")
        },
        Row {
            part_name: "Gear".into(),
            ..Row::new("i2")
        },
    ];

    assert_eq!(h.engine.import_rows(rows), 2);
    assert_eq!(h.engine.rows().len(), 2);
    assert_eq!(h.engine.unsynced_count(), 2);
}

/// 失敗した同期の実行中に行った編集は、失敗後すぐにキャッシュへ反映される
#[tokio::test(start_paused = true)]
async fn test_edit_during_failed_sync_reaches_cache() {
    let h = harness_with(MemoryStore::with_latency(Duration::from_millis(100)));
    open(&h).await;
    let id = add(&h.engine, "001", "Engine Block");
    h.store.set_fail_upsert(true);

    let engine = h.engine.clone();
    let running = tokio::spawn(async move { engine.sync().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.engine.state(), SyncState::SyncingToRemote);
    h.engine.update_row(&id, RowField::Remarks, "edited during sync").unwrap();
    // 同期中はキャッシュを書き換えない
    assert_eq!(h.cache.load(PROJECT)[0].row.remarks, "");

    assert!(running.await.unwrap().is_err());
    assert_eq!(h.engine.state(), SyncState::Idle);
    let cached = h.cache.load(PROJECT);
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].row.remarks, "edited during sync");
    assert_eq!(h.engine.unsynced_count(), 1);
}

/// 読込中に始めた同期が失敗しても、静穏期間の後に Idle へ戻る
#[tokio::test(start_paused = true)]
async fn test_failed_sync_during_load_returns_to_idle() {
    let h = harness_with(MemoryStore::with_latency(Duration::from_millis(100)));
    h.cache.save(&[Row { srno: "001".into(), ..Row::new("r1") }], PROJECT);

    let engine = h.engine.clone();
    let loading = tokio::spawn(async move { engine.activate(PROJECT).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.engine.state(), SyncState::LoadingFromRemote);

    h.store.set_fail_upsert(true);
    assert!(h.engine.sync().await.is_err());
    loading.await.unwrap().unwrap();

    h.engine.wait_settled().await;
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert_eq!(h.cache.unsynced_count(PROJECT), 1);

    // Idle に戻った後は自動キャッシュが働く
    h.engine.update_row("r1", RowField::PartName, "Brake").unwrap();
    assert_eq!(h.cache.load(PROJECT)[0].row.part_name, "Brake");
}

/// 同期中にプロジェクトを開き直しても2回目の同期は拒否される
#[tokio::test(start_paused = true)]
async fn test_single_flight_sync_survives_activate() {
    let h = harness_with(MemoryStore::with_latency(Duration::from_millis(100)));
    open(&h).await;
    add(&h.engine, "001", "Engine Block");

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.sync().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let engine = h.engine.clone();
    let reopen = tokio::spawn(async move { engine.activate(PROJECT).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.engine.state(), SyncState::SyncingToRemote);

    assert_eq!(h.engine.sync().await.unwrap(), SyncOutcome::InProgress);
    assert_eq!(first.await.unwrap().unwrap(), SyncOutcome::Synced { count: 1 });
    reopen.await.unwrap().unwrap();

    assert_eq!(h.store.upsert_calls(), 1);
    assert_eq!(h.store.entries(PROJECT).len(), 1);
    h.engine.wait_settled().await;
    assert_eq!(h.engine.state(), SyncState::Idle);
}
