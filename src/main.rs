use clap::Parser;
use observer_common::{Project, Row, RowField, RowFilter};
use observer_sync::{cache, cli, config, error, export, import, project, remote, sync};
use cli::{Cli, Commands, ProjectCommand};
use config::Config;
use error::{ObserverError, Result};
use remote::{RemoteStore, RestStore};
use std::process::ExitCode;
use std::sync::Arc;
use sync::{SyncContext, SyncEngine, SyncOutcome, SyncTimings};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "observer_sync=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::Config { set_remote_url, set_api_key, set_master_password, show } => {
            if let Some(url) = set_remote_url {
                config.set_remote_url(url)?;
                println!("✔ リモートストアのURLを設定しました");
            }
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }
            if let Some(password) = set_master_password {
                config.master_password = if password.is_empty() { None } else { Some(password) };
                config.save()?;
                println!("✔ 共通パスワードを更新しました");
            }
            if show {
                println!("設定:");
                println!("  リモートURL: {}", config.remote_url().unwrap_or_else(|_| "未設定".into()));
                println!("  APIキー: {}", if config.api_key().is_some() { "設定済み" } else { "未設定" });
                println!("  写真バケット: {}", config.photo_bucket);
                if let Ok(path) = config.resolved_cache_path() {
                    println!("  ローカルキャッシュ: {}", path.display());
                }
                println!("  読込後の待機: {}ms / 同期後の待機: {}ms", config.load_quiet_period_ms, config.sync_cooldown_ms);
                println!("  共通パスワード: {}", if config.master_password.is_some() { "設定済み" } else { "未設定" });
                println!("  現在のプロジェクト: {}", config.current_project.as_deref().unwrap_or("なし"));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Template { output } => {
            import::write_template(&output)?;
            println!("✔ テンプレートを出力: {}", output.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Project { action } => {
            let remote: Arc<dyn RemoteStore> = Arc::new(RestStore::from_config(&config)?);
            let projects = project::ProjectService::new(remote)
                .with_master_password(config.master_password.clone());
            let result = run_project_command(action, &projects, &mut config, cli.password.as_deref()).await;
            Ok(exit_code(report_outcome(result)))
        }

        command => {
            let remote: Arc<dyn RemoteStore> = Arc::new(RestStore::from_config(&config)?);
            let projects = project::ProjectService::new(remote.clone())
                .with_master_password(config.master_password.clone());

            let project_id = cli
                .project
                .clone()
                .or_else(|| config.current_project.clone())
                .ok_or(ObserverError::NoActiveProject)?;
            let password = cli.password.as_deref().ok_or(ObserverError::MissingPassword)?;
            let project = projects.open(&project_id, password).await?;
            if config.current_project.as_deref() != Some(project.id.as_str()) {
                config.set_current_project(Some(project.id.clone()))?;
            }

            let cache = cache::LocalCache::new(config.resolved_cache_path()?);
            let engine = Arc::new(SyncEngine::new(
                SyncContext::new(cache, remote),
                SyncTimings::from_config(&config),
            ));

            if let Err(e) = engine.activate(&project.id).await {
                println!("⚠ リモートから読み込めませんでした（ローカルの内容で続行）: {}", e);
            }

            let succeeded = report_outcome(run_session_command(command, &engine, &project).await);

            engine.wait_settled().await;
            if !cli.keep_local {
                run_unload_guard(&engine).await;
            } else if engine.unsynced_count() > 0 {
                println!("- 未同期の行: {}件（ローカルキャッシュに保持）", engine.unsynced_count());
            }
            Ok(exit_code(succeeded))
        }
    }
}

async fn run_project_command(
    action: ProjectCommand,
    projects: &project::ProjectService,
    config: &mut Config,
    password: Option<&str>,
) -> Result<()> {
    match action {
        ProjectCommand::Create { name, description } => {
            let project = projects.create(&name, &description, password.unwrap_or("")).await?;
            config.set_current_project(Some(project.id.clone()))?;
            println!("✔ プロジェクトを作成: {} ({})", project.name, project.id);
        }
        ProjectCommand::List => {
            let list = projects.list().await?;
            if list.is_empty() {
                println!("プロジェクトはありません");
            }
            for p in list {
                let marker = if config.current_project.as_deref() == Some(p.id.as_str()) { "*" } else { " " };
                println!("{} {}  {}  {}", marker, p.id, p.created_at.format("%Y-%m-%d"), p.name);
                if !p.description.is_empty() {
                    println!("    {}", p.description);
                }
            }
        }
        ProjectCommand::Open { id } => {
            let project = projects.open(&id, password.unwrap_or("")).await?;
            config.set_current_project(Some(project.id.clone()))?;
            println!("✔ プロジェクトを開きました: {}", project.name);
        }
        ProjectCommand::Delete { id } => {
            projects.delete(&id, password.unwrap_or("")).await?;
            if config.current_project.as_deref() == Some(id.as_str()) {
                config.set_current_project(None)?;
            }
            println!("✔ プロジェクトを削除しました: {}", id);
        }
        ProjectCommand::Passwd { id, new_password } => {
            projects.change_password(&id, password.unwrap_or(""), &new_password).await?;
            println!("✔ パスワードを変更しました");
        }
    }
    Ok(())
}

async fn run_session_command(command: Commands, engine: &Arc<SyncEngine>, project: &Project) -> Result<()> {
    match command {
        Commands::Add { srno, part, op, observation, action, responsibility, remarks, status } => {
            let id = engine.add_row();
            let fields = [
                (RowField::Srno, srno),
                (RowField::PartName, part),
                (RowField::OpNumber, op),
                (RowField::Observation, observation),
                (RowField::ActionPlan, action),
                (RowField::Responsibility, responsibility),
                (RowField::Remarks, remarks),
                (RowField::Status, status),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    engine.update_row(&id, field, &value)?;
                }
            }
            println!("✔ 行を追加: {}", id);
        }

        Commands::Set { id, field, value } => {
            engine.update_row(&id, field, &value)?;
            println!("✔ {} を更新", field.key());
        }

        Commands::Remove { id, remote } => {
            let removed = if remote { engine.purge_row(&id).await? } else { engine.delete_row(&id) };
            if !removed {
                return Err(ObserverError::RowNotFound(id));
            }
            println!("✔ 行を削除: {}", id);
        }

        Commands::Move { from, to } => {
            if !engine.reorder(from, to) {
                return Err(ObserverError::Config(format!("位置が範囲外です: {} → {}", from, to)));
            }
            for (i, row) in engine.rows().iter().enumerate() {
                println!("{:>3}  {}", i, row_line(row));
            }
        }

        Commands::SaveRow { id } => {
            engine.save_row(&id).await?;
            println!("✔ 行を保存しました: {}", id);
        }

        Commands::Photo { id, side, file } => {
            println!("- 写真をアップロード中...");
            match engine.attach_photo(&id, side, &file).await {
                Ok(url) => println!("✔ アップロード完了: {}", url),
                Err(e) => {
                    println!("⚠ アップロードに失敗しました。ファイルを選び直して再試行してください");
                    return Err(e);
                }
            }
        }

        Commands::List { search, status, responsibility } => {
            let filter = RowFilter::new(search)
                .with_status(status)
                .with_responsibility(responsibility);
            let rows = engine.filtered(&filter);
            for row in rows.iter().filter(|r| r.is_meaningful()) {
                println!("{}  {}", row.id, row_line(row));
            }
            let shown = rows.iter().filter(|r| r.is_meaningful()).count();
            println!("\n{}件表示（全{}件）", shown, engine.summary().total);
        }

        Commands::Sync => {
            println!("- 同期中...");
            match engine.sync().await? {
                SyncOutcome::Synced { count } => println!("✔ {}件を同期しました", count),
                SyncOutcome::NothingToSync => println!("同期する行はありません"),
                SyncOutcome::InProgress => println!("⚠ 同期中です"),
            }
        }

        Commands::Status => {
            let summary = engine.summary();
            println!("プロジェクト: {} ({})", project.name, project.id);
            println!("  状態: {}", engine.state());
            println!("  未同期: {}件", engine.unsynced_count());
            println!("  行数: {} (完了 {} / 未完了 {})", summary.total, summary.completed, summary.pending);
            println!("  写真あり: {} / 施策あり: {} / 備考あり: {}", summary.with_photos, summary.with_action_plans, summary.with_remarks);
            let owners = engine.responsibilities();
            if !owners.is_empty() {
                println!("  担当: {}", owners.join(", "));
            }
        }

        Commands::Clear => {
            engine.clear_all();
            println!("✔ 全行とローカルキャッシュを消去しました");
        }

        Commands::Import { file } => {
            let rows = import::import_spreadsheet(&file)?;
            let count = engine.import_rows(rows);
            println!("✔ {}行を取込みました", count);
        }

        Commands::Export { format, output, pdf_quality } => {
            let options = export::ExportOptions {
                format,
                output,
                pdf_quality,
                date: chrono::Local::now().date_naive(),
            };
            if format != cli::ExportFormat::Excel && format != cli::ExportFormat::Csv {
                println!("- PDFを生成中... (品質: {})", pdf_quality);
            }
            let files = export::export_rows(&engine.export_rows(), &project.name, &options).await?;
            for file in &files {
                println!("✔ 出力: {}", file.display());
            }
            if format.is_tabular() {
                println!("⚠ Excel/CSVには写真は含まれません（URLのみ）");
            }
        }

        Commands::Suggest { field, query } => {
            for value in engine.suggestions().search(field, &query) {
                println!("{}", value);
            }
        }

        Commands::Project { .. } | Commands::Template { .. } | Commands::Config { .. } => {}
    }
    Ok(())
}

/// 終了前ガード：未同期の行があれば同期を試みる
async fn run_unload_guard(engine: &Arc<SyncEngine>) {
    let guard = engine.before_unload();
    if !guard.prompt {
        return;
    }
    println!("⚠ 未同期の行があります。終了前に同期を試みます...");
    let Some(handle) = guard.sync else {
        return;
    };
    match handle.await {
        Ok(Ok(SyncOutcome::Synced { count })) => println!("✔ {}件を同期しました", count),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => println!("⚠ 同期できませんでした（ローカルキャッシュに保持）: {}", e),
        Err(e) => println!("⚠ 同期タスクが異常終了しました: {}", e),
    }
}

/// 操作の失敗を通知に変換する（表示は1回だけ）。成功なら true
fn report_outcome(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            println!("⚠ {}", e);
            false
        }
    }
}

fn exit_code(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn row_line(row: &Row) -> String {
    format!(
        "[{}] #{} {} | {} | {} | {}",
        row.status, row.srno, row.part_name, row.op_number, row.observation, row.responsibility
    )
}
