use super::{connect, print_plan, print_result};
use crate::manifest;
use colored::Colorize;
use std::path::Path;
use tracing::debug;
use vcdflow_cloud::StateManager;
use vcdflow_provider::ProviderState;

pub async fn handle(path: &Path, yes: bool) -> anyhow::Result<()> {
    let manifest = manifest::load(path)?;
    let config = manifest::provider_config(path)?;
    let state_manager = StateManager::new(manifest::project_root(path));

    let provider = connect(&config).await?;
    let lock = state_manager.acquire_lock().await?;
    let mut state: ProviderState = state_manager.load().await?;

    println!("{}", "状態を再取得中...".blue());
    provider.refresh(&mut state).await?;

    let plan = provider.plan(&manifest.resources, &state);
    print_plan(&plan);

    if !plan.has_changes {
        state_manager.save(&state).await?;
        lock.release().await?;
        println!("{}", "✓ 変更はありません".green());
        return Ok(());
    }

    // 確認（--yesが指定されていない場合）
    if !yes {
        lock.release().await?;
        println!();
        println!("{}", "警告: リソースを作成・変更・削除します。".yellow());
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!();
    println!("{}", "適用中...".blue().bold());
    let result = provider.apply(&plan, &manifest.resources, &mut state).await;

    // 失敗があっても成功した分は記録する
    state_manager.save(&state).await?;
    debug!(path = %state_manager.state_path().display(), "State saved");
    lock.release().await?;

    if !print_result(&result) {
        eprintln!("{}", "✗ 一部の変更に失敗しました".red().bold());
        std::process::exit(1);
    }
    println!("{}", "✓ 適用が完了しました！".green().bold());

    Ok(())
}
