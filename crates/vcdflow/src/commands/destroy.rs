use super::{connect, print_result};
use crate::manifest;
use colored::Colorize;
use std::path::Path;
use vcdflow_cloud::StateManager;
use vcdflow_provider::ProviderState;

pub async fn handle(path: &Path, yes: bool) -> anyhow::Result<()> {
    let config = manifest::provider_config(path)?;
    let state_manager = StateManager::new(manifest::project_root(path));

    let mut state: ProviderState = state_manager.load().await?;
    if state.is_empty() {
        println!("{}", "管理中のリソースはありません".yellow());
        return Ok(());
    }

    println!("{}", "削除対象:".bold());
    for key in state.resources.keys().rev() {
        println!("  {} {}", "-".red(), key);
    }

    if !yes {
        println!();
        println!("{}", "警告: 上記のリソースをすべて削除します。".yellow());
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let provider = connect(&config).await?;
    let lock = state_manager.acquire_lock().await?;
    // ロック取得前に読んだ状態は使わない
    state = state_manager.load().await?;

    let result = provider.destroy_all(&mut state).await;
    state_manager.save(&state).await?;
    lock.release().await?;

    if !print_result(&result) {
        eprintln!("{}", "✗ 一部のリソースを削除できませんでした".red().bold());
        std::process::exit(1);
    }
    println!("{}", "✓ すべてのリソースを削除しました".green().bold());

    Ok(())
}
