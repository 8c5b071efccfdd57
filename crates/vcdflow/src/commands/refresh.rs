use super::connect;
use crate::manifest;
use colored::Colorize;
use std::path::Path;
use vcdflow_cloud::StateManager;
use vcdflow_provider::ProviderState;

pub async fn handle(path: &Path) -> anyhow::Result<()> {
    let config = manifest::provider_config(path)?;
    let state_manager = StateManager::new(manifest::project_root(path));

    let provider = connect(&config).await?;
    let lock = state_manager.acquire_lock().await?;
    let mut state: ProviderState = state_manager.load().await?;

    println!("{}", format!("{}個のリソースを再取得中...", state.len()).blue());
    let vanished = provider.refresh(&mut state).await?;
    state_manager.save(&state).await?;
    lock.release().await?;

    for key in &vanished {
        println!("  {} {} を状態から削除しました", "-".red(), key);
    }
    println!(
        "{}",
        format!("✓ 状態を更新しました ({}個を管理中)", state.len())
            .green()
            .bold()
    );

    Ok(())
}
