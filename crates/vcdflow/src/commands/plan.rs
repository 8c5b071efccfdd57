use super::{connect, print_plan};
use crate::manifest;
use colored::Colorize;
use std::path::Path;
use vcdflow_cloud::StateManager;
use vcdflow_provider::ProviderState;

/// 状態を再取得して計画を表示する。状態ファイルは書き換えない
pub async fn handle(path: &Path) -> anyhow::Result<()> {
    let manifest = manifest::load(path)?;
    let config = manifest::provider_config(path)?;
    let state_manager = StateManager::new(manifest::project_root(path));

    let provider = connect(&config).await?;
    let mut state: ProviderState = state_manager.load().await?;

    println!("{}", "状態を再取得中...".blue());
    let vanished = provider.refresh(&mut state).await?;
    for key in &vanished {
        println!("  {} {} は存在しません", "!".yellow(), key);
    }

    let plan = provider.plan(&manifest.resources, &state);
    print_plan(&plan);
    if !plan.has_changes {
        println!("{}", "✓ 変更はありません".green());
    }

    Ok(())
}
