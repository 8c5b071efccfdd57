pub mod apply;
pub mod auth;
pub mod destroy;
pub mod plan;
pub mod refresh;
pub mod validate;

use colored::Colorize;
use std::sync::Arc;
use vcdflow_cloud::{ActionType, ApplyResult, Plan, ProviderConfig, RetryExecutor, VcdApi};
use vcdflow_cloud_api::HttpVcdApi;
use vcdflow_provider::VcdProvider;

/// ログインしてプロバイダを組み立てる
pub async fn connect(config: &ProviderConfig) -> anyhow::Result<VcdProvider> {
    println!("{}", format!("{} に接続中...", config.url).blue());
    let api = HttpVcdApi::connect(config).await?;
    println!(
        "  ✓ {} / {}",
        api.org().name.cyan(),
        api.vdc().name.cyan()
    );

    let retry = RetryExecutor::new(config.retry_config());
    Ok(VcdProvider::new(Arc::new(api), retry))
}

/// 実行計画を表示
pub fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "実行計画:".bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Replace => "±".magenta(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => " ".normal(),
        };
        let line = format!("  {} {}", marker, action.description);
        if action.action_type == ActionType::NoOp {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
        if !action.changes.is_empty() {
            println!("      変更: {}", action.changes.join(", ").yellow());
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

/// 適用結果を表示。失敗があれば false
pub fn print_result(result: &ApplyResult) -> bool {
    println!();
    for ok in &result.succeeded {
        println!("  {} {}", "✓".green(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.action_id,
            failed.error.as_deref().unwrap_or("不明なエラー")
        );
    }
    println!();
    println!(
        "成功: {} / 失敗: {} ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
    result.is_success()
}
