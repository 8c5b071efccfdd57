use crate::manifest;
use colored::Colorize;
use std::path::Path;

pub async fn handle(path: &Path) -> anyhow::Result<()> {
    let config = manifest::provider_config(path)?;
    println!("ユーザー: {}", config.login().cyan());

    let provider = match super::connect(&config).await {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("{}", "✗ 認証に失敗しました".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    };

    let status = provider.check_auth().await;
    if status.authenticated {
        println!(
            "{} {} ({})",
            "✓ 認証済み:".green().bold(),
            provider.display_name(),
            status.account_info.as_deref().unwrap_or("-")
        );
    } else {
        eprintln!("{}", "✗ 認証に失敗しました".red().bold());
        if let Some(error) = status.error {
            eprintln!("  {}", error);
        }
        std::process::exit(1);
    }

    Ok(())
}
