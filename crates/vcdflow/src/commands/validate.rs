use crate::manifest;
use colored::Colorize;
use std::path::Path;
use vcdflow_provider::ResourceSpec;

pub async fn handle(path: &Path) -> anyhow::Result<()> {
    println!("{}", "マニフェストを検証中...".blue());
    println!("マニフェスト: {}", path.display().to_string().cyan());

    let loaded = manifest::load(path).and_then(|m| {
        let config = manifest::provider_config(path)?;
        Ok((m, config))
    });

    match loaded {
        Ok((manifest, config)) => {
            println!("{}", "✓ マニフェストは正常です！".green().bold());
            println!();
            println!("サマリー:");
            println!(
                "  接続先: {} (org: {}, vdc: {})",
                config.url.cyan(),
                config.org,
                config.vdc.as_deref().unwrap_or("(先頭の VDC)")
            );
            println!("  リソース: {}個", manifest.resources.len());
            for resource in manifest.resources.iter() {
                let detail = match resource {
                    ResourceSpec::Vapp(r) => r
                        .template_name
                        .clone()
                        .unwrap_or_else(|| "(空の vApp)".to_string()),
                    ResourceSpec::Network(r) => format!("{} / {}", r.edge_gateway, r.gateway),
                    ResourceSpec::FirewallRules(r) => format!("{}個のルール", r.rules.len()),
                };
                println!("    - {} ({})", resource.key().cyan(), detail);
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ マニフェストエラー".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
