mod commands;
mod manifest;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vcd")]
#[command(about = "宣言した vApp・ネットワーク・ファイアウォールを vCloud Director に揃える", long_about = None)]
struct Cli {
    /// マニフェストファイル (省略時は vcd.local.yaml, vcd.yaml, ... の順に検索)
    #[arg(short, long, global = true, env = "VCD_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// マニフェストを検証
    Validate,
    /// 実行計画を表示
    Plan,
    /// 実行計画を適用
    Apply {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 管理中のリソースを再取得して状態を更新
    Refresh,
    /// 管理中のリソースをすべて削除
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 認証情報を確認
    Auth,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr、進捗表示は stdout
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("vcdflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let manifest_path = manifest::locate(cli.config)?;

    match cli.command {
        Commands::Validate => commands::validate::handle(&manifest_path).await,
        Commands::Plan => commands::plan::handle(&manifest_path).await,
        Commands::Apply { yes } => commands::apply::handle(&manifest_path, yes).await,
        Commands::Refresh => commands::refresh::handle(&manifest_path).await,
        Commands::Destroy { yes } => commands::destroy::handle(&manifest_path, yes).await,
        Commands::Auth => commands::auth::handle(&manifest_path).await,
        Commands::Version => Ok(()),
    }
}
