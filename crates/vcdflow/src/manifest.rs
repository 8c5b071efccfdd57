//! マニフェスト (vcd.yaml) の読み込み

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use vcdflow_cloud::ProviderConfig;
use vcdflow_provider::ResourceSet;

/// `resources:` 部分。`provider:` は vcdflow-config が読む
#[derive(Debug, Default, Deserialize)]
struct ResourceSection {
    #[serde(default)]
    resources: ResourceSet,
}

/// 読み込み済みマニフェスト
#[derive(Debug)]
pub struct Manifest {
    pub path: PathBuf,
    pub resources: ResourceSet,
}

/// マニフェストのパスを決定する
pub fn locate(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Ok(path),
        Some(path) => anyhow::bail!("マニフェストが見つかりません: {}", path.display()),
        None => Ok(vcdflow_config::find_config_file()?),
    }
}

/// 宣言されたリソースを読み込んで検証する
pub fn load(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("マニフェストを読み込めません: {}", path.display()))?;
    let section: ResourceSection = if content.trim().is_empty() {
        ResourceSection::default()
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("マニフェストの形式が不正です: {}", path.display()))?
    };
    section.resources.validate()?;

    Ok(Manifest {
        path: path.to_path_buf(),
        resources: section.resources,
    })
}

/// プロバイダ設定 (マニフェスト + 環境変数)
pub fn provider_config(path: &Path) -> anyhow::Result<ProviderConfig> {
    Ok(vcdflow_config::load_provider_config(path)?)
}

/// 状態ファイル (.vcdflow/state.json) を置くディレクトリ
///
/// マニフェストのあるディレクトリ。`.vcdflow/vcd.yaml` の場合はその親、
/// グローバル設定の場合はカレントディレクトリ。
pub fn project_root(path: &Path) -> PathBuf {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if dir.file_name().is_some_and(|name| name == ".vcdflow") {
        return dir.parent().map(Path::to_path_buf).unwrap_or(dir);
    }
    if vcdflow_config::get_config_dir().is_ok_and(|global| global == dir) {
        return PathBuf::from(".");
    }
    dir
}
