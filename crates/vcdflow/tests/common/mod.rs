#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PROVIDER: &str = r#"
provider:
  user: admin
  password: secret
  org: acme
  vdc: acme-vdc
  url: https://vcd.example.com/api
"#;

const VCD_VARS: [&str; 8] = [
    "VCD_CONFIG_PATH",
    "VCD_USER",
    "VCD_PASSWORD",
    "VCD_ORG",
    "VCD_VDC",
    "VCD_URL",
    "VCD_MAX_RETRY_TIMEOUT",
    "VCD_ALLOW_UNVERIFIED_SSL",
];

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// provider セクション付きで vcd.yaml を書く
    pub fn write_manifest(&self, resources: &str) {
        self.write_raw(&format!("{PROVIDER}{resources}"));
    }

    pub fn write_raw(&self, content: &str) {
        fs::write(self.root.path().join("vcd.yaml"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// プロジェクト内で実行する `vcd`。VCD_* とグローバル設定の影響を受けない
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("vcd").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"));
        for name in VCD_VARS {
            cmd.env_remove(name);
        }
        cmd
    }
}
