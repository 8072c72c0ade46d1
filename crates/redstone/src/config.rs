use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::{lifecycle::JavaCommand, store::properties};

pub const EULA_FILE: &str = "eula.txt";
pub const START_SH: &str = "start.sh";
pub const START_BAT: &str = "start.bat";

/// Renders the files a server directory needs besides the jar.
pub struct ConfigGenerator {
    server_dir: PathBuf,
}

impl ConfigGenerator {
    pub fn new(server_dir: &Path) -> Self {
        Self {
            server_dir: server_dir.to_path_buf(),
        }
    }

    pub fn eula_path(&self) -> PathBuf {
        self.server_dir.join(EULA_FILE)
    }

    pub fn properties_path(&self) -> PathBuf {
        self.server_dir.join(properties::PROPERTIES_FILE)
    }

    pub fn eula_content() -> &'static str {
        "eula=true"
    }

    pub fn server_properties(port: u16, online_mode: bool, name: &str) -> String {
        properties::default_properties(port, online_mode, &format!("{name} - RedStone Server"))
    }

    pub fn start_sh(java: &JavaCommand) -> String {
        format!(
            "#!/bin/sh\ncd \"$(dirname \"$0\")\"\nexec {}\n",
            java.shell_line()
        )
    }

    pub fn start_bat(java: &JavaCommand) -> String {
        format!(
            "@echo off\r\ncd /d \"%~dp0\"\r\n{}\r\npause\r\n",
            java.shell_line()
        )
    }

    /// Writes `start.sh` and `start.bat` so the server can be launched by hand.
    pub fn write_start_scripts(&self, java: &JavaCommand) -> Result<()> {
        let sh = self.server_dir.join(START_SH);
        std::fs::write(&sh, Self::start_sh(java))
            .with_context(|| format!("Failed to write start script: {}", sh.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            std::fs::set_permissions(&sh, std::fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to chmod {}", sh.display()))?;
        }

        let bat = self.server_dir.join(START_BAT);
        std::fs::write(&bat, Self::start_bat(java))
            .with_context(|| format!("Failed to write start script: {}", bat.display()))?;

        tracing::debug!("Start scripts written to {}", self.server_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn java() -> JavaCommand {
        JavaCommand {
            java: "java".into(),
            ram_mb: 2048,
            jar: PathBuf::from("/srv/test 1/server.jar"),
        }
    }

    #[test]
    fn start_script_runs_the_jar() {
        let sh = ConfigGenerator::start_sh(&java());

        assert!(sh.starts_with("#!/bin/sh\n"));
        assert!(sh.contains("-Xmx2048M -Xms1024M -jar \"/srv/test 1/server.jar\" nogui"));
    }

    #[test]
    fn writes_both_scripts() {
        let dir = tempfile::tempdir().unwrap();

        ConfigGenerator::new(dir.path())
            .write_start_scripts(&java())
            .unwrap();

        assert!(dir.path().join(START_SH).is_file());
        assert!(
            std::fs::read_to_string(dir.path().join(START_BAT))
                .unwrap()
                .contains("\r\npause\r\n")
        );
    }
}
