use std::{
    env::consts::{ARCH, OS},
    path::{Path, PathBuf},
};

use strum::Display;

/// Directory used for servers created in Android shared storage.
pub const SHARED_STORAGE_DIR: &str = "/storage/emulated/0/Documents/RedStone-Servers";

const TERMUX_DATA_DIR: &str = "/data/data/com.termux";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Platform {
    Windows,
    #[strum(to_string = "macOS")]
    MacOs,
    Linux,
    Termux,
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_env(
            OS,
            std::env::var("PREFIX").ok().as_deref(),
            std::env::var("HOME").ok().as_deref(),
            Path::new(TERMUX_DATA_DIR).exists(),
        )
    }

    pub(crate) fn from_env(
        os: &str,
        prefix: Option<&str>,
        home: Option<&str>,
        termux_data_exists: bool,
    ) -> Self {
        let termux = prefix.is_some_and(|p| p.contains("com.termux"))
            || home.is_some_and(|h| h.contains("/com.termux/"))
            || termux_data_exists;

        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ if termux => Platform::Termux,
            _ => Platform::Linux,
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    pub fn is_termux(self) -> bool {
        self == Platform::Termux
    }

    /// Small screens get the compact menu and info layouts.
    pub fn prefers_compact_layout(self) -> bool {
        self.is_termux()
    }

    pub fn executable_name(self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{name}.exe"),
            _ => name.to_string(),
        }
    }
}

/// CPU architecture as named by agent release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
    Armv7,
    Unsupported,
}

pub fn detect_arch() -> Arch {
    arch_from(ARCH)
}

pub(crate) fn arch_from(arch: &str) -> Arch {
    match arch {
        "x86_64" => Arch::Amd64,
        "aarch64" => Arch::Arm64,
        "arm" => Arch::Armv7,
        _ => Arch::Unsupported,
    }
}

/// Home directory of the current user: `HOME`, then `USERPROFILE`, then the OS lookup.
pub fn user_home() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Layout of the tool's own state directory (`~/.redstone` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedstoneHome {
    root: PathBuf,
}

impl RedstoneHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        match explicit {
            Some(root) => Self::new(root),
            None => Self::new(user_home().join(".redstone")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn servers_dir(&self) -> PathBuf {
        self.root.join("servers")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.toml")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Default,
    Shared,
    Custom(PathBuf),
}

impl StorageLocation {
    /// Value stored in the `locationType` field of a server record.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageLocation::Default => "default",
            StorageLocation::Shared => "shared",
            StorageLocation::Custom(_) => "custom",
        }
    }

    pub fn is_custom(&self) -> bool {
        !matches!(self, StorageLocation::Default)
    }

    /// Directory a server called `name` lives in for this location.
    pub fn server_dir(&self, servers_dir: &Path, name: &str) -> PathBuf {
        match self {
            StorageLocation::Default => servers_dir.join(name),
            StorageLocation::Shared => Path::new(SHARED_STORAGE_DIR).join(name),
            StorageLocation::Custom(path) => path.clone(),
        }
    }
}

pub fn default_custom_path(platform: Platform, name: &str) -> PathBuf {
    match platform {
        Platform::Termux => Path::new("/storage/emulated/0").join(name),
        _ => user_home().join("Desktop").join(name),
    }
}

/// Windows system locations servers must never be placed in.
pub fn is_restricted_path(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase().replace('/', "\\");

    ["\\windows\\system32", "c:\\windows", "\\program files"]
        .iter()
        .any(|restricted| lowered.contains(restricted))
        || lowered.trim_end_matches('\\') == "c:"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_termux_from_prefix_and_home() {
        assert_eq!(
            Platform::from_env(
                "linux",
                Some("/data/data/com.termux/files/usr"),
                None,
                false
            ),
            Platform::Termux
        );
        assert_eq!(
            Platform::from_env(
                "android",
                None,
                Some("/data/data/com.termux/files/home"),
                false
            ),
            Platform::Termux
        );
        assert_eq!(
            Platform::from_env("linux", Some("/usr"), Some("/home/alex"), false),
            Platform::Linux
        );
        assert_eq!(
            Platform::from_env("windows", None, None, false),
            Platform::Windows
        );
        assert_eq!(Platform::from_env("macos", None, None, false), Platform::MacOs);
    }

    #[test]
    fn home_layout() {
        let home = RedstoneHome::new("/tmp/rs");

        assert_eq!(home.servers_dir(), PathBuf::from("/tmp/rs/servers"));
        assert_eq!(home.logs_dir(), PathBuf::from("/tmp/rs/logs"));
        assert_eq!(home.settings_file(), PathBuf::from("/tmp/rs/settings.toml"));
    }

    #[test]
    fn storage_location_dirs() {
        let servers = Path::new("/srv/servers");

        assert_eq!(
            StorageLocation::Default.server_dir(servers, "test1"),
            PathBuf::from("/srv/servers/test1")
        );
        assert_eq!(
            StorageLocation::Shared.server_dir(servers, "test1"),
            Path::new(SHARED_STORAGE_DIR).join("test1")
        );
        assert_eq!(
            StorageLocation::Custom("/data/mc".into()).server_dir(servers, "test1"),
            PathBuf::from("/data/mc")
        );
    }

    #[test]
    fn rejects_windows_system_paths() {
        assert!(is_restricted_path(Path::new("C:\\Windows\\System32\\mc")));
        assert!(is_restricted_path(Path::new("C:\\Program Files\\mc")));
        assert!(is_restricted_path(Path::new("C:\\")));
        assert!(!is_restricted_path(Path::new("D:\\games\\mc")));
        assert!(!is_restricted_path(Path::new("/home/alex/servers")));
    }

    #[test]
    fn maps_architectures() {
        assert_eq!(arch_from("x86_64"), Arch::Amd64);
        assert_eq!(arch_from("aarch64"), Arch::Arm64);
        assert_eq!(arch_from("arm"), Arch::Armv7);
        assert_eq!(arch_from("riscv64"), Arch::Unsupported);
    }
}
