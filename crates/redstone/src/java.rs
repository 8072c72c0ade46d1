use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

static JAVA_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"version "([^"]+)""#).unwrap());

static MINECRAFT_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JavaVersion {
    Java8,
    Java16,
    Java17,
    Java21,
}

impl JavaVersion {
    pub fn major(self) -> u32 {
        match self {
            JavaVersion::Java8 => 8,
            JavaVersion::Java16 => 16,
            JavaVersion::Java17 => 17,
            JavaVersion::Java21 => 21,
        }
    }
}

impl std::fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.major())
    }
}

/// Java release a given Minecraft version needs to boot.
pub fn required_java(minecraft_version: &str) -> JavaVersion {
    tracing::debug!(
        "Determining required Java version for Minecraft version {}",
        minecraft_version
    );

    let Some(caps) = MINECRAFT_VERSION_REGEX.captures(minecraft_version.trim()) else {
        // Snapshots and unknown formats: assume a modern release.
        return JavaVersion::Java17;
    };

    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    let (major, minor, patch) = (part(1), part(2), part(3));

    match (major, minor, patch) {
        (1, 21.., _) => JavaVersion::Java21,
        (1, 20, 5..) => JavaVersion::Java21,
        (1, 18..=20, _) => JavaVersion::Java17,
        (1, 17, _) => JavaVersion::Java16,
        (1, _, _) => JavaVersion::Java8,
        _ => JavaVersion::Java21,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
}

impl JavaInstallation {
    pub fn satisfies(&self, required: JavaVersion) -> bool {
        self.major >= required.major()
    }
}

/// Extracts the quoted version string and its major number from `java -version` output.
pub fn parse_version_output(output: &str) -> Option<(String, u32)> {
    let version = JAVA_VERSION_REGEX.captures(output)?.get(1)?.as_str();

    let mut parts = version.split(['.', '_', '-', '+']);
    let first: u32 = parts.next()?.parse().ok()?;
    let major = match first {
        1 => parts.next()?.parse().ok()?,
        n => n,
    };

    Some((version.to_string(), major))
}

fn candidate_executable() -> Option<PathBuf> {
    let exe = if cfg!(windows) { "java.exe" } else { "java" };

    if let Some(home) = std::env::var_os("JAVA_HOME").filter(|h| !h.is_empty()) {
        let candidate = Path::new(&home).join("bin").join(exe);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    which::which("java").ok()
}

/// Finds the Java runtime used when a server does not pin one.
pub async fn detect() -> Option<JavaInstallation> {
    let path = candidate_executable()?;
    inspect(&path).await
}

/// Runs `<java> -version` and parses the reported version.
#[tracing::instrument(level = "debug")]
pub async fn inspect(path: &Path) -> Option<JavaInstallation> {
    let output = match tokio::process::Command::new(path)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("Failed to run {}: {}", path.display(), e);
            return None;
        }
    };

    // Java prints its banner to stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );

    let (version, major) = parse_version_output(&text)?;

    Some(JavaInstallation {
        path: path.to_path_buf(),
        version,
        major,
    })
}

/// Resolves a record's `javaPath` (`java` or an absolute path) to an installation.
pub async fn resolve(java_path: &str) -> Option<JavaInstallation> {
    if java_path.is_empty() || java_path == "java" {
        return detect().await;
    }

    inspect(Path::new(java_path)).await
}
