use std::{
    fs,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use flate2::bufread::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use super::{TunnelError, TunnelService};
use crate::{
    cli::printer::Printer,
    platform::{Arch, Platform, user_home},
};

/// Anything smaller is an error page, not an agent.
pub const MIN_AGENT_SIZE: u64 = 1024 * 1024;

const BORE_VERSION: &str = "v0.5.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAsset {
    Binary(String),
    TarGz { url: String, member: String },
    Zip { url: String, member: String },
}

impl AgentAsset {
    pub fn url(&self) -> &str {
        match self {
            AgentAsset::Binary(url)
            | AgentAsset::TarGz { url, .. }
            | AgentAsset::Zip { url, .. } => url,
        }
    }
}

/// Release asset for `service` on this machine, if the provider publishes one.
pub fn asset_for(service: TunnelService, platform: Platform, arch: Arch) -> Option<AgentAsset> {
    let windows = platform.is_windows();
    let exe = |name: &str| platform.executable_name(name);

    match service {
        TunnelService::Playit => {
            let file = match (platform, arch) {
                (Platform::Windows, Arch::Amd64) => "playit-windows-x86_64.exe",
                (Platform::MacOs, Arch::Arm64) => "playit-darwin-aarch64",
                (Platform::Linux | Platform::Termux, Arch::Amd64) => "playit-linux-amd64",
                (Platform::Linux | Platform::Termux, Arch::Arm64) => "playit-linux-aarch64",
                (Platform::Linux | Platform::Termux, Arch::Armv7) => "playit-linux-armv7",
                _ => return None,
            };
            Some(AgentAsset::Binary(format!(
                "https://github.com/playit-cloud/playit-agent/releases/latest/download/{file}"
            )))
        }
        TunnelService::Bore => {
            let triple = match (platform, arch) {
                (Platform::Windows, Arch::Amd64) => "x86_64-pc-windows-msvc",
                (Platform::MacOs, Arch::Amd64) => "x86_64-apple-darwin",
                (Platform::MacOs, Arch::Arm64) => "aarch64-apple-darwin",
                (Platform::Linux | Platform::Termux, Arch::Amd64) => "x86_64-unknown-linux-musl",
                (Platform::Linux | Platform::Termux, Arch::Arm64) => "aarch64-unknown-linux-musl",
                (Platform::Linux | Platform::Termux, Arch::Armv7) => {
                    "armv7-unknown-linux-musleabihf"
                }
                _ => return None,
            };
            let base = format!(
                "https://github.com/ekzhang/bore/releases/download/{BORE_VERSION}/bore-{BORE_VERSION}-{triple}"
            );
            let member = exe("bore");
            Some(if windows {
                AgentAsset::Zip {
                    url: format!("{base}.zip"),
                    member,
                }
            } else {
                AgentAsset::TarGz {
                    url: format!("{base}.tar.gz"),
                    member,
                }
            })
        }
        TunnelService::Ngrok => {
            let os = match platform {
                Platform::Windows => "windows",
                Platform::MacOs => "darwin",
                Platform::Linux | Platform::Termux => "linux",
            };
            let arch = match arch {
                Arch::Amd64 => "amd64",
                Arch::Arm64 => "arm64",
                Arch::Armv7 => "arm",
                Arch::Unsupported => return None,
            };
            let base = format!("https://bin.equinox.io/c/bNyj1mQVY4c/ngrok-v3-stable-{os}-{arch}");
            let member = exe("ngrok");
            Some(match platform {
                Platform::Linux | Platform::Termux => AgentAsset::TarGz {
                    url: format!("{base}.tgz"),
                    member,
                },
                Platform::Windows | Platform::MacOs => AgentAsset::Zip {
                    url: format!("{base}.zip"),
                    member,
                },
            })
        }
        TunnelService::Cloudflared => {
            let base = "https://github.com/cloudflare/cloudflared/releases/latest/download";
            let arch = match arch {
                Arch::Amd64 => "amd64",
                Arch::Arm64 => "arm64",
                Arch::Armv7 => "arm",
                Arch::Unsupported => return None,
            };
            Some(match platform {
                Platform::Windows => {
                    AgentAsset::Binary(format!("{base}/cloudflared-windows-{arch}.exe"))
                }
                Platform::MacOs => AgentAsset::TarGz {
                    url: format!("{base}/cloudflared-darwin-{arch}.tgz"),
                    member: "cloudflared".into(),
                },
                Platform::Linux | Platform::Termux => {
                    AgentAsset::Binary(format!("{base}/cloudflared-linux-{arch}"))
                }
            })
        }
        TunnelService::LocalTunnel => None,
    }
}

/// Finds a tunnel agent on the machine, downloading it into the agents cache if needed.
#[derive(Debug, Clone)]
pub struct AgentInstaller {
    agents_dir: PathBuf,
    client: reqwest::Client,
    printer: Printer,
    platform: Platform,
    arch: Arch,
}

impl AgentInstaller {
    pub fn new(
        agents_dir: impl Into<PathBuf>,
        client: reqwest::Client,
        printer: Printer,
        platform: Platform,
        arch: Arch,
    ) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            client,
            printer,
            platform,
            arch,
        }
    }

    pub fn cached_path(&self, service: TunnelService) -> PathBuf {
        self.agents_dir
            .join(service.slug())
            .join(self.platform.executable_name(service.binary_name()))
    }

    /// PATH, then `~/.cargo/bin` for bore, then a previous download.
    pub fn find_installed(&self, service: TunnelService) -> Option<PathBuf> {
        let binary = self.platform.executable_name(service.binary_name());

        if let Ok(path) = which::which(&binary) {
            tracing::debug!("Found {} on PATH at {}", service, path.display());
            return Some(path);
        }

        if service == TunnelService::Bore {
            let cargo = user_home().join(".cargo").join("bin").join(&binary);
            if cargo.is_file() {
                return Some(cargo);
            }
        }

        let cached = self.cached_path(service);
        match fs::metadata(&cached) {
            Ok(meta) if meta.len() >= MIN_AGENT_SIZE => Some(cached),
            Ok(meta) => {
                tracing::warn!(
                    "Ignoring cached {} at {} ({} bytes)",
                    service,
                    cached.display(),
                    meta.len()
                );
                None
            }
            Err(_) => None,
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn ensure(&self, service: TunnelService) -> Result<PathBuf, TunnelError> {
        if let Some(path) = self.find_installed(service) {
            return Ok(path);
        }

        let Some(asset) = asset_for(service, self.platform, self.arch) else {
            return Err(TunnelError::TunnelUnavailable {
                service,
                hint: service.install_hint(self.platform),
            });
        };

        match self.install(service, &asset).await {
            Ok(path) => Ok(path),
            Err(e) => {
                tracing::error!("Installing {} failed: {}", service, e);
                Err(TunnelError::TunnelUnavailable {
                    service,
                    hint: service.install_hint(self.platform),
                })
            }
        }
    }

    async fn install(&self, service: TunnelService, asset: &AgentAsset) -> Result<PathBuf, TunnelError> {
        let destination = self.cached_path(service);
        let dir = self.agents_dir.join(service.slug());
        fs::create_dir_all(&dir).map_err(|e| TunnelError::Io(dir.clone(), e))?;

        let partial = destination.with_extension("download");
        let bar = self.printer.download_bar(format!("Downloading {service}"));

        let downloaded = redstone_meta::download_to_file(
            &self.client,
            asset.url(),
            &partial,
            |done, total| {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(done);
            },
        )
        .await;
        bar.finish_and_clear();

        if let Err(e) = downloaded {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        let unpacked = match asset {
            AgentAsset::Binary(_) => {
                fs::rename(&partial, &destination).map_err(|e| TunnelError::Io(destination.clone(), e))
            }
            AgentAsset::TarGz { member, .. } => extract_tar_gz(&partial, member, &destination),
            AgentAsset::Zip { member, .. } => extract_zip(&partial, member, &destination),
        };
        let _ = fs::remove_file(&partial);
        unpacked?;

        let size = fs::metadata(&destination)
            .map_err(|e| TunnelError::Io(destination.clone(), e))?
            .len();
        if size < MIN_AGENT_SIZE {
            let _ = fs::remove_file(&destination);
            return Err(TunnelError::AgentTooSmall(destination, size));
        }

        make_executable(&destination)?;
        tracing::info!("Installed {} to {}", service, destination.display());

        Ok(destination)
    }
}

fn member_matches(path: &Path, member: &str) -> bool {
    path.file_name().is_some_and(|name| name == member)
}

/// Unpacks the archive entry whose file name is `member` to `destination`.
pub fn extract_tar_gz(archive: &Path, member: &str, destination: &Path) -> Result<(), TunnelError> {
    let io_err = |e| TunnelError::Io(archive.to_path_buf(), e);

    let file = fs::File::open(archive).map_err(io_err)?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in tar.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;
        let matches = entry
            .path()
            .map(|p| member_matches(&p, member))
            .unwrap_or(false);

        if matches {
            entry
                .unpack(destination)
                .map_err(|e| TunnelError::Io(destination.to_path_buf(), e))?;
            return Ok(());
        }
    }

    Err(TunnelError::MissingMember(archive.to_path_buf(), member.to_string()))
}

pub fn extract_zip(archive: &Path, member: &str, destination: &Path) -> Result<(), TunnelError> {
    let file = fs::File::open(archive).map_err(|e| TunnelError::Io(archive.to_path_buf(), e))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| TunnelError::Io(archive.to_path_buf(), io::Error::other(e)))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| TunnelError::Io(archive.to_path_buf(), io::Error::other(e)))?;

        if entry.is_file() && member_matches(Path::new(entry.name()), member) {
            let mut out = fs::File::create(destination)
                .map_err(|e| TunnelError::Io(destination.to_path_buf(), e))?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| TunnelError::Io(destination.to_path_buf(), e))?;
            return Ok(());
        }
    }

    Err(TunnelError::MissingMember(archive.to_path_buf(), member.to_string()))
}

fn make_executable(path: &Path) -> Result<(), TunnelError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| TunnelError::Io(path.to_path_buf(), e))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
