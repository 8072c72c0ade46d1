use std::path::{Path, PathBuf};

use super::StoreError;

pub const PROPERTIES_FILE: &str = "server.properties";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String },
    Other(String),
}

/// `server.properties` that keeps comments, blank lines and key order intact.
#[derive(Debug, Clone)]
pub struct ServerProperties {
    path: PathBuf,
    lines: Vec<Line>,
}

impl ServerProperties {
    pub fn path_in(server_dir: &Path) -> PathBuf {
        server_dir.join(PROPERTIES_FILE)
    }

    pub fn load(server_dir: &Path) -> Result<Self, StoreError> {
        let path = Self::path_in(server_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.clone()),
            _ => StoreError::Read(path.clone(), e),
        })?;

        Ok(Self::parse(path, &content))
    }

    pub fn parse(path: PathBuf, content: &str) -> Self {
        let lines = content.lines().map(parse_line).collect();

        Self { path, lines }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn port(&self) -> Option<u16> {
        self.get("server-port").and_then(|p| p.trim().parse().ok())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value } => Some((key.as_str(), value.as_str())),
            Line::Other(_) => None,
        })
    }

    /// Replaces the first occurrence, drops later duplicates, appends when absent.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let mut seen = false;

        self.lines.retain_mut(|line| match line {
            Line::Entry { key: k, value: v } if *k == key => {
                if seen {
                    return false;
                }
                seen = true;
                *v = value.clone();
                true
            }
            _ => true,
        });

        if !seen {
            self.lines.push(Line::Entry {
                key: key.to_string(),
                value,
            });
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Entry { key: k, .. } if k == key));

        before != self.lines.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Line::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self) -> Result<(), StoreError> {
        std::fs::write(&self.path, self.render())
            .map_err(|e| StoreError::Write(self.path.clone(), e))
    }
}

fn parse_line(raw: &str) -> Line {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return Line::Other(raw.to_string());
    }

    match trimmed.find(['=', ':']) {
        Some(idx) => Line::Entry {
            key: trimmed[..idx].trim().to_string(),
            value: trimmed[idx + 1..].trim_start().to_string(),
        },
        None => Line::Other(raw.to_string()),
    }
}

/// Default `server.properties` written for a freshly created server.
pub fn default_properties(port: u16, online_mode: bool, motd: &str) -> String {
    format!(
        "#Minecraft server properties\n\
         server-port={port}\n\
         online-mode={online_mode}\n\
         max-players=20\n\
         level-name=world\n\
         motd={motd}\n\
         gamemode=survival\n\
         difficulty=easy\n\
         pvp=true\n\
         white-list=false\n\
         view-distance=10\n\
         spawn-protection=16\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(content: &str) -> ServerProperties {
        ServerProperties::parse(PathBuf::from("server.properties"), content)
    }

    #[test]
    fn setting_twice_leaves_one_line() {
        let mut p = props("#comment\nmotd=hello\nserver-port=25565\n");

        p.set("max-players", "10");
        p.set("max-players", "12");

        let rendered = p.render();
        assert_eq!(rendered.matches("max-players=").count(), 1);
        assert!(rendered.contains("max-players=12"));
        assert!(rendered.starts_with("#comment\n"));
    }

    #[test]
    fn set_collapses_existing_duplicates() {
        let mut p = props("pvp=true\nmotd=x\npvp=false\n");

        p.set("pvp", "false");

        assert_eq!(p.render(), "pvp=false\nmotd=x\n");
    }

    #[test]
    fn keeps_comments_and_blank_lines() {
        let src = "#Minecraft server properties\n\n! bang comment\nlevel-name=world\n";
        let p = props(src);

        assert_eq!(p.render(), src);
        assert_eq!(p.get("level-name"), Some("world"));
    }

    #[test]
    fn accepts_colon_separator_and_reads_port() {
        let p = props("server-port: 25570\n");

        assert_eq!(p.port(), Some(25570));
    }

    #[test]
    fn removes_every_occurrence() {
        let mut p = props("a=1\nb=2\na=3\n");

        assert!(p.remove("a"));
        assert!(!p.remove("a"));
        assert_eq!(p.render(), "b=2\n");
    }

    #[test]
    fn default_template_contains_port() {
        let p = props(&default_properties(25565, false, "A RedStone Server"));

        assert_eq!(p.get("server-port"), Some("25565"));
        assert_eq!(p.get("online-mode"), Some("false"));
        assert_eq!(p.get("level-name"), Some("world"));
    }

    #[test]
    fn load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROPERTIES_FILE), "motd=old\n").unwrap();

        let mut p = ServerProperties::load(dir.path()).unwrap();
        p.set("motd", "new");
        p.save().unwrap();

        let content = std::fs::read_to_string(dir.path().join(PROPERTIES_FILE)).unwrap();
        assert_eq!(content, "motd=new\n");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            ServerProperties::load(dir.path()),
            Err(StoreError::NotFound(_))
        ));
    }
}
