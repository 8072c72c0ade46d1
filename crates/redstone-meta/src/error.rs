use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response shape from {url}")]
    Schema {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("version {0} is not published upstream")]
    UnknownVersion(String),
    #[error("no server artifact published for version {0}")]
    MissingArtifact(String),
    #[error("writing {0}")]
    Write(PathBuf, #[source] std::io::Error),
}
