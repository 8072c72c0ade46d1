mod download;
mod error;
pub mod fabric;
pub mod mojang;
pub mod paper;

pub use download::download_to_file;
pub use error::MetaError;
pub use fabric::FabricClient;
pub use mojang::MojangClient;
pub use paper::PaperClient;

pub type Result<T, E = MetaError> = std::result::Result<T, E>;

pub(crate) const USER_AGENT: &str = concat!("redstone/", env!("CARGO_PKG_VERSION"));

pub(crate) fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// Sends a GET request and fails on any non-2xx status.
pub(crate) async fn get_checked(
    client: &reqwest::Client,
    url: &str,
) -> Result<reqwest::Response> {
    log::debug!("GET {}", url);

    let response = client.get(url).send().await.map_err(|source| MetaError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(MetaError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let response = get_checked(client, url).await?;
    let body = response.bytes().await.map_err(|source| MetaError::Http {
        url: url.to_string(),
        source,
    })?;

    serde_json::from_slice(&body).map_err(|source| MetaError::Schema {
        url: url.to_string(),
        source,
    })
}
