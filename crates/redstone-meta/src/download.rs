use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::{MetaError, Result, get_checked};

/// Streams `url` into `destination`, reporting `(downloaded, total)` after every chunk.
///
/// The destination is truncated first. On failure the partial file is left for the
/// caller to clean up together with the rest of whatever it was provisioning.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<u64> {
    let mut response = get_checked(client, url).await?;
    let total = response.content_length();

    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| MetaError::Write(destination.to_path_buf(), e))?;

    let mut downloaded = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|source| MetaError::Http {
        url: url.to_string(),
        source,
    })? {
        let chunk: bytes::Bytes = chunk;
        file.write_all(&chunk)
            .await
            .map_err(|e| MetaError::Write(destination.to_path_buf(), e))?;

        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush()
        .await
        .map_err(|e| MetaError::Write(destination.to_path_buf(), e))?;

    log::debug!("Wrote {} bytes to {}", downloaded, destination.display());

    Ok(downloaded)
}
