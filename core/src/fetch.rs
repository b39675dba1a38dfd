use std::io::Write;
use std::path::Path;

use log::{debug, info};
use reqwest::{Client, StatusCode, header};
use tempfile::NamedTempFile;

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::source::MediaType;

/// A fully downloaded media resource held in memory
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    /// Content-Type reported by the server, if any
    pub content_type: Option<String>,
}

impl MediaBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build the HTTP client used for downloads
pub fn build_client(config: &PlayerConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(config.user_agent.clone());
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Fetch the whole resource at `url` into memory
///
/// Anything but `200 OK` is a [`PlayerError::Network`] carrying the status
/// text; connection failures and interrupted bodies are
/// [`PlayerError::Transfer`].
pub async fn download(client: &Client, url: &str) -> Result<MediaBlob> {
    debug!("GET {}", url);
    let response = client.get(url).send().await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(PlayerError::Network {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await?.to_vec();
    info!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(MediaBlob {
        bytes,
        content_type,
    })
}

/// Local, resolvable reference to a downloaded blob
///
/// The bytes live in a temporary file for as long as this value does;
/// dropping it revokes the reference and removes the file.
#[derive(Debug)]
pub struct BlobUrl {
    file: NamedTempFile,
}

impl BlobUrl {
    pub fn create(blob: &MediaBlob, media_type: MediaType) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("blobplay-")
            .suffix(&format!(".{}", media_type.as_str()))
            .tempfile()?;
        file.write_all(&blob.bytes)?;
        file.flush()?;
        debug!("Blob of {} bytes available at {}", blob.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
