//! Satellite image retrieval.
//!
//! One streaming GET. The body is spooled into a temp file next to the
//! destination and only renamed into place once the whole stream arrived,
//! so a non-200 response or a mid-stream failure never clobbers the
//! previous run's image.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tempfile::NamedTempFile;

use crate::error::StageError;

pub async fn fetch_satellite_image(
    http: &Client,
    url: &str,
    dest: &Path,
) -> Result<(), StageError> {
    log::info!("fetching satellite image from {url}");

    let res = http
        .get(url)
        .send()
        .await
        .map_err(|source| StageError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = res.status();
    if !status.is_success() {
        return Err(StageError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = NamedTempFile::new_in(&parent)?;

    let mut written = 0usize;
    let mut stream = res.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| StageError::Transport {
            url: url.to_string(),
            source,
        })?;
        tmp.write_all(&chunk)?;
        written += chunk.len();
    }
    tmp.flush()?;
    tmp.persist(dest).map_err(|e| StageError::Io(e.error))?;

    log::info!("wrote {written} bytes to {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_source_leaves_destination_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("latest.jpg");
        std::fs::write(&dest, b"previous image").expect("seed file");

        // unsupported scheme fails before any network traffic
        let client = Client::new();
        let err = fetch_satellite_image(&client, "ftp://example.invalid/latest.jpg", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Transport { .. }), "got {err:?}");
        assert_eq!(std::fs::read(&dest).expect("read"), b"previous image");
    }
}
