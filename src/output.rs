//! Publishing finished artifacts to S3.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Prefix under which every artifact is uploaded.
pub const OUTPUT_PREFIX: &str = "outputs";

/// The S3 key for an artifact file, with `.gz` appended when compressed.
pub fn object_key(path: &Path, gzip: bool) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let suffix = if gzip { ".gz" } else { "" };
    Some(format!("{OUTPUT_PREFIX}/{file_name}{suffix}"))
}

/// Content type by artifact extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("geojson") => "application/geo+json",
        Some("json") => "application/json",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Gzip-compresses `bytes` with the default level.
pub fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Uploads each existing artifact in `paths` to `bucket`, optionally
/// gzip-compressed. Missing artifacts are skipped. Returns the upload count.
#[tracing::instrument(skip(client, paths))]
pub async fn publish_artifacts(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    paths: &[&Path],
    gzip: bool,
) -> Result<usize> {
    let mut upload_count = 0;

    for path in paths {
        if !path.exists() {
            warn!(path = %path.display(), "Artifact not materialized yet, skipping");
            continue;
        }

        let key = object_key(path, gzip)
            .with_context(|| format!("artifact path '{}' has no file name", path.display()))?;
        let contents = std::fs::read(path)?;
        let body = if gzip { gzip_bytes(&contents)? } else { contents };

        client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type(path))
            .send()
            .await
            .with_context(|| format!("S3 upload failed for '{key}'"))?;

        info!(key = %key, "Artifact uploaded");
        upload_count += 1;
    }

    info!(upload_count, "S3 publish complete");
    Ok(upload_count)
}
