use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::Config;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("payload is empty")]
    Empty,
    #[error("file of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes chat attachments to a directory that is also served under `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
    public_base: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize, base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            public_base: format!("{}/uploads", base_url.trim_end_matches('/')),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.uploads_dir, config.max_upload_bytes, &config.base_url)
    }

    pub async fn save(&self, payload: &str) -> Result<String, UploadError> {
        let encoded = encoded_part(payload);
        let size = decoded_len(encoded);
        if size > self.max_bytes {
            return Err(UploadError::TooLarge { size, max: self.max_bytes });
        }

        let data = decode(encoded)?;
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge { size: data.len(), max: self.max_bytes });
        }

        fs::create_dir_all(&self.dir).await?;

        let file_name = format!("image_{}.{}", Uuid::now_v7().simple(), extension(&data));
        let mut file = fs::File::create_new(self.dir.join(&file_name)).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(file_name)
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.public_base)
    }
}

/// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
fn encoded_part(payload: &str) -> &str {
    payload.rsplit(";base64,").next().unwrap_or(payload)
}

/// Size the payload decodes to, without decoding it.
fn decoded_len(encoded: &str) -> usize {
    let digits = encoded.bytes().filter(|b| !b.is_ascii_whitespace() && *b != b'=').count();
    digits * 3 / 4
}

fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(encoded)
}

fn extension(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8]) {
        "jpg"
    } else if data.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10]) {
        "png"
    } else if data.starts_with(b"GIF8") {
        "gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "webp"
    } else {
        "bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    #[tokio::test]
    async fn saves_data_urls_with_a_detected_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024, "http://localhost:8080/");

        let payload = format!("data:image/png;base64,{}", STANDARD.encode(PNG_HEADER));
        let name = store.save(&payload).await.unwrap();

        assert!(name.starts_with("image_") && name.ends_with(".png"), "{name}");
        assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), PNG_HEADER);
        assert_eq!(store.public_url(&name), format!("http://localhost:8080/uploads/{name}"));
    }

    #[tokio::test]
    async fn plain_base64_and_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("nested"), 1024, "http://x");

        let name = store.save(&STANDARD.encode(b"hello")).await.unwrap();
        assert!(name.ends_with(".bin"));
        assert_eq!(std::fs::read(dir.path().join("nested").join(name)).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn every_upload_gets_its_own_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024, "http://x");
        let payload = STANDARD.encode(b"same bytes");

        let first = store.save(&payload).await.unwrap();
        let second = store.save(&payload).await.unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn decoded_len_matches_decoding() {
        for data in [&b""[..], b"a", b"ab", b"abc", b"abcd", b"too long"] {
            let encoded = STANDARD.encode(data);
            assert_eq!(decoded_len(&encoded), data.len(), "{encoded}");
        }
        assert_eq!(decoded_len("aGVs\nbG8="), 5);
    }

    #[tokio::test]
    async fn oversized_payloads_are_refused_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024, "http://x");

        let payload = format!("data:image/png;base64,{}", "!".repeat(4096));
        assert!(matches!(
            store.save(&payload).await,
            Err(UploadError::TooLarge { size: 3072, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn rejects_bad_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 4, "http://x");

        assert!(matches!(store.save("***").await, Err(UploadError::InvalidBase64(_))));
        assert!(matches!(store.save("").await, Err(UploadError::Empty)));
        assert!(matches!(
            store.save(&STANDARD.encode(b"too long")).await,
            Err(UploadError::TooLarge { size: 8, max: 4 })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn detects_common_image_types() {
        assert_eq!(extension(&[0xFF, 0xD8, 0xFF]), "jpg");
        assert_eq!(extension(b"GIF89a"), "gif");
        assert_eq!(extension(b"RIFF\0\0\0\0WEBPVP8 "), "webp");
        assert_eq!(extension(&PNG_HEADER), "png");
        assert_eq!(extension(b"%PDF"), "bin");
    }
}
