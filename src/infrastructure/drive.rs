use std::sync::LazyLock;

use axum::body::Bytes;
use futures_util::future::try_join_all;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::storage::{ObjectStorage, StorageError};

static FOLDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([A-Za-z0-9_-]+)").expect("valid folder regex"));
static FILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").expect("valid file regex"));

const DOWNLOAD_URL: &str = "https://drive.google.com/uc?export=download&id=";
const FILES_API: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("unrecognised drive link: {0}")]
    InvalidLink(String),

    #[error("GOOGLE_API_KEY is required to list drive folders")]
    ApiKeyMissing,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("drive folder {0} holds no images")]
    EmptyFolder(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum DriveLink<'a> {
    Folder(&'a str),
    File(&'a str),
}

pub fn parse_link(link: &str) -> Option<DriveLink<'_>> {
    if let Some(c) = FOLDER_ID.captures(link) {
        return c.get(1).map(|m| DriveLink::Folder(m.as_str()));
    }
    FILE_ID
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| DriveLink::File(m.as_str()))
}

pub fn download_url(file_id: &str) -> String {
    format!("{DOWNLOAD_URL}{file_id}")
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    mime_type: String,
}

#[derive(Clone)]
pub struct DriveClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl DriveClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Pull every image behind a file or folder link and re-host it.
    pub async fn import_images(
        &self,
        link: &str,
        storage: &ObjectStorage,
        folder: &str,
    ) -> Result<Vec<String>, DriveError> {
        let file_ids = match parse_link(link) {
            Some(DriveLink::File(id)) => vec![id.to_string()],
            Some(DriveLink::Folder(id)) => {
                let ids = self.list_folder_images(id).await?;
                if ids.is_empty() {
                    return Err(DriveError::EmptyFolder(id.to_string()));
                }
                ids
            }
            None => return Err(DriveError::InvalidLink(link.to_string())),
        };

        try_join_all(file_ids.iter().map(|id| async move {
            let (bytes, mime) = self.download(id).await?;
            Ok::<_, DriveError>(storage.upload(bytes, &mime, folder).await?)
        }))
        .await
    }

    async fn list_folder_images(&self, folder_id: &str) -> Result<Vec<String>, DriveError> {
        let key = self.api_key.as_deref().ok_or(DriveError::ApiKeyMissing)?;
        let query = format!("'{folder_id}' in parents and trashed = false");
        let list: FileList = self
            .client
            .get(FILES_API)
            .query(&[("q", query.as_str()), ("fields", "files(id,mimeType)"), ("key", key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(list
            .files
            .into_iter()
            .filter(|f| f.mime_type.starts_with("image/"))
            .map(|f| f.id)
            .collect())
    }

    async fn download(&self, file_id: &str) -> Result<(Bytes, String), DriveError> {
        let response = self
            .client
            .get(download_url(file_id))
            .send()
            .await?
            .error_for_status()?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap_or("image/jpeg")
            .to_string();
        Ok((response.bytes().await?, mime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_folder_and_file_links() {
        assert_eq!(
            parse_link("https://drive.google.com/drive/folders/1AbC_d-9?usp=sharing"),
            Some(DriveLink::Folder("1AbC_d-9"))
        );
        assert_eq!(
            parse_link("https://drive.google.com/file/d/XyZ_123-a/view"),
            Some(DriveLink::File("XyZ_123-a"))
        );
        assert_eq!(parse_link("https://example.com/picture.png"), None);
    }

    #[test]
    fn builds_direct_download_url() {
        assert_eq!(
            download_url("abc"),
            "https://drive.google.com/uc?export=download&id=abc"
        );
    }
}
