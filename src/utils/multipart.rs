use std::collections::HashMap;

use axum::{body::Bytes, extract::Multipart};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::infrastructure::storage::ObjectStorage;

#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Multipart body split into text fields and files.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.files.push(UploadedFile {
                        field: name,
                        content_type,
                        bytes,
                    });
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    /// Parse a field holding a JSON document.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|v| serde_json::from_str::<T>(v))
            .transpose()
            .map_err(AppError::from)
    }

    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> {
        self.files.iter().filter(move |f| f.field == name)
    }

    /// Upload every file sent under `name` and return their URLs in order.
    pub async fn upload_all(
        &self,
        name: &str,
        storage: &ObjectStorage,
        folder: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut urls = Vec::new();
        for file in self.files_named(name) {
            urls.push(
                storage
                    .upload(file.bytes.clone(), &file.content_type, folder)
                    .await?,
            );
        }
        Ok(urls)
    }
}
