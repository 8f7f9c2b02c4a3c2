//! Binary file storage.
//!
//! The classroom core only ever keeps [`FileRef`] handles; bytes live behind a
//! [`FileStorage`] implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::StorageError;

/// Opaque handle to a stored file.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FileRef(pub String);

impl FileRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension of the original upload name, if one was kept.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|it| it.to_str())
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[rocket::async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<FileRef, StorageError>;
    async fn fetch(&self, reference: &FileRef) -> Result<Vec<u8>, StorageError>;
    async fn remove(&self, reference: &FileRef) -> Result<(), StorageError>;
}

/// Keeps letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(96).collect()
    }
}

fn new_reference(name: &str) -> FileRef {
    FileRef(format!(
        "{}-{}",
        Uuid::new_v4().simple(),
        sanitize_file_name(name)
    ))
}

/// References produced here never contain path components.
fn is_plain_reference(reference: &FileRef) -> bool {
    let value = reference.as_str();
    !value.is_empty()
        && !value.starts_with('.')
        && !value.contains(['/', '\\'])
        && !value.contains("..")
}

#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
    max_bytes: u64,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> DirectoryStorage {
        DirectoryStorage {
            root: root.into(),
            max_bytes,
        }
    }

    fn path_of(&self, reference: &FileRef) -> Result<PathBuf, StorageError> {
        if is_plain_reference(reference) {
            Ok(self.root.join(reference.as_str()))
        } else {
            Err(StorageError::UnknownReference(reference.to_string()))
        }
    }
}

#[rocket::async_trait]
impl FileStorage for DirectoryStorage {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<FileRef, StorageError> {
        check_size(name, bytes.len(), self.max_bytes)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let reference = new_reference(name);
        tokio::fs::write(self.root.join(reference.as_str()), bytes).await?;

        tracing::debug!(%reference, "stored upload");
        Ok(reference)
    }

    async fn fetch(&self, reference: &FileRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(reference)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::UnknownReference(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, reference: &FileRef) -> Result<(), StorageError> {
        let path = self.path_of(reference)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<FileRef, Vec<u8>>>,
    max_bytes: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub fn with_limit(max_bytes: u64) -> MemoryStorage {
        MemoryStorage {
            files: RwLock::default(),
            max_bytes: Some(max_bytes),
        }
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }
}

#[rocket::async_trait]
impl FileStorage for MemoryStorage {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<FileRef, StorageError> {
        if let Some(limit) = self.max_bytes {
            check_size(name, bytes.len(), limit)?;
        }
        let reference = new_reference(name);
        self.files.write().await.insert(reference.clone(), bytes);
        Ok(reference)
    }

    async fn fetch(&self, reference: &FileRef) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::UnknownReference(reference.to_string()))
    }

    async fn remove(&self, reference: &FileRef) -> Result<(), StorageError> {
        self.files.write().await.remove(reference);
        Ok(())
    }
}

fn check_size(name: &str, size: usize, limit: u64) -> Result<(), StorageError> {
    let size = size as u64;
    if size > limit {
        return Err(StorageError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}
