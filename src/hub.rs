//! Shared application state handed to the request layer.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DEFAULT_CODE_ATTEMPTS, DEFAULT_MAX_UPLOAD_BYTES};
use crate::board::Board;
use crate::data::memory::MemoryStore;
use crate::data::Store;
use crate::error::{ClassError, ClassResult, StorageError};
use crate::invite::Invitations;
use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::storage::{FileRef, FileStorage, MemoryStorage};
use crate::thread::Threads;

/// An uploaded file before it is handed to [`FileStorage`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct Classhub {
    store: Arc<dyn Store>,
    files: Arc<dyn FileStorage>,
    clock: Arc<dyn Clock>,
    code_attempts: u32,
    max_upload_bytes: u64,
}

impl Classhub {
    pub fn new(
        store: Arc<dyn Store>,
        files: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Classhub {
        Classhub {
            store,
            files,
            clock,
            code_attempts: config.code_attempts,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Memory store, memory files and the system clock.
    pub fn in_memory() -> Classhub {
        Classhub {
            store: Arc::new(MemoryStore::new()),
            files: Arc::new(MemoryStorage::new()),
            clock: Arc::new(SystemClock),
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Classhub {
        self.clock = clock;
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FileStorage>) -> Classhub {
        self.files = files;
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn files(&self) -> &dyn FileStorage {
        self.files.as_ref()
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn registry(&self) -> Registry<'_, dyn Store> {
        Registry::new(self.store.as_ref(), self.clock.as_ref()).code_attempts(self.code_attempts)
    }

    pub fn ledger(&self) -> Ledger<'_, dyn Store> {
        Ledger::new(self.store.as_ref(), self.clock.as_ref())
    }

    pub fn board(&self) -> Board<'_, dyn Store> {
        Board::new(self.store.as_ref(), self.clock.as_ref())
    }

    pub fn threads(&self) -> Threads<'_, dyn Store> {
        Threads::new(self.store.as_ref(), self.clock.as_ref())
    }

    pub fn invitations(&self) -> Invitations<'_, dyn Store> {
        Invitations::new(self.store.as_ref(), self.clock.as_ref())
    }

    /// Stores every upload or none of them.
    pub async fn store_uploads(&self, uploads: Vec<Upload>) -> ClassResult<Vec<FileRef>> {
        let mut stored = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let size = upload.bytes.len() as u64;
            let result = if size > self.max_upload_bytes {
                Err(StorageError::TooLarge {
                    name: upload.name,
                    size,
                    limit: self.max_upload_bytes,
                })
            } else {
                self.files.store(&upload.name, upload.bytes).await
            };

            match result {
                Ok(reference) => stored.push(reference),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(match e {
                        StorageError::TooLarge { .. } => ClassError::validation(e),
                        other => other.into(),
                    });
                }
            }
        }

        Ok(stored)
    }

    /// Best effort removal of files no record ended up pointing at.
    pub async fn discard(&self, files: &[FileRef]) {
        for reference in files {
            if let Err(e) = self.files.remove(reference).await {
                tracing::warn!(%reference, error = %e, "unable to remove orphaned upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, size: usize) -> Upload {
        Upload {
            name: name.to_string(),
            bytes: vec![7; size],
        }
    }

    #[rocket::async_test]
    async fn oversized_uploads_store_nothing() {
        let files = Arc::new(MemoryStorage::new());
        let mut hub = Classhub::in_memory().with_files(files.clone());
        hub.max_upload_bytes = 16;

        let result = hub
            .store_uploads(vec![upload("small.txt", 8), upload("big.bin", 32)])
            .await;

        assert!(matches!(result, Err(ClassError::Validation(_))));
        assert_eq!(files.len().await, 0);
    }

    #[rocket::async_test]
    async fn uploads_round_trip() {
        let hub = Classhub::in_memory();
        let stored = hub
            .store_uploads(vec![upload("a.txt", 3), upload("b.txt", 4)])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(hub.files().fetch(&stored[1]).await.unwrap().len(), 4);

        hub.discard(&stored).await;
        assert!(hub.files().fetch(&stored[0]).await.is_err());
    }
}
