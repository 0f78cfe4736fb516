use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::{Database, LocalStorage};

enum StorageOp {
    Set { key: String, value: String },
    Get {
        key: String,
        reply: Sender<Result<Option<String>>>,
    },
    Flush(Sender<()>),
}

/// Owns a `Database` on a background thread so writes never block the
/// caller. Operations are applied in the order they were queued.
pub(crate) struct StorageWriter {
    tx: Option<Sender<StorageOp>>,
    handle: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl StorageWriter {
    pub(crate) fn spawn(db: Database) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<StorageOp>();
        let last_error = Arc::new(Mutex::new(None));
        let errors = Arc::clone(&last_error);

        let handle = thread::Builder::new()
            .name("predger-storage".into())
            .spawn(move || {
                for op in rx {
                    match op {
                        StorageOp::Set { key, value } => {
                            if let Err(e) = db.set_item(&key, &value) {
                                tracing::warn!(key = %key, error = %e, "local storage write failed");
                                *errors.lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some(format!("{e:#}"));
                            }
                        }
                        StorageOp::Get { key, reply } => {
                            let _ = reply.send(db.get_item(&key));
                        }
                        StorageOp::Flush(reply) => {
                            let _ = reply.send(());
                        }
                    }
                }
                tracing::debug!("storage writer stopped");
            })
            .context("Failed to start storage writer thread")?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            last_error,
        })
    }

    fn send(&self, op: StorageOp) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or_else(|| anyhow!("Storage writer is shut down"))?
            .send(op)
            .map_err(|_| anyhow!("Storage writer thread has exited"))
    }

    /// Block until every operation queued before this call has been applied.
    pub(crate) fn flush(&self) -> Result<()> {
        let (reply, done) = mpsc::channel();
        self.send(StorageOp::Flush(reply))?;
        done.recv().context("Storage writer exited before flushing")
    }
}

impl LocalStorage for StorageWriter {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let (reply, result) = mpsc::channel();
        self.send(StorageOp::Get {
            key: key.to_string(),
            reply,
        })?;
        result
            .recv()
            .context("Storage writer exited before answering")?
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.send(StorageOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn take_write_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("storage writer thread panicked");
            }
        }
    }
}
