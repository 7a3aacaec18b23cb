//! Two-phase upload orchestration over the session registry.
//!
//! Each operation locks its session only for the begin/finish bookkeeping;
//! the remote round trips run without any lock held.

use crate::errors::UploadError;
use crate::remote::BulkUploadApi;
use crate::schema::TransactionType;
use crate::session::{SessionSnapshot, UploadSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

pub struct Uploader {
    api: Arc<dyn BulkUploadApi>,
    sessions: RwLock<HashMap<String, Arc<Mutex<UploadSession>>>>,
}

impl Uploader {
    pub fn new(api: Arc<dyn BulkUploadApi>) -> Self {
        Self {
            api,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new idle session for one upload flow.
    pub fn create_session(&self, transaction_type: TransactionType) -> SessionSnapshot {
        let session = UploadSession::new(transaction_type);
        let snapshot = session.snapshot();
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        info!(
            "Opened upload session {} ({})",
            snapshot.id, snapshot.transaction_type
        );
        snapshot
    }

    fn session(&self, id: &str) -> Result<Arc<Mutex<UploadSession>>, UploadError> {
        self.sessions
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(UploadError::SessionNotFound)
    }

    pub fn snapshot(&self, id: &str) -> Result<SessionSnapshot, UploadError> {
        let handle = self.session(id)?;
        let session = handle.lock().unwrap();
        Ok(session.snapshot())
    }

    pub fn select_file(
        &self,
        id: &str,
        filename: &str,
        contents: String,
    ) -> Result<SessionSnapshot, UploadError> {
        let handle = self.session(id)?;
        let mut session = handle.lock().unwrap();
        session.select_file(filename, contents)?;
        info!(
            "Session {}: selected file \"{}\"",
            id,
            session.file.as_ref().map(|f| f.name.as_str()).unwrap_or("")
        );
        Ok(session.snapshot())
    }

    /// Run the validate-only pass: local header check, then the remote round
    /// trip. Row-level errors come back from the listings API.
    pub async fn validate(&self, id: &str) -> Result<SessionSnapshot, UploadError> {
        let handle = self.session(id)?;
        let request = {
            let mut session = handle.lock().unwrap();
            session.begin_validate()?
        };

        info!(
            "Session {}: validating {} bytes of CSV",
            id,
            request.csv_data.len()
        );
        match self.api.bulk_upload(&request).await {
            Ok(report) => {
                let mut session = handle.lock().unwrap();
                session.finish_validate(request, &report);
                info!(
                    "Session {}: validate pass done ({} total, {} valid, {} failed)",
                    id, report.total, report.successful, report.failed
                );
                Ok(session.snapshot())
            }
            Err(e) => {
                let mut session = handle.lock().unwrap();
                session.fail_validate();
                warn!("Session {}: validate pass failed: {:#}", id, e);
                Err(UploadError::Remote(e.to_string()))
            }
        }
    }

    /// Replay the validated payload with `validateOnly` off. A failure keeps
    /// the pending payload so the commit can be retried.
    pub async fn commit(&self, id: &str) -> Result<SessionSnapshot, UploadError> {
        let handle = self.session(id)?;
        let request = {
            let mut session = handle.lock().unwrap();
            session.begin_commit()?
        };

        info!("Session {}: committing validated upload", id);
        match self.api.bulk_upload(&request).await {
            Ok(report) => {
                let mut session = handle.lock().unwrap();
                session.finish_commit(&report);
                info!(
                    "Session {}: committed ({} inserted, {} skipped)",
                    id, report.successful, report.failed
                );
                Ok(session.snapshot())
            }
            Err(e) => {
                let mut session = handle.lock().unwrap();
                session.fail_commit();
                warn!("Session {}: commit failed: {:#}", id, e);
                Err(UploadError::Remote(e.to_string()))
            }
        }
    }

    pub fn reset(&self, id: &str) -> Result<SessionSnapshot, UploadError> {
        let handle = self.session(id)?;
        let mut session = handle.lock().unwrap();
        session.reset();
        info!("Session {}: reset", id);
        Ok(session.snapshot())
    }

    pub fn drop_session(&self, id: &str) -> Result<(), UploadError> {
        self.sessions
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(UploadError::SessionNotFound)
    }
}
