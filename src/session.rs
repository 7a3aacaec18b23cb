//! Upload session state machine for the two-phase bulk upload flow.
//!
//! A session moves Idle → FileSelected → Validating → Validated →
//! Committing → Committed. The transient Validating/Committing states double
//! as the single-flight guard: every mutation here runs inside a short
//! non-awaiting critical section, and the remote round trips happen between
//! `begin_*` and `finish_*`/`fail_*` without holding the session lock.

use crate::errors::UploadError;
use crate::parser::parse_csv;
use crate::remote::{BulkUploadReport, BulkUploadRequest};
use crate::schema::TransactionType;
use crate::validator::{self, ErrorKind, ValidationError};
use serde::Serialize;
use uuid::Uuid;

/// How a validate pass turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationVerdict {
    AllValid,
    PartiallyValid,
    AllInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FileSelected,
    Validating,
    Validated(ValidationVerdict),
    Committing,
    Committed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::FileSelected => "file_selected",
            SessionState::Validating => "validating",
            SessionState::Validated(_) => "validated",
            SessionState::Committing => "committing",
            SessionState::Committed => "committed",
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self, SessionState::Validating | SessionState::Committing)
    }
}

/// The selected upload file, read fully into memory.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub contents: String,
}

/// Exact payload to replay on commit, captured from a successful
/// validate-only pass.
#[derive(Debug, Clone)]
pub struct PendingCommit {
    pub csv_data: String,
    pub transaction_type: String,
    pub valid_count: usize,
    pub error_count: usize,
}

/// Aggregate result of the last validate or commit pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<ValidationError>,
    /// Valid row payloads echoed back by the listings API.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_rows: Vec<serde_json::Value>,
    pub uploaded: bool,
}

/// Read-only view of a session, serialized for API consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub transaction_type: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ValidationVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<UploadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_commit: Option<PendingCommitSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommitSummary {
    pub valid_count: usize,
    pub error_count: usize,
}

#[derive(Debug)]
pub struct UploadSession {
    pub id: String,
    pub transaction_type: TransactionType,
    pub state: SessionState,
    pub file: Option<SelectedFile>,
    pub outcome: Option<UploadOutcome>,
    pub pending: Option<PendingCommit>,
}

impl UploadSession {
    pub fn new(transaction_type: TransactionType) -> Self {
        Self {
            id: format!("ses_{}", Uuid::new_v4().simple()),
            transaction_type,
            state: SessionState::Idle,
            file: None,
            outcome: None,
            pending: None,
        }
    }

    /// Select an upload file. Rejects anything without a `.csv` suffix
    /// (case-sensitive) without touching state; on success, prior results
    /// and any pending commit are invalidated.
    pub fn select_file(&mut self, filename: &str, contents: String) -> Result<(), UploadError> {
        if self.state.in_flight() {
            return Err(UploadError::OperationInFlight);
        }
        if !filename.ends_with(".csv") {
            return Err(UploadError::InvalidFileType(filename.to_string()));
        }

        self.file = Some(SelectedFile {
            name: filename.to_string(),
            contents,
        });
        self.outcome = None;
        self.pending = None;
        self.state = SessionState::FileSelected;
        Ok(())
    }

    /// Start a validate pass: parse the selected file, check its header row
    /// against the schema, and hand back the validate-only request to send.
    /// A header mismatch aborts before any remote traffic, leaving state
    /// untouched.
    pub fn begin_validate(&mut self) -> Result<BulkUploadRequest, UploadError> {
        if self.state.in_flight() {
            return Err(UploadError::OperationInFlight);
        }
        if self.state == SessionState::Committed {
            return Err(UploadError::AlreadyCommitted);
        }
        let file = self.file.as_ref().ok_or(UploadError::NoFileSelected)?;

        let parsed = parse_csv(&file.contents);
        let missing = validator::validate_headers(&parsed.headers, self.transaction_type.fields());
        if !missing.is_empty() {
            return Err(UploadError::TemplateMismatch(missing));
        }

        self.state = SessionState::Validating;
        Ok(BulkUploadRequest {
            csv_data: file.contents.clone(),
            transaction_type: self.transaction_type.api_label().to_string(),
            validate_only: true,
        })
    }

    /// Apply a successful validate-only response. A stale completion (the
    /// session was reset or replaced while the call was in flight) is
    /// discarded.
    pub fn finish_validate(&mut self, request: BulkUploadRequest, report: &BulkUploadReport) {
        if self.state != SessionState::Validating {
            return;
        }

        let outcome = UploadOutcome {
            total: report.total,
            successful: report.successful,
            failed: report.failed,
            errors: flatten_remote_errors(report),
            valid_rows: report.valid_rows.clone(),
            uploaded: false,
        };
        let verdict = verdict_for(&outcome);

        self.pending = (report.successful > 0).then(|| PendingCommit {
            csv_data: request.csv_data,
            transaction_type: request.transaction_type,
            valid_count: report.successful,
            error_count: report.failed,
        });
        self.outcome = Some(outcome);
        self.state = SessionState::Validated(verdict);
    }

    /// Roll back a failed validate pass. The selected file and any prior
    /// results stay intact so the user can retry.
    pub fn fail_validate(&mut self) {
        if self.state == SessionState::Validating {
            self.state = SessionState::FileSelected;
        }
    }

    /// Start a commit pass, replaying the exact payload captured by the
    /// validate pass with `validateOnly` flipped off.
    pub fn begin_commit(&mut self) -> Result<BulkUploadRequest, UploadError> {
        if self.state.in_flight() {
            return Err(UploadError::OperationInFlight);
        }
        if self.state == SessionState::Committed {
            return Err(UploadError::AlreadyCommitted);
        }
        let pending = self.pending.as_ref().ok_or(UploadError::NothingToCommit)?;

        let request = BulkUploadRequest {
            csv_data: pending.csv_data.clone(),
            transaction_type: pending.transaction_type.clone(),
            validate_only: false,
        };
        self.state = SessionState::Committing;
        Ok(request)
    }

    /// Apply a successful commit response and clear the pending payload.
    pub fn finish_commit(&mut self, report: &BulkUploadReport) {
        if self.state != SessionState::Committing {
            return;
        }

        self.outcome = Some(UploadOutcome {
            total: report.total,
            successful: report.successful,
            failed: report.failed,
            errors: flatten_remote_errors(report),
            valid_rows: report.valid_rows.clone(),
            uploaded: true,
        });
        self.pending = None;
        self.state = SessionState::Committed;
    }

    /// Roll back a failed commit. The pending payload stays intact so the
    /// commit can be retried.
    pub fn fail_commit(&mut self) {
        if self.state == SessionState::Committing {
            let verdict = self
                .outcome
                .as_ref()
                .map(verdict_for)
                .unwrap_or(ValidationVerdict::AllValid);
            self.state = SessionState::Validated(verdict);
        }
    }

    /// Return to Idle from any state, clearing the file, results and
    /// pending commit.
    pub fn reset(&mut self) {
        self.file = None;
        self.outcome = None;
        self.pending = None;
        self.state = SessionState::Idle;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let verdict = match self.state {
            SessionState::Validated(v) => Some(v),
            _ => None,
        };
        SessionSnapshot {
            id: self.id.clone(),
            transaction_type: self.transaction_type.api_label().to_string(),
            state: self.state.name(),
            verdict,
            file_name: self.file.as_ref().map(|f| f.name.clone()),
            outcome: self.outcome.clone(),
            pending_commit: self.pending.as_ref().map(|p| PendingCommitSummary {
                valid_count: p.valid_count,
                error_count: p.error_count,
            }),
        }
    }
}

fn verdict_for(outcome: &UploadOutcome) -> ValidationVerdict {
    if outcome.successful == 0 {
        ValidationVerdict::AllInvalid
    } else if outcome.failed == 0 {
        ValidationVerdict::AllValid
    } else {
        ValidationVerdict::PartiallyValid
    }
}

/// Collapse each remote row's field-level errors into one display entry:
/// comma-joined messages plus the list of offending fields.
fn flatten_remote_errors(report: &BulkUploadReport) -> Vec<ValidationError> {
    report
        .errors
        .iter()
        .map(|row| ValidationError {
            row_number: row.row,
            kind: ErrorKind::Remote,
            message: row
                .errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join(", "),
            fields: row.errors.iter().map(|e| e.field.clone()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FieldError, RowErrors};

    fn lease_session_with_file(contents: &str) -> UploadSession {
        let mut session = UploadSession::new(TransactionType::Lease);
        session
            .select_file("listings.csv", contents.to_string())
            .unwrap();
        session
    }

    fn report(total: usize, successful: usize, failed: usize) -> BulkUploadReport {
        BulkUploadReport {
            total,
            successful,
            failed,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_file_requires_csv_suffix() {
        let mut session = UploadSession::new(TransactionType::Lease);

        let err = session.select_file("data.txt", String::new()).unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileType(_)));
        assert_eq!(session.state, SessionState::Idle);

        // Suffix check is case-sensitive
        let err = session.select_file("data.CSV", String::new()).unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileType(_)));
        assert_eq!(session.state, SessionState::Idle);

        session.select_file("data.csv", String::new()).unwrap();
        assert_eq!(session.state, SessionState::FileSelected);
    }

    #[test]
    fn test_selecting_new_file_invalidates_pending_commit() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(2, 2, 0));
        assert!(session.pending.is_some());

        session
            .select_file("other.csv", format!("{}\n", header))
            .unwrap();
        assert!(session.pending.is_none());
        assert!(session.outcome.is_none());
        assert_eq!(session.state, SessionState::FileSelected);
    }

    #[test]
    fn test_validate_requires_a_file() {
        let mut session = UploadSession::new(TransactionType::Lease);
        assert!(matches!(
            session.begin_validate().unwrap_err(),
            UploadError::NoFileSelected
        ));
    }

    #[test]
    fn test_header_mismatch_aborts_without_state_change() {
        let mut session = lease_session_with_file("Project Name,Zone Name\nx,y\n");
        let err = session.begin_validate().unwrap_err();
        match err {
            UploadError::TemplateMismatch(missing) => {
                assert!(missing.contains(&"Block Name".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(session.state, SessionState::FileSelected);
    }

    #[test]
    fn test_validate_outcome_and_pending_commit() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        assert_eq!(session.state, SessionState::Validating);
        assert!(request.validate_only);
        assert_eq!(request.transaction_type, "Lease");

        let mut remote_report = report(5, 3, 2);
        remote_report.errors = vec![RowErrors {
            row: 3,
            errors: vec![
                FieldError {
                    field: "Bedrooms".to_string(),
                    message: "Bedrooms must be a number".to_string(),
                },
                FieldError {
                    field: "Currency".to_string(),
                    message: "Missing required fields: Currency".to_string(),
                },
            ],
        }];
        session.finish_validate(request, &remote_report);

        assert_eq!(
            session.state,
            SessionState::Validated(ValidationVerdict::PartiallyValid)
        );
        let outcome = session.outcome.as_ref().unwrap();
        assert_eq!((outcome.total, outcome.successful, outcome.failed), (5, 3, 2));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row_number, 3);
        assert_eq!(outcome.errors[0].kind, ErrorKind::Remote);
        assert_eq!(
            outcome.errors[0].message,
            "Bedrooms must be a number, Missing required fields: Currency"
        );
        assert_eq!(outcome.errors[0].fields, vec!["Bedrooms", "Currency"]);

        let pending = session.pending.as_ref().unwrap();
        assert_eq!(pending.valid_count, 3);
        assert_eq!(pending.error_count, 2);
    }

    #[test]
    fn test_all_invalid_creates_no_pending_commit() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(2, 0, 2));

        assert_eq!(
            session.state,
            SessionState::Validated(ValidationVerdict::AllInvalid)
        );
        assert!(session.pending.is_none());
        assert!(matches!(
            session.begin_commit().unwrap_err(),
            UploadError::NothingToCommit
        ));
    }

    #[test]
    fn test_failed_validate_preserves_prior_results() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(3, 3, 0));

        // Re-run that fails at the remote
        session.begin_validate().unwrap();
        session.fail_validate();

        assert_eq!(session.state, SessionState::FileSelected);
        assert!(session.file.is_some());
        assert_eq!(session.outcome.as_ref().unwrap().successful, 3);
    }

    #[test]
    fn test_commit_replays_validated_payload() {
        let header = TransactionType::Lease.fields().join(",");
        let contents = format!("{}\n", header);
        let mut session = lease_session_with_file(&contents);

        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(3, 3, 0));

        let commit = session.begin_commit().unwrap();
        assert!(!commit.validate_only);
        assert_eq!(commit.csv_data, contents);
        assert_eq!(commit.transaction_type, "Lease");
        assert_eq!(session.state, SessionState::Committing);

        session.finish_commit(&report(3, 3, 0));
        assert_eq!(session.state, SessionState::Committed);
        assert!(session.pending.is_none());
        assert!(session.outcome.as_ref().unwrap().uploaded);

        // Terminal until reset
        assert!(matches!(
            session.begin_validate().unwrap_err(),
            UploadError::AlreadyCommitted
        ));
    }

    #[test]
    fn test_failed_commit_keeps_pending_for_retry() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(4, 2, 2));

        session.begin_commit().unwrap();
        session.fail_commit();

        assert_eq!(
            session.state,
            SessionState::Validated(ValidationVerdict::PartiallyValid)
        );
        assert!(session.pending.is_some());

        // Retry succeeds
        session.begin_commit().unwrap();
        session.finish_commit(&report(4, 2, 2));
        assert_eq!(session.state, SessionState::Committed);
    }

    #[test]
    fn test_single_flight_guard() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        session.begin_validate().unwrap();
        assert!(matches!(
            session.begin_validate().unwrap_err(),
            UploadError::OperationInFlight
        ));
        assert!(matches!(
            session.begin_commit().unwrap_err(),
            UploadError::OperationInFlight
        ));
        assert!(matches!(
            session
                .select_file("new.csv", String::new())
                .unwrap_err(),
            UploadError::OperationInFlight
        ));
    }

    #[test]
    fn test_stale_completion_after_reset_is_discarded() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));

        let request = session.begin_validate().unwrap();
        session.reset();
        session.finish_validate(request, &report(3, 3, 0));

        assert_eq!(session.state, SessionState::Idle);
        assert!(session.outcome.is_none());
        assert!(session.pending.is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let header = TransactionType::Lease.fields().join(",");
        let mut session = lease_session_with_file(&format!("{}\n", header));
        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(1, 1, 0));

        session.reset();
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.file.is_none());
        assert!(session.outcome.is_none());
        assert!(session.pending.is_none());
    }

    #[test]
    fn test_snapshot_shape() {
        let header = TransactionType::Sale.fields().join(",");
        let mut session = UploadSession::new(TransactionType::Sale);
        session
            .select_file("sale.csv", format!("{}\n", header))
            .unwrap();
        let request = session.begin_validate().unwrap();
        session.finish_validate(request, &report(2, 2, 0));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, "validated");
        assert_eq!(snapshot.verdict, Some(ValidationVerdict::AllValid));
        assert_eq!(snapshot.transaction_type, "Sale");
        assert_eq!(snapshot.file_name.as_deref(), Some("sale.csv"));
        assert_eq!(snapshot.pending_commit.as_ref().unwrap().valid_count, 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "validated");
        assert_eq!(json["verdict"], "all_valid");
        assert_eq!(json["pendingCommit"]["validCount"], 2);
    }
}
