use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 名冊中的一列，尚未分配驗證碼
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// 1-based position among data rows, counted before empty names are filtered.
    pub row_index: u32,
    pub name: String,
    pub email: String,
    pub email_missing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Rendered,
    Sent,
    Failed,
}

impl RecordStatus {
    fn can_move_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, Rendered) | (Pending, Failed) | (Rendered, Sent) | (Rendered, Failed)
        )
    }
}

/// A roster entry with its verification code. The code is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub row_index: u32,
    pub name: String,
    pub email: String,
    pub email_missing: bool,
    pub code: String,
    status: RecordStatus,
}

impl ParticipantRecord {
    pub fn new(entry: RosterEntry, code: String) -> Self {
        Self {
            row_index: entry.row_index,
            name: entry.name,
            email: entry.email,
            email_missing: entry.email_missing,
            code,
            status: RecordStatus::Pending,
        }
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Moves the status forward. Returns false and leaves the status untouched
    /// when the transition would go backwards or leave a terminal state.
    pub fn advance(&mut self, next: RecordStatus) -> bool {
        if self.status.can_move_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// Sender identity for a run. Held only in memory and dropped with the run.
#[derive(Clone)]
pub struct SenderCredentials {
    pub address: String,
    pub secret: String,
}

impl fmt::Debug for SenderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderCredentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_code: String,
    pub year: String,
    pub output_directory: PathBuf,
    pub sender: Option<SenderCredentials>,
    pub subject_template: Option<String>,
}

impl EventContext {
    pub fn new(event_code: impl Into<String>, year: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            event_code: event_code.into(),
            year: year.into(),
            output_directory: output_directory.into(),
            sender: None,
            subject_template: None,
        }
    }

    pub fn with_sender(mut self, sender: SenderCredentials) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject_template = Some(subject.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// `None` when the edge does not fit in `u32`.
    pub fn right(&self) -> Option<u32> {
        self.x.checked_add(self.width)
    }

    pub fn bottom(&self) -> Option<u32> {
        self.y.checked_add(self.height)
    }

    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }
}

/// The detected underline the name sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerBar {
    pub y: u32,
    pub x_start: u32,
    pub x_end: u32,
}

impl MarkerBar {
    pub fn len(&self) -> u32 {
        self.x_end - self.x_start + 1
    }
}

/// Name placement for a whole run. Text is centred horizontally in
/// `bounding_box` and its baseline sits on `baseline_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub bounding_box: BoundingBox,
    pub baseline_y: u32,
    pub marker: Option<MarkerBar>,
}

#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub file_name: String,
    pub document: Vec<u8>,
    pub font_size: f32,
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Render,
    Dispatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Generated { path: PathBuf, font_size: f32 },
    Sent { path: PathBuf, font_size: f32, recipient: String },
    Failed { stage: FailureStage, reason: String },
}

/// Pushed to the caller after every record, in ascending row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub row_index: u32,
    pub name: String,
    pub code: String,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    LoadingRoster,
    ResolvingLayout,
    Processing,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub row_index: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub row_index: u32,
    pub name: String,
    pub code: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub generated: usize,
    pub sent: usize,
    pub failed: Vec<FailedRecord>,
    pub layout: TemplateLayout,
    pub certificates: Vec<CertificateEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
