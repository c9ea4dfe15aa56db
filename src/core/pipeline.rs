use crate::core::codes::CodeAssigner;
use crate::core::dispatch::DispatchEngine;
use crate::core::roster::RosterLoader;
use crate::domain::model::{
    CertificateEntry, EventContext, FailedRecord, FailureStage, ParticipantRecord, ProgressEvent,
    RecordOutcome, RecordStatus, RosterEntry, RunState, RunSummary, TemplateLayout,
};
use crate::domain::ports::{CertificateRender, LayoutResolver, ProgressSink, Storage};
use crate::utils::error::{CertError, DispatchError, RenderError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Utc};
use image::RgbImage;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct RunInputs {
    pub roster: PathBuf,
    pub template: PathBuf,
}

pub async fn load_template(path: &Path) -> Result<RgbImage> {
    let data = tokio::fs::read(path).await?;
    let image = image::load_from_memory(&data)?.to_rgb8();
    tracing::info!(
        "🖼️ Template {} loaded ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Running counts for one run.
struct Tally {
    started_at: DateTime<Utc>,
    total: usize,
    generated: usize,
    sent: usize,
    failed: Vec<FailedRecord>,
    certificates: Vec<CertificateEntry>,
}

impl Tally {
    fn new(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total,
            generated: 0,
            sent: 0,
            failed: Vec::new(),
            certificates: Vec::new(),
        }
    }

    fn fail(&mut self, record: &mut ParticipantRecord, stage: FailureStage, reason: String) -> RecordOutcome {
        record.advance(RecordStatus::Failed);
        self.failed.push(FailedRecord {
            row_index: record.row_index,
            reason: reason.clone(),
        });
        RecordOutcome::Failed { stage, reason }
    }

    fn into_summary(self, layout: TemplateLayout) -> RunSummary {
        RunSummary {
            total: self.total,
            generated: self.generated,
            sent: self.sent,
            failed: self.failed,
            layout,
            certificates: self.certificates,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Drives one certificate run: roster, layout, then render and optionally send
/// each record in ascending row order.
///
/// `run` consumes the pipeline so the sender credentials held by the event
/// context and the mailer are dropped when the run ends.
pub struct CertificatePipeline<S: Storage> {
    storage: S,
    event: EventContext,
    renderer: Box<dyn CertificateRender>,
    resolver: Box<dyn LayoutResolver>,
    dispatcher: Option<DispatchEngine>,
    monitor: SystemMonitor,
    write_manifest: bool,
}

impl<S: Storage> CertificatePipeline<S> {
    pub fn new(
        storage: S,
        event: EventContext,
        renderer: Box<dyn CertificateRender>,
        resolver: Box<dyn LayoutResolver>,
    ) -> Self {
        Self {
            storage,
            event,
            renderer,
            resolver,
            dispatcher: None,
            monitor: SystemMonitor::new(false),
            write_manifest: false,
        }
    }

    pub fn with_dispatch(mut self, dispatcher: DispatchEngine) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub fn with_manifest(mut self, enabled: bool) -> Self {
        self.write_manifest = enabled;
        self
    }

    /// Sending needs both a dispatcher and sender credentials; otherwise the run is generate-only.
    pub fn is_sending(&self) -> bool {
        self.dispatcher.is_some() && self.event.sender.is_some()
    }

    pub async fn run(self, inputs: &RunInputs, sink: &mut dyn ProgressSink) -> Result<RunSummary> {
        sink.state_changed(RunState::LoadingRoster);
        let entries = match RosterLoader::load(&inputs.roster).await {
            Ok(entries) => entries,
            Err(e) => {
                sink.state_changed(RunState::Aborted);
                return Err(e);
            }
        };

        let template = match load_template(&inputs.template).await {
            Ok(template) => template,
            Err(e) => {
                sink.state_changed(RunState::Aborted);
                return Err(e);
            }
        };

        self.run_entries(entries, &template, sink).await
    }

    pub async fn run_entries(
        mut self,
        entries: Vec<RosterEntry>,
        template: &RgbImage,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunSummary> {
        let mut records = CodeAssigner::new(&self.event).assign(entries);
        self.monitor.log_phase("Roster loaded");

        sink.state_changed(RunState::ResolvingLayout);
        let layout = match self.resolver.resolve(template) {
            Ok(layout) => layout,
            Err(e) => {
                tracing::error!("❌ Layout resolution failed: {}", e);
                sink.state_changed(RunState::Aborted);
                return Err(e);
            }
        };

        if self.dispatcher.is_some() && self.event.sender.is_none() {
            tracing::warn!("⚠️ No sender credentials, running generate-only");
            self.dispatcher = None;
        }

        let sending = self.is_sending();
        tracing::info!(
            "🚀 Processing {} certificates ({})",
            records.len(),
            if sending { "generate + send" } else { "generate only" }
        );

        sink.state_changed(RunState::Processing);
        let mut tally = Tally::new(records.len());

        for record in records.iter_mut() {
            let outcome = match self.process_record(record, template, &layout, &mut tally).await {
                Ok(outcome) => outcome,
                Err(session) => {
                    let reason = session.to_string();
                    let outcome = tally.fail(record, FailureStage::Dispatch, reason.clone());
                    emit(sink, record, outcome);

                    tracing::error!("❌ Mail session failed, aborting remaining sends: {}", reason);
                    sink.state_changed(RunState::Aborted);
                    let summary = tally.into_summary(layout);
                    self.persist_manifest(&summary).await;
                    return Err(CertError::DispatchSession {
                        reason,
                        summary: Box::new(summary),
                    });
                }
            };
            emit(sink, record, outcome);
        }

        let summary = tally.into_summary(layout);
        self.persist_manifest(&summary).await;
        self.monitor.log_phase("Run finished");
        tracing::info!(
            "✅ Run complete: {}/{} generated, {} sent, {} failed",
            summary.generated,
            summary.total,
            summary.sent,
            summary.failed.len()
        );
        sink.state_changed(RunState::Completed);
        Ok(summary)
    }

    /// Record-scoped failures become a `Failed` outcome. Only a session-wide
    /// dispatch error is returned as `Err`.
    async fn process_record(
        &mut self,
        record: &mut ParticipantRecord,
        template: &RgbImage,
        layout: &TemplateLayout,
        tally: &mut Tally,
    ) -> std::result::Result<RecordOutcome, DispatchError> {
        let rendered = match self.renderer.render(template, layout, record) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("✗ Row {} ({}) render failed: {}", record.row_index, record.name, e);
                return Ok(tally.fail(record, FailureStage::Render, e.to_string()));
            }
        };

        if let Err(e) = self.storage.write_file(&rendered.file_name, &rendered.document).await {
            let e = RenderError::Write {
                path: rendered.file_name.clone(),
                reason: e.to_string(),
            };
            tracing::warn!("✗ Row {} ({}) {}", record.row_index, record.name, e);
            return Ok(tally.fail(record, FailureStage::Render, e.to_string()));
        }

        record.advance(RecordStatus::Rendered);
        tally.generated += 1;
        tally.certificates.push(CertificateEntry {
            row_index: record.row_index,
            name: record.name.clone(),
            code: record.code.clone(),
            file: rendered.file_name.clone(),
        });
        let path = self.event.output_directory.join(&rendered.file_name);
        tracing::info!("📄 Saved {} ({}px)", rendered.file_name, rendered.font_size);

        let Some(dispatcher) = self.dispatcher.as_mut() else {
            return Ok(RecordOutcome::Generated {
                path,
                font_size: rendered.font_size,
            });
        };

        if record.email_missing {
            tracing::warn!("⚠️ Row {} ({}) has no email, not sent", record.row_index, record.name);
            return Ok(RecordOutcome::Generated {
                path,
                font_size: rendered.font_size,
            });
        }

        match dispatcher.dispatch(&self.event, record, &rendered.file_name, &rendered.document).await {
            Ok(()) => {
                record.advance(RecordStatus::Sent);
                tally.sent += 1;
                tracing::info!("✓ Sent to {} <{}>", record.name, record.email);
                Ok(RecordOutcome::Sent {
                    path,
                    font_size: rendered.font_size,
                    recipient: record.email.clone(),
                })
            }
            Err(e) if e.is_session_wide() => Err(e),
            Err(e) => {
                tracing::warn!("✗ Failed for {} <{}>: {}", record.name, record.email, e);
                Ok(tally.fail(record, FailureStage::Dispatch, e.to_string()))
            }
        }
    }

    async fn persist_manifest(&self, summary: &RunSummary) {
        if !self.write_manifest {
            return;
        }
        let written = match serde_json::to_vec_pretty(summary) {
            Ok(json) => self.storage.write_file(MANIFEST_FILE, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            tracing::warn!("⚠️ Could not write {}: {}", MANIFEST_FILE, e);
        }
    }
}

fn emit(sink: &mut dyn ProgressSink, record: &ParticipantRecord, outcome: RecordOutcome) {
    sink.record_finished(&ProgressEvent {
        row_index: record.row_index,
        name: record.name.clone(),
        code: record.code.clone(),
        outcome,
    });
}
