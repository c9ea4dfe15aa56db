use crate::domain::model::{
    OutgoingMail, ParticipantRecord, ProgressEvent, RenderedCertificate, RunState, TemplateLayout,
};
use crate::utils::error::{DispatchError, RenderError, Result};
use async_trait::async_trait;
use image::RgbImage;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Font measurement in pixels at a given size.
pub trait TextMetrics: Send + Sync {
    fn text_width(&self, text: &str, size: f32) -> f32;
    fn ascent(&self, size: f32) -> f32;
    fn line_height(&self, size: f32) -> f32;
}

/// Finds where the participant name goes on a template.
pub trait LayoutResolver: Send + Sync {
    fn resolve(&self, template: &RgbImage) -> Result<TemplateLayout>;
}

pub trait CertificateRender: Send + Sync {
    fn render(
        &self,
        template: &RgbImage,
        layout: &TemplateLayout,
        record: &ParticipantRecord,
    ) -> std::result::Result<RenderedCertificate, RenderError>;
}

/// Outbound mail service. `&mut self` gives each send exclusive use of the session.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn authenticate(&mut self) -> std::result::Result<(), DispatchError>;
    async fn send(&mut self, mail: &OutgoingMail) -> std::result::Result<(), DispatchError>;
}

/// Receives progress synchronously, in row order.
pub trait ProgressSink: Send {
    fn record_finished(&mut self, event: &ProgressEvent);

    fn state_changed(&mut self, _state: RunState) {}
}

impl ProgressSink for Vec<ProgressEvent> {
    fn record_finished(&mut self, event: &ProgressEvent) {
        self.push(event.clone());
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn record_finished(&mut self, event: &ProgressEvent) {
        // 接收端關閉時不影響批次處理
        if self.send(event.clone()).is_err() {
            tracing::debug!("Progress receiver dropped, row {} not delivered", event.row_index);
        }
    }
}
