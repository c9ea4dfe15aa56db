pub mod codes;
pub mod dispatch;
pub mod layout;
pub mod pipeline;
pub mod render;
pub mod roster;

pub use crate::domain::model::{ParticipantRecord, RunSummary, TemplateLayout};
pub use crate::domain::ports::{CertificateRender, LayoutResolver, Mailer, ProgressSink, Storage};
pub use crate::utils::error::Result;
