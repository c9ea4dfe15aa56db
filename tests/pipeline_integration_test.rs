use anyhow::Result;
use async_trait::async_trait;
use cert_mailer::core::dispatch::{DispatchEngine, DispatchSettings};
use cert_mailer::core::layout::{MarkerBarResolver, MarkerSettings};
use cert_mailer::core::pipeline::MANIFEST_FILE;
use cert_mailer::core::render::{certificate_file_name, export_pdf};
use cert_mailer::core::roster::RosterLoader;
use cert_mailer::domain::model::{
    EventContext, OutgoingMail, ParticipantRecord, ProgressEvent, RecordOutcome, RenderedCertificate,
    RunSummary, SenderCredentials, TemplateLayout,
};
use cert_mailer::domain::ports::{CertificateRender, Mailer};
use cert_mailer::utils::error::{DispatchError, RenderError};
use cert_mailer::{CertError, CertificatePipeline, LocalStorage, RunInputs};
use image::{Rgb, RgbImage};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Exports the template as-is, stamped with the layout's box as a black rectangle.
struct BoxStampRenderer;

impl CertificateRender for BoxStampRenderer {
    fn render(
        &self,
        template: &RgbImage,
        layout: &TemplateLayout,
        record: &ParticipantRecord,
    ) -> Result<RenderedCertificate, RenderError> {
        let mut image = template.clone();
        let b = layout.bounding_box;
        for x in b.x..b.x + b.width {
            image.put_pixel(x, b.y, Rgb([0, 0, 0]));
        }
        Ok(RenderedCertificate {
            file_name: certificate_file_name(&record.name, &record.code),
            document: export_pdf(&image, 300.0, &record.code)?,
            font_size: 60.0,
        })
    }
}

#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn authenticate(&mut self) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn send(&mut self, mail: &OutgoingMail) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

fn write_template(path: &Path) -> Result<()> {
    let mut img = RgbImage::from_pixel(1200, 900, Rgb([250, 248, 240]));
    // 底線
    for y in 450..453 {
        for x in 300..900 {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    img.save(path)?;
    Ok(())
}

fn pipeline(output: &Path) -> CertificatePipeline<LocalStorage> {
    CertificatePipeline::new(
        LocalStorage::new(output),
        EventContext::new("quiz", "25", output),
        Box::new(BoxStampRenderer),
        Box::new(MarkerBarResolver::new(MarkerSettings::default(), 48.0)),
    )
}

#[tokio::test]
async fn test_generate_run_writes_pdfs_and_manifest() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.csv");
    let template = dir.path().join("template.png");
    let output = dir.path().join("out");

    std::fs::write(
        &roster,
        " Name , Email \nAda Lovelace,ada@example.com\n,ghost@example.com\nGrace Hopper,\n",
    )?;
    write_template(&template)?;

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = pipeline(&output)
        .with_manifest(true)
        .run(&RunInputs { roster, template }, &mut events)
        .await?;

    // 空白名字那列被略過，但列號不重排
    assert_eq!(summary.total, 2);
    assert_eq!(summary.generated, 2);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.layout.baseline_y, 425);

    let first = output.join("Ada Lovelace_quiz-25-001.pdf");
    let third = output.join("Grace Hopper_quiz-25-003.pdf");
    assert!(std::fs::read(&first)?.starts_with(b"%PDF"));
    assert!(third.exists());

    let manifest: RunSummary = serde_json::from_slice(&std::fs::read(output.join(MANIFEST_FILE))?)?;
    assert_eq!(manifest.certificates.len(), 2);
    assert_eq!(manifest.certificates[1].row_index, 3);

    assert_eq!(events.len(), 2);
    match &events[0].outcome {
        RecordOutcome::Generated { path, .. } => assert_eq!(path, &first),
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_send_run_over_tsv_roster() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.tsv");
    let template = dir.path().join("template.png");
    let output = dir.path().join("out");

    std::fs::write(
        &roster,
        "name\temail\nAda Lovelace\tada@example.com\nAlan Turing\t\nGrace Hopper\tgrace@example.com\n",
    )?;
    write_template(&template)?;

    let mailer = RecordingMailer::default();
    let engine = DispatchEngine::new(
        Box::new(mailer.clone()),
        DispatchSettings {
            send_timeout: Duration::from_secs(5),
            send_interval: Duration::ZERO,
        },
    );
    let event = EventContext::new("quiz", "25", &output)
        .with_subject("Certificate for {name}")
        .with_sender(SenderCredentials {
            address: "events@example.org".to_string(),
            secret: "app-password".to_string(),
        });
    let pipeline = CertificatePipeline::new(
        LocalStorage::new(&output),
        event,
        Box::new(BoxStampRenderer),
        Box::new(MarkerBarResolver::new(MarkerSettings::default(), 48.0)),
    )
    .with_dispatch(engine);

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = pipeline.run(&RunInputs { roster, template }, &mut events).await?;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.sent, 2);
    assert!(summary.failed.is_empty());

    let sent = mailer.sent.lock().unwrap();
    let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
    assert_eq!(recipients, vec!["ada@example.com", "grace@example.com"]);
    assert_eq!(sent[0].subject, "Certificate for Ada Lovelace");
    assert_eq!(sent[1].attachment_name, "Grace Hopper_quiz-25-003.pdf");
    assert!(sent[1].attachment.starts_with(b"%PDF"));
    Ok(())
}

#[tokio::test]
async fn test_roster_without_email_column_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.csv");
    let template = dir.path().join("template.png");
    let output = dir.path().join("out");

    std::fs::write(&roster, "Name,Phone\nAda Lovelace,555-0100\n")?;
    write_template(&template)?;

    let mut events: Vec<ProgressEvent> = Vec::new();
    let err = pipeline(&output)
        .run(&RunInputs { roster, template }, &mut events)
        .await
        .unwrap_err();

    assert!(matches!(err, CertError::MalformedRoster { .. }));
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_template_without_marker_writes_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.csv");
    let template = dir.path().join("blank.png");
    let output = dir.path().join("out");

    std::fs::write(&roster, "Name,Email\nAda Lovelace,ada@example.com\n")?;
    RgbImage::from_pixel(1200, 900, Rgb([255, 255, 255])).save(&template)?;

    let mut events: Vec<ProgressEvent> = Vec::new();
    let err = pipeline(&output)
        .run(&RunInputs { roster, template }, &mut events)
        .await
        .unwrap_err();

    assert!(matches!(err, CertError::LayoutNotFound { .. }));
    assert!(events.is_empty());
    assert!(!output.exists());
    Ok(())
}

fn write_workbook(path: &Path, rows: &[(&str, &str)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Name")?;
    sheet.write_string(0, 1, " email ")?;
    for (i, (name, email)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        // 空字串不寫入，讓儲存格保持空白
        if !name.is_empty() {
            sheet.write_string(row, 0, *name)?;
        }
        if !email.is_empty() {
            sheet.write_string(row, 1, *email)?;
        }
    }
    workbook.save(path)?;
    Ok(())
}

#[tokio::test]
async fn test_xlsx_roster_uses_the_same_row_rules() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.xlsx");
    write_workbook(
        &roster,
        &[
            ("Ada Lovelace", "ada@example.com"),
            ("", "ghost@example.com"),
            ("Grace Hopper", ""),
        ],
    )?;

    let entries = RosterLoader::load(&roster).await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].row_index, 1);
    assert_eq!(entries[0].email, "ada@example.com");
    assert!(!entries[0].email_missing);
    assert_eq!(entries[1].row_index, 3);
    assert_eq!(entries[1].name, "Grace Hopper");
    assert!(entries[1].email_missing);
    Ok(())
}

#[tokio::test]
async fn test_generate_run_over_xlsx_roster() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.xlsx");
    let template = dir.path().join("template.png");
    let output = dir.path().join("out");

    write_workbook(&roster, &[("Ada Lovelace", "ada@example.com"), ("Alan Turing", "")])?;
    write_template(&template)?;

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = pipeline(&output)
        .run(&RunInputs { roster, template }, &mut events)
        .await?;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.generated, 2);
    assert!(output.join("Alan Turing_quiz-25-002.pdf").exists());
    Ok(())
}

#[tokio::test]
async fn test_xlsx_roster_without_name_column_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let roster = dir.path().join("participants.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Email")?;
    sheet.write_string(1, 0, "ada@example.com")?;
    workbook.save(&roster)?;

    let err = RosterLoader::load(&roster).await.unwrap_err();
    match err {
        CertError::MalformedRoster { message } => assert!(message.contains("Name")),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}
