use cert_mailer::adapters::fonts::FontAssets;
use cert_mailer::adapters::smtp::SmtpMailer;
use cert_mailer::core::codes::CodeAssigner;
use cert_mailer::core::dispatch::DispatchEngine;
use cert_mailer::core::layout::{FixedLayoutResolver, MarkerBarResolver};
use cert_mailer::core::pipeline::load_template;
use cert_mailer::core::render::TemplateRenderer;
use cert_mailer::core::roster::RosterLoader;
use cert_mailer::domain::model::{ProgressEvent, RecordOutcome, RunState, RunSummary};
use cert_mailer::domain::ports::{LayoutResolver, ProgressSink};
use cert_mailer::utils::error::{CertError, ErrorSeverity};
use cert_mailer::utils::logger;
use cert_mailer::utils::validation::{validate_required_field, Validate};
use cert_mailer::{CertConfig, CertificatePipeline, Cli, Command, LocalStorage, Result, RunInputs};
use clap::Parser;

const PREVIEW_FILE: &str = "preview.png";

/// Prints one line per finished record.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn record_finished(&mut self, event: &ProgressEvent) {
        let status = match &event.outcome {
            RecordOutcome::Generated { path, .. } => format!("📄 {}", path.display()),
            RecordOutcome::Sent { recipient, .. } => format!("📧 sent to {}", recipient),
            RecordOutcome::Failed { stage, reason } => format!("❌ {:?} failed: {}", stage, reason),
        };
        println!("[{}] {} ({}) {}", event.row_index, event.name, event.code, status);
    }

    fn state_changed(&mut self, state: RunState) {
        tracing::debug!("Run state: {:?}", state);
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Total: {}", summary.total);
    println!("✅ Generated: {}", summary.generated);
    println!("📧 Sent: {}", summary.sent);
    println!("❌ Failed: {}", summary.failed.len());
    for failed in &summary.failed {
        println!("   row {}: {}", failed.row_index, failed.reason);
    }
    println!("⏱️ Took {}s", (summary.finished_at - summary.started_at).num_seconds());
}

fn load_config(cli: &Cli) -> Result<CertConfig> {
    let mut config = CertConfig::from_file(&cli.config)?;

    // 命令列參數優先於設定檔
    if let Some(roster) = &cli.roster {
        config.input.roster = roster.display().to_string();
    }
    if let Some(template) = &cli.template {
        config.input.template = template.display().to_string();
    }
    if let Some(output) = &cli.output {
        config.output.directory = output.display().to_string();
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    tracing::debug!("Config: {:?}", config);

    let fonts = FontAssets::load(&config.name_font_path(), &config.code_font_path()).await?;
    let render_settings = config.render_settings();
    let resolver: Box<dyn LayoutResolver> = match config.fixed_box() {
        Some(bounding_box) => {
            tracing::info!("📐 Using fixed name box from config");
            Box::new(FixedLayoutResolver::new(bounding_box))
        }
        None => Box::new(MarkerBarResolver::for_font(
            config.marker_settings(),
            &fonts.name,
            render_settings.sizing.max,
        )),
    };
    let renderer = TemplateRenderer::new(fonts, render_settings);

    if cli.command == Command::Preview {
        return preview(&config, resolver.as_ref(), &renderer).await;
    }

    let mut event = config.event_context();
    let storage = LocalStorage::new(config.output_directory());
    let mut pipeline_dispatch = None;

    if cli.command == Command::Send {
        let smtp = validate_required_field("smtp", &config.smtp)?;
        let sender = smtp.credentials();
        event = event.with_sender(sender.clone());
        let mailer = SmtpMailer::new(smtp.settings(), sender);
        pipeline_dispatch = Some(DispatchEngine::new(Box::new(mailer), config.dispatch_settings()));
    }

    let mut pipeline = CertificatePipeline::new(storage, event, Box::new(renderer), resolver)
        .with_monitoring(cli.monitor)
        .with_manifest(config.output.write_manifest);
    if let Some(dispatcher) = pipeline_dispatch {
        pipeline = pipeline.with_dispatch(dispatcher);
    }

    let inputs = RunInputs {
        roster: config.roster_path(),
        template: config.template_path(),
    };
    let mut progress = ConsoleProgress;

    match pipeline.run(&inputs, &mut progress).await {
        Ok(summary) => {
            print_summary(&summary);
            println!("📁 Output saved to: {}", config.output.directory);
            Ok(())
        }
        Err(CertError::DispatchSession { reason, summary }) => {
            print_summary(&summary);
            Err(CertError::DispatchSession { reason, summary })
        }
        Err(e) => Err(e),
    }
}

/// Renders the first record only and writes it as a PNG.
async fn preview(config: &CertConfig, resolver: &dyn LayoutResolver, renderer: &TemplateRenderer) -> Result<()> {
    let entries = RosterLoader::load(&config.roster_path()).await?;
    let template = load_template(&config.template_path()).await?;
    let layout = resolver.resolve(&template)?;

    let event = config.event_context();
    let Some(record) = CodeAssigner::new(&event).assign(entries).into_iter().next() else {
        return Err(CertError::MalformedRoster {
            message: "roster has no participants to preview".to_string(),
        });
    };

    let composition = renderer.compose(&template, &layout, &record)?;

    let output_dir = config.output_directory();
    tokio::fs::create_dir_all(&output_dir).await?;
    let path = output_dir.join(PREVIEW_FILE);
    composition.image.save(&path)?;

    let bbox = layout.bounding_box;
    println!(
        "📐 Name box: x={} y={} {}x{}, baseline y={}",
        bbox.x, bbox.y, bbox.width, bbox.height, layout.baseline_y
    );
    println!(
        "🔤 '{}' at {}px ({:.0}px wide), code {}",
        composition.display_name, composition.font_size, composition.text_width, record.code
    );
    println!("🖼️ Preview saved to: {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting cert-mailer ({:?})", cli.command);
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}
