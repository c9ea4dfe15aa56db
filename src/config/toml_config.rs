use crate::adapters::smtp::{SmtpSecurity, SmtpSettings};
use crate::core::dispatch::DispatchSettings;
use crate::core::layout::MarkerSettings;
use crate::core::render::{FontSizing, RenderSettings};
use crate::domain::model::{BoundingBox, EventContext, SenderCredentials};
use crate::utils::error::{CertError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertConfig {
    pub event: EventConfig,
    pub input: InputConfig,
    pub fonts: FontsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    pub output: OutputConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub code: String,
    pub year: String,
    /// 可使用 {name} 與 {code}
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub template: String,
    pub roster: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    pub name: String,
    /// Defaults to the name font.
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub max_font_size: f32,
    pub min_font_size: f32,
    pub font_step: f32,
    pub dpi: f32,
    pub title_case_names: bool,
    pub outline: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            max_font_size: settings.sizing.max,
            min_font_size: settings.sizing.min,
            font_step: settings.sizing.step,
            dpi: settings.dpi,
            title_case_names: settings.title_case_names,
            outline: settings.outline,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub darkness_threshold: u8,
    pub min_run_fraction: f32,
    pub search_top: f32,
    pub search_bottom: f32,
    pub padding_fraction: f32,
    pub min_gap: u32,
    pub gap_fraction: f32,
    /// Skips marker detection when set.
    pub fixed: Option<FixedBox>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let marker = MarkerSettings::default();
        Self {
            darkness_threshold: marker.darkness_threshold,
            min_run_fraction: marker.min_run_fraction,
            search_top: marker.search_top,
            search_bottom: marker.search_bottom,
            padding_fraction: marker.padding_fraction,
            min_gap: marker.min_gap,
            gap_fraction: marker.gap_fraction,
            fixed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    #[serde(default = "default_true")]
    pub write_manifest: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_server")]
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    pub sender: String,
    /// 建議用 ${SMTP_PASSWORD} 從環境變數帶入
    pub password: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
}

impl SmtpConfig {
    pub fn settings(&self) -> SmtpSettings {
        SmtpSettings {
            server: self.server.clone(),
            port: self.port,
            security: self.security,
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }

    pub fn credentials(&self) -> SenderCredentials {
        SenderCredentials {
            address: self.sender.trim().to_string(),
            secret: self.password.clone(),
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("send_interval_ms", &self.send_interval_ms)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_smtp_server() -> String {
    SmtpSettings::default().server
}

fn default_smtp_port() -> u16 {
    SmtpSettings::default().port
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_send_interval_ms() -> u64 {
    500
}

impl CertConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CertError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CertError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SMTP_PASSWORD})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| CertError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("event.code", &self.event.code)?;
        validation::validate_non_empty_string("event.year", &self.event.year)?;

        validation::validate_path("input.template", &self.input.template)?;
        validation::validate_file_extension("input.template", &self.input.template, &["png", "jpg", "jpeg"])?;
        validation::validate_path("input.roster", &self.input.roster)?;
        validation::validate_file_extension("input.roster", &self.input.roster, &["csv", "tsv", "xlsx", "xls"])?;

        validation::validate_path("fonts.name", &self.fonts.name)?;
        if let Some(code_font) = &self.fonts.code {
            validation::validate_path("fonts.code", code_font)?;
        }
        validation::validate_path("output.directory", &self.output.directory)?;

        let render = &self.render;
        validation::validate_range("render.min_font_size", render.min_font_size, 10.0, 500.0)?;
        validation::validate_range("render.max_font_size", render.max_font_size, 10.0, 500.0)?;
        if render.min_font_size > render.max_font_size {
            return Err(CertError::ConfigValidationError {
                field: "render.min_font_size".to_string(),
                message: format!(
                    "min_font_size ({}) must not exceed max_font_size ({})",
                    render.min_font_size, render.max_font_size
                ),
            });
        }
        validation::validate_range("render.font_step", render.font_step, 1.0, 100.0)?;
        validation::validate_range("render.dpi", render.dpi, 72.0, 1200.0)?;

        let layout = &self.layout;
        validation::validate_range("layout.min_run_fraction", layout.min_run_fraction, 0.01, 1.0)?;
        validation::validate_range("layout.search_top", layout.search_top, 0.0, 1.0)?;
        validation::validate_range("layout.search_bottom", layout.search_bottom, 0.0, 1.0)?;
        if layout.search_top >= layout.search_bottom {
            return Err(CertError::ConfigValidationError {
                field: "layout.search_top".to_string(),
                message: "search_top must be above search_bottom".to_string(),
            });
        }
        validation::validate_range("layout.padding_fraction", layout.padding_fraction, 0.0, 1.0)?;
        validation::validate_range("layout.gap_fraction", layout.gap_fraction, 0.0, 2.0)?;
        if let Some(fixed) = self.fixed_box() {
            validation::validate_positive_number("layout.fixed.width", fixed.width as usize, 1)?;
            validation::validate_positive_number("layout.fixed.height", fixed.height as usize, 1)?;
            if fixed.right().is_none() || fixed.bottom().is_none() {
                return Err(CertError::ConfigValidationError {
                    field: "layout.fixed".to_string(),
                    message: "box edges exceed the maximum image size".to_string(),
                });
            }
        }

        if let Some(smtp) = &self.smtp {
            validation::validate_non_empty_string("smtp.server", &smtp.server)?;
            validation::validate_email("smtp.sender", &smtp.sender)?;
            validation::validate_positive_number("smtp.timeout_seconds", smtp.timeout_seconds as usize, 1)?;
            if smtp.password.trim().is_empty() || smtp.password.starts_with("${") {
                return Err(CertError::MissingConfigError {
                    field: "smtp.password".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn template_path(&self) -> PathBuf {
        PathBuf::from(&self.input.template)
    }

    pub fn roster_path(&self) -> PathBuf {
        PathBuf::from(&self.input.roster)
    }

    pub fn name_font_path(&self) -> PathBuf {
        PathBuf::from(&self.fonts.name)
    }

    pub fn code_font_path(&self) -> PathBuf {
        PathBuf::from(self.fonts.code.as_deref().unwrap_or(&self.fonts.name))
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.output.directory)
    }

    /// Event context for a generate-only run. Use `with_sender` to enable sending.
    pub fn event_context(&self) -> EventContext {
        let event = EventContext::new(
            self.event.code.trim(),
            self.event.year.trim(),
            self.output_directory(),
        );
        match &self.event.subject {
            Some(subject) => event.with_subject(subject.clone()),
            None => event,
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            sizing: FontSizing {
                max: self.render.max_font_size,
                min: self.render.min_font_size,
                step: self.render.font_step,
            },
            dpi: self.render.dpi,
            title_case_names: self.render.title_case_names,
            outline: self.render.outline,
        }
    }

    pub fn marker_settings(&self) -> MarkerSettings {
        MarkerSettings {
            darkness_threshold: self.layout.darkness_threshold,
            min_run_fraction: self.layout.min_run_fraction,
            search_top: self.layout.search_top,
            search_bottom: self.layout.search_bottom,
            padding_fraction: self.layout.padding_fraction,
            min_gap: self.layout.min_gap,
            gap_fraction: self.layout.gap_fraction,
        }
    }

    pub fn fixed_box(&self) -> Option<BoundingBox> {
        self.layout.fixed.map(|f| BoundingBox {
            x: f.x,
            y: f.y,
            width: f.width,
            height: f.height,
        })
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        let mut settings = DispatchSettings::default();
        if let Some(smtp) = &self.smtp {
            settings.send_timeout = Duration::from_secs(smtp.timeout_seconds);
            settings.send_interval = Duration::from_millis(smtp.send_interval_ms);
        }
        settings
    }
}

impl Validate for CertConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
