//! Certificate rendering: name fitting, text drawing and PDF export.

use crate::adapters::fonts::FontAssets;
use crate::domain::model::{ParticipantRecord, RenderedCertificate, TemplateLayout};
use crate::domain::ports::{CertificateRender, TextMetrics};
use crate::utils::error::RenderError;
use crate::utils::text::{safe_filename, title_case};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use rusttype::Scale;
use serde::{Deserialize, Serialize};

pub const CODE_FONT_SIZE: f32 = 10.0;
pub const CODE_COLOR: Rgb<u8> = Rgb([136, 136, 136]);
/// Distance of the code from the left and bottom edges of the image.
pub const CODE_OFFSET: (u32, u32) = (12, 12);

const NAME_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([64, 64, 64]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizing {
    pub max: f32,
    pub min: f32,
    pub step: f32,
}

impl Default for FontSizing {
    fn default() -> Self {
        Self {
            max: 60.0,
            min: 40.0,
            step: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedText {
    pub size: f32,
    pub width: f32,
    /// Number of size reductions that were needed.
    pub reductions: u32,
}

/// Largest size from `sizing.max` downwards, one step per overflow check,
/// whose width fits in `box_width`. Fails when even `sizing.min` overflows.
pub fn fit_font_size(
    metrics: &dyn TextMetrics,
    text: &str,
    box_width: u32,
    sizing: &FontSizing,
) -> Result<FittedText, RenderError> {
    let limit = box_width as f32;
    let mut size = sizing.max;
    let mut reductions = 0;

    loop {
        let width = metrics.text_width(text, size);
        if width <= limit {
            return Ok(FittedText {
                size,
                width,
                reductions,
            });
        }
        if size <= sizing.min {
            return Err(RenderError::NameOverflow {
                name: text.to_string(),
                min_size: sizing.min,
                width,
                box_width,
            });
        }
        size = (size - sizing.step).max(sizing.min);
        reductions += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    pub sizing: FontSizing,
    pub dpi: f32,
    pub title_case_names: bool,
    pub outline: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sizing: FontSizing::default(),
            dpi: 300.0,
            title_case_names: true,
            outline: true,
        }
    }
}

/// A rendered certificate image before export.
pub struct Composition {
    pub image: RgbImage,
    pub display_name: String,
    pub font_size: f32,
    pub text_width: f32,
}

pub struct TemplateRenderer {
    fonts: FontAssets,
    settings: RenderSettings,
}

impl TemplateRenderer {
    pub fn new(fonts: FontAssets, settings: RenderSettings) -> Self {
        Self { fonts, settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn compose(
        &self,
        template: &RgbImage,
        layout: &TemplateLayout,
        record: &ParticipantRecord,
    ) -> Result<Composition, RenderError> {
        let display_name = if self.settings.title_case_names {
            title_case(&record.name)
        } else {
            record.name.trim().to_string()
        };
        if display_name.is_empty() {
            return Err(RenderError::EmptyName);
        }

        let bbox = &layout.bounding_box;
        let fitted = fit_font_size(&self.fonts.name, &display_name, bbox.width, &self.settings.sizing)?;
        tracing::debug!(
            "Row {}: '{}' at {}px ({} reductions, {:.0}/{}px)",
            record.row_index,
            display_name,
            fitted.size,
            fitted.reductions,
            fitted.width,
            bbox.width
        );

        let mut image = template.clone();

        // 名字水平置中，基線對齊版面底線
        let x = (bbox.center_x() - fitted.width / 2.0).round() as i32;
        let y = layout.baseline_y as i32 - self.fonts.name.ascent(fitted.size).round() as i32;
        let scale = Scale::uniform(fitted.size);

        if self.settings.outline {
            let outline = ((fitted.size / 40.0) as i32).max(1);
            for ox in -outline..=outline {
                for oy in -outline..=outline {
                    if ox != 0 || oy != 0 {
                        draw_text_mut(
                            &mut image,
                            OUTLINE_COLOR,
                            x + ox,
                            y + oy,
                            scale,
                            self.fonts.name.font(),
                            &display_name,
                        );
                    }
                }
            }
        }
        draw_text_mut(&mut image, NAME_COLOR, x, y, scale, self.fonts.name.font(), &display_name);

        // 驗證碼固定在左下角
        let code_height = self.fonts.code.line_height(CODE_FONT_SIZE).ceil() as i32;
        let code_x = CODE_OFFSET.0 as i32;
        let code_y = image.height() as i32 - CODE_OFFSET.1 as i32 - code_height;
        draw_text_mut(
            &mut image,
            CODE_COLOR,
            code_x,
            code_y,
            Scale::uniform(CODE_FONT_SIZE),
            self.fonts.code.font(),
            &record.code,
        );

        Ok(Composition {
            image,
            display_name,
            font_size: fitted.size,
            text_width: fitted.width,
        })
    }
}

impl CertificateRender for TemplateRenderer {
    fn render(
        &self,
        template: &RgbImage,
        layout: &TemplateLayout,
        record: &ParticipantRecord,
    ) -> Result<RenderedCertificate, RenderError> {
        let composition = self.compose(template, layout, record)?;
        let document = export_pdf(&composition.image, self.settings.dpi, &record.code)?;
        Ok(RenderedCertificate {
            file_name: certificate_file_name(&composition.display_name, &record.code),
            document,
            font_size: composition.font_size,
        })
    }
}

/// `<safe-name>_<code>.pdf`; the code keeps names unique within a run.
pub fn certificate_file_name(display_name: &str, code: &str) -> String {
    let name = safe_filename(display_name);
    let code = safe_filename(code);
    if name.is_empty() {
        format!("{}.pdf", code)
    } else {
        format!("{}_{}.pdf", name, code)
    }
}

/// Single page PDF sized to the image at `dpi`.
pub fn export_pdf(image: &RgbImage, dpi: f32, title: &str) -> Result<Vec<u8>, RenderError> {
    let px_to_mm = |px: u32| Mm(px as f32 * 25.4 / dpi);
    let (doc, page, layer) = PdfDocument::new(
        title,
        px_to_mm(image.width()),
        px_to_mm(image.height()),
        "certificate",
    );
    let current_layer = doc.get_page(page).get_layer(layer);

    let pdf_image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(image.clone()));
    pdf_image.add_to_layer(
        current_layer,
        ImageTransform {
            dpi: Some(dpi),
            ..Default::default()
        },
    );

    doc.save_to_bytes().map_err(|e| RenderError::Export {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fonts::FontFace;
    use crate::domain::model::{BoundingBox, RosterEntry};
    use std::path::Path;

    /// Every character is half the font size wide.
    struct FixedWidth;

    impl TextMetrics for FixedWidth {
        fn text_width(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * size * 0.5
        }

        fn ascent(&self, size: f32) -> f32 {
            size * 0.8
        }

        fn line_height(&self, size: f32) -> f32 {
            size
        }
    }

    #[test]
    fn test_short_name_keeps_maximum_size() {
        let fitted = fit_font_size(&FixedWidth, "Al", 560, &FontSizing::default()).unwrap();
        assert_eq!(fitted.size, 60.0);
        assert_eq!(fitted.reductions, 0);
    }

    #[test]
    fn test_long_name_shrinks_one_step_per_check() {
        // 27 chars: 810px at 60, 540px at 40
        let fitted = fit_font_size(&FixedWidth, "Alexandra Constantinopoulos", 560, &FontSizing::default()).unwrap();
        assert_eq!(fitted.size, 40.0);
        assert_eq!(fitted.reductions, 10);
        assert!(fitted.width <= 560.0);
    }

    #[test]
    fn test_first_fitting_size_is_used() {
        // 10 chars: width = 5 * size, fits 280px at 56
        let fitted = fit_font_size(&FixedWidth, "Grace Hopp", 280, &FontSizing::default()).unwrap();
        assert_eq!(fitted.size, 56.0);
        assert_eq!(fitted.reductions, 2);
    }

    #[test]
    fn test_step_is_clamped_to_floor() {
        let sizing = FontSizing {
            max: 60.0,
            min: 45.0,
            step: 10.0,
        };
        // 20 chars: width = 10 * size, 450px only fits at 45
        let fitted = fit_font_size(&FixedWidth, "abcdefghijklmnopqrst", 450, &sizing).unwrap();
        assert_eq!(fitted.size, 45.0);
        assert_eq!(fitted.reductions, 2);
    }

    #[test]
    fn test_overflow_at_floor_fails_the_record() {
        let err = fit_font_size(&FixedWidth, "Maximiliana Wolfeschlegelsteinhausen", 300, &FontSizing::default())
            .unwrap_err();
        match err {
            RenderError::NameOverflow { min_size, box_width, .. } => {
                assert_eq!(min_size, 40.0);
                assert_eq!(box_width, 300);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_file_names_include_code() {
        assert_eq!(certificate_file_name("Ada Lovelace", "quiz-25-001"), "Ada Lovelace_quiz-25-001.pdf");
        assert_eq!(certificate_file_name("../../", "quiz-25-002"), "quiz-25-002.pdf");
        assert_ne!(
            certificate_file_name("Al", "quiz-25-003"),
            certificate_file_name("Al", "quiz-25-004")
        );
    }

    #[test]
    fn test_export_pdf_produces_a_pdf() {
        let image = RgbImage::from_pixel(60, 40, Rgb([255, 255, 255]));
        let bytes = export_pdf(&image, 300.0, "quiz-25-001").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    fn system_font() -> Option<FontFace> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .find_map(|p| std::fs::read(Path::new(p)).ok())
        .and_then(|data| FontFace::from_bytes(data, "system").ok())
    }

    #[test]
    fn test_compose_with_real_font_stays_inside_box() {
        let (Some(name), Some(code)) = (system_font(), system_font()) else {
            eprintln!("no system font available, skipping");
            return;
        };
        let renderer = TemplateRenderer::new(FontAssets { name, code }, RenderSettings::default());
        let template = RgbImage::from_pixel(800, 600, Rgb([255, 255, 255]));
        let layout = TemplateLayout {
            bounding_box: BoundingBox {
                x: 50,
                y: 200,
                width: 700,
                height: 60,
            },
            baseline_y: 260,
            marker: None,
        };
        let record = ParticipantRecord::new(
            RosterEntry {
                row_index: 1,
                name: "alexandra constantinopoulos".to_string(),
                email: String::new(),
                email_missing: true,
            },
            "quiz-25-001".to_string(),
        );

        let composition = renderer.compose(&template, &layout, &record).unwrap();
        assert_eq!(composition.display_name, "Alexandra Constantinopoulos");
        assert!(composition.text_width <= 700.0);
        assert!(composition.font_size < 60.0);

        // 框外左右兩側不應有文字
        let inked_outside = (0..500).any(|y| {
            (0..40).chain(760..800).any(|x| composition.image.get_pixel(x, y).0[0] < 100)
        });
        assert!(!inked_outside);
    }
}
