use crate::domain::ports::TextMetrics;
use crate::utils::error::{CertError, Result};
use rusttype::{point, Font, Scale};
use std::path::Path;

/// A parsed TrueType/OpenType font.
pub struct FontFace {
    font: Font<'static>,
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>, origin: &str) -> Result<Self> {
        Font::try_from_vec(data)
            .map(|font| Self { font })
            .ok_or_else(|| CertError::FontAsset {
                path: origin.to_string(),
                reason: "not a TrueType/OpenType font".to_string(),
            })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| CertError::FontAsset {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(data, &path.display().to_string())
    }

    pub fn font(&self) -> &Font<'static> {
        &self.font
    }
}

impl TextMetrics for FontFace {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let scale = Scale::uniform(size);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    fn ascent(&self, size: f32) -> f32 {
        self.font.v_metrics(Scale::uniform(size)).ascent
    }

    fn line_height(&self, size: f32) -> f32 {
        let v = self.font.v_metrics(Scale::uniform(size));
        v.ascent - v.descent
    }
}

/// Display font for names and a small font for verification codes.
pub struct FontAssets {
    pub name: FontFace,
    pub code: FontFace,
}

impl FontAssets {
    pub async fn load(name_path: &Path, code_path: &Path) -> Result<Self> {
        let name = FontFace::load(name_path).await?;
        let code = FontFace::load(code_path).await?;
        tracing::debug!(
            "Fonts loaded: name={}, code={}",
            name_path.display(),
            code_path.display()
        );
        Ok(Self { name, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_not_a_font() {
        let err = FontFace::from_bytes(b"definitely not a font".to_vec(), "junk.ttf").err();
        assert!(matches!(err, Some(CertError::FontAsset { .. })));
    }

    #[tokio::test]
    async fn test_missing_font_file() {
        let err = FontFace::load(Path::new("/nonexistent/Poppins-Bold.ttf")).await.err();
        match err {
            Some(CertError::FontAsset { path, .. }) => assert!(path.contains("Poppins-Bold")),
            _ => panic!("expected FontAsset error"),
        }
    }
}
