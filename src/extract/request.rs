//! Extraction request and response models

use serde::Deserialize;

use super::region::{Region, RegionScheme};
use crate::pdf::{PageInfo, PixelRect, Rotation, SourceFile};

/// Language and recipe hints passed through to the OCR service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionHints {
    pub language: Option<String>,
    pub recipe: Option<String>,
}

/// Everything the OCR service needs to extract one region
#[derive(Clone, Debug)]
pub struct RegionRequest {
    /// Original file, re-submitted as-is
    pub file: SourceFile,
    /// Page number (1-based)
    pub page: usize,
    pub region: Region,
    /// Effective rotation (baked + user) of the view the region was drawn on
    pub rotation: Rotation,
    pub hints: ExtractionHints,
}

impl RegionRequest {
    /// Build a request from a selection drawn at `scale` and the user's rotation
    #[must_use]
    pub fn build(
        file: SourceFile,
        page: &PageInfo,
        rect: &PixelRect,
        scale: f32,
        user_rotation: Rotation,
        scheme: RegionScheme,
        hints: ExtractionHints,
    ) -> Self {
        let viewport = page.viewport(scale, user_rotation);
        Self {
            file,
            page: page.number,
            region: Region::from_pixels(rect, &viewport, scheme),
            rotation: viewport.rotation,
            hints,
        }
    }

    /// Text fields of the multipart body (the file part is added by the transport)
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("page", self.page.to_string()),
            ("rotation", self.rotation.degrees().to_string()),
            ("scheme", self.region.scheme().as_str().to_string()),
        ];
        fields.extend(self.region.form_fields());
        if let Some(lang) = &self.hints.language {
            fields.push(("lang", lang.clone()));
        }
        if let Some(recipe) = &self.hints.recipe {
            fields.push(("recipe", recipe.clone()));
        }
        fields
    }
}

/// How the service obtained the text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Embedded text layer
    Pdf,
    Ocr,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pdf => "pdf",
            Self::Ocr => "ocr",
            Self::Unknown => "unknown",
        })
    }
}

/// Successful region extraction
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    #[serde(default)]
    pub method: Option<ExtractionMethod>,
}

/// Whole-document OCR output
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentExtraction {
    pub filename: String,
    pub text: String,
    #[serde(default)]
    pub words: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Set on batch items the service failed to process
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ServiceVersion {
    pub service: String,
    pub docuocr: String,
}

/// Extraction failures. All of them are recoverable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Non-2xx reply; `detail` is the body's `detail` field or the raw body
    #[error("{detail} (HTTP {status})")]
    Http { status: u16, detail: String },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("an extraction is already running")]
    Busy,

    #[error("no region selected")]
    NoSelection,

    #[error("no document open")]
    NoDocument,
}
