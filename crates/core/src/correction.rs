use crate::error::CorrectionError;
use crate::extractor::TextExtractor;
use crate::models::{NewDocument, Upload};
use crate::traits::LanguageModel;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

const CORRECTION_PROMPT: &str =
    "Please correct the spelling and grammar in the following text. Preserve meaning and structure:";

pub const CORRECTED_DESCRIPTION: &str = "Grammar/Spelling corrected version";

pub fn correction_prompt(text: &str) -> String {
    format!("{CORRECTION_PROMPT}\n\n{text}")
}

/// Runs extracted text through a language model. Nothing is persisted or indexed.
pub struct CorrectionService {
    extractor: Arc<dyn TextExtractor>,
    model: Arc<dyn LanguageModel>,
}

impl CorrectionService {
    pub fn new(extractor: Arc<dyn TextExtractor>, model: Arc<dyn LanguageModel>) -> Self {
        Self { extractor, model }
    }

    pub async fn correct(&self, bytes: &[u8], media_type: &str) -> Result<String, CorrectionError> {
        let text = self.extractor.extract(bytes, media_type)?;
        debug!(chars = text.chars().count(), "requesting correction");
        self.model.complete(&correction_prompt(&text)).await
    }

    /// Corrected text wrapped as an unsaved document.
    pub async fn correct_file(&self, upload: Upload) -> Result<NewDocument, CorrectionError> {
        let corrected = self.correct(&upload.bytes, &upload.content_type).await?;
        Ok(NewDocument {
            filename: upload.filename,
            content_type: upload.content_type,
            content_text: corrected,
            description: Some(CORRECTED_DESCRIPTION.to_string()),
            uploaded_at: Utc::now(),
        })
    }
}
