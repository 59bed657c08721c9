use crate::error::ExtractionError;
use lopdf::Document;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], media_type: &str) -> Result<String, ExtractionError>;
}

/// PDFs go through lopdf; everything else is read as UTF-8, with invalid
/// sequences replaced by U+FFFD.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTextExtractor;

impl TextExtractor for DefaultTextExtractor {
    fn extract(&self, bytes: &[u8], media_type: &str) -> Result<String, ExtractionError> {
        if is_pdf(media_type) {
            extract_pdf_text(bytes)
        } else {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Matches `application/pdf` ignoring case, surrounding whitespace and any
/// `;charset=...` style parameters.
pub fn is_pdf(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

/// Every page in page order, joined with `\n`.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

    let pages = document
        .get_pages()
        .into_keys()
        .map(|page_no| {
            document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::PdfParse(error.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(join_pages(&pages))
}

/// Blank pages keep their place. A document with no text at all yields "".
fn join_pages(pages: &[String]) -> String {
    if pages.iter().all(|page| page.trim().is_empty()) {
        return String::new();
    }
    pages.join("\n")
}
