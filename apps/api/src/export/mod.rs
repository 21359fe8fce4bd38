//! PDF export.
//!
//! Rendering is delegated to an external service behind the [`PdfRenderer`]
//! trait. A failed render never fails the request: the caller is sent back to
//! the résumé's detail view with a message.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::ACCEPT, Client};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::resumes::service::get_document;
use crate::store::{ResumeDocument, ResumeStore};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("renderer returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("renderer returned an empty document")]
    EmptyDocument,

    #[error("no PDF renderer is configured")]
    Unconfigured,
}

/// Carried in `AppState` as `Arc<dyn PdfRenderer>`.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, document: &ResumeDocument) -> Result<Bytes, RenderError>;
}

/// Posts the résumé document as JSON and expects PDF bytes back.
#[derive(Clone)]
pub struct HttpPdfRenderer {
    client: Client,
    endpoint: String,
}

impl HttpPdfRenderer {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, RenderError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
        })
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, document: &ResumeDocument) -> Result<Bytes, RenderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/pdf")
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let pdf = response.bytes().await?;
        if pdf.is_empty() {
            return Err(RenderError::EmptyDocument);
        }
        debug!(
            "Rendered resume {} to {} bytes of PDF",
            document.resume.id,
            pdf.len()
        );
        Ok(pdf)
    }
}

/// Used when `PDF_RENDERER_URL` is not set.
pub struct UnconfiguredRenderer;

#[async_trait]
impl PdfRenderer for UnconfiguredRenderer {
    async fn render(&self, _document: &ResumeDocument) -> Result<Bytes, RenderError> {
        Err(RenderError::Unconfigured)
    }
}

#[derive(Debug)]
pub enum ExportOutcome {
    Document { filename: String, pdf: Bytes },
    /// Rendering failed; send the user to `location` with `message`.
    Fallback { message: String, location: String },
}

pub async fn export_pdf(
    store: &dyn ResumeStore,
    renderer: &dyn PdfRenderer,
    id: Uuid,
    owner: Uuid,
) -> Result<ExportOutcome, AppError> {
    let document = get_document(store, id, owner).await?;

    match renderer.render(&document).await {
        Ok(pdf) => {
            info!("Exported resume {id} as PDF ({} bytes)", pdf.len());
            Ok(ExportOutcome::Document {
                filename: pdf_filename(&document.resume.title),
                pdf,
            })
        }
        Err(e) => {
            warn!("PDF export of resume {id} failed: {e}");
            Ok(ExportOutcome::Fallback {
                message: format!("PDF generation error: {e}"),
                location: format!("/api/v1/resumes/{id}"),
            })
        }
    }
}

/// `<title>.pdf`, restricted to characters that are safe in a quoted header value.
pub fn pdf_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '_' })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "resume.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}
