use std::sync::Arc;

use crate::config::Config;
use crate::export::PdfRenderer;
use crate::store::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.
    pub store: Arc<dyn ResumeStore>,
    /// External PDF renderer. Unconfigured unless `PDF_RENDERER_URL` is set.
    pub pdf_renderer: Arc<dyn PdfRenderer>,
    pub config: Config,
}
