//! Document renderers for downloads

pub mod offer_pdf;
pub mod picklist_xlsx;

use thiserror::Error;

pub use offer_pdf::render_offer_pdf;
pub use picklist_xlsx::render_picklist;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("XLSX rendering failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
