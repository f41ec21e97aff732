//! Region extraction against the OCR service

mod client;
mod extractor;
mod region;
mod request;

pub use client::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpReply, MultipartForm, OcrClient,
    ReqwestTransport, Transport, error_detail,
};
pub use extractor::Extractor;
pub use region::{Region, RegionScheme};
pub use request::{
    DocumentExtraction, ExtractionError, ExtractionHints, ExtractionMethod, ExtractionResult,
    RegionRequest, ServiceVersion,
};
