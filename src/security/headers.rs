//! Security response headers.
//!
//! Every response leaving the gateway carries a content-type sniffing
//! opt-out and a fixed content-disposition directive, whatever the service
//! produced.

use http::header::{HeaderValue, CONTENT_DISPOSITION, X_CONTENT_TYPE_OPTIONS};

use crate::http::Response;

pub const X_CONTENT_TYPE_OPTIONS_VALUE: &str = "nosniff";
pub const CONTENT_DISPOSITION_VALUE: &str = "attachment";

/// Set the mandated security headers, replacing any service-provided values.
pub fn apply_required_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static(X_CONTENT_TYPE_OPTIONS_VALUE),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static(CONTENT_DISPOSITION_VALUE),
    );
}
