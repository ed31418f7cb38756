//! HTTP response building module
//!
//! Builders for every response the server sends, decoupled from the
//! handlers that choose between them.

use hyper::body::Bytes;
use hyper::header::{
    ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
    LOCATION, RETRY_AFTER,
};
use hyper::{Response, StatusCode};

use super::body::{empty, full, FileBody, ResponseBody};
use super::cache::Validators;
use super::status::ApiStatus;
use crate::config::ResponseFormat;

/// Methods accepted on the served prefix
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS, POST";

fn text_response(status: StatusCode, text: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full(Bytes::from_static(text.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(full(Bytes::from_static(text.as_bytes())))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

/// Build 403 Forbidden response
pub fn build_403_response() -> Response<ResponseBody> {
    text_response(StatusCode::FORBIDDEN, "403 Forbidden\n")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    text_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "500 Internal Server Error\n",
    )
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    let mut resp = text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed\n");
    resp.headers_mut()
        .insert(ALLOW, hyper::header::HeaderValue::from_static(ALLOWED_METHODS));
    resp
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(empty())
    })
}

/// Build 301 redirect, used to add the trailing slash to directories
pub fn build_redirect_response(location: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full("Moved Permanently\n"))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            Response::new(empty())
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(validators: &Validators) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, &validators.etag);
    if let Some(ref last_modified) = validators.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified);
    }
    builder.body(empty()).unwrap_or_else(|e| {
        log_build_error("304", &e);
        Response::new(empty())
    })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<ResponseBody> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_LENGTH, content_length)
        .body(full(body))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(empty())
        })
}

/// Build file response with cache validators; the body streams from `file`
pub fn build_file_response(
    file: tokio::fs::File,
    len: u64,
    content_type: &str,
    validators: &Validators,
    is_head: bool,
) -> Response<ResponseBody> {
    let body = if is_head {
        empty()
    } else {
        FileBody::new(file, len).boxed()
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, len)
        .header(ACCEPT_RANGES, "none")
        .header(ETAG, &validators.etag)
        .header(CACHE_CONTROL, "no-cache");
    if let Some(ref last_modified) = validators.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified);
    }

    builder.body(body).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(empty())
    })
}

/// Build the response to an upload, as a status object or as plain text.
///
/// `Retry-After` is set whenever the status carries a positive delay.
pub fn build_upload_response(status: &ApiStatus, format: ResponseFormat) -> Response<ResponseBody> {
    let (content_type, body) = match format {
        ResponseFormat::Json => match serde_json::to_string_pretty(status) {
            Ok(json) => ("application/json", json),
            Err(e) => {
                crate::logger::log_error(&format!("Failed to serialize status: {e}"));
                return build_500_response();
            }
        },
        ResponseFormat::Text => ("text/plain; charset=utf-8", format!("{}\n", status.message)),
    };

    let mut builder = Response::builder()
        .status(status.status_code())
        .header(CONTENT_TYPE, content_type);
    if let Some(secs) = status.retry_after() {
        builder = builder.header(RETRY_AFTER, secs);
    }

    builder.body(full(body)).unwrap_or_else(|e| {
        log_build_error("upload", &e);
        build_500_response()
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
