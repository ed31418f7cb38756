//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: checks the prefix, then
//! dispatches by method to the file responder or the upload handler.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, SERVER};
use hyper::{Method, Request, Response};

use crate::config::AppState;
use crate::handler::static_files;
use crate::http::{self, ApiStatus, ResponseBody};
use crate::logger;
use crate::upload;

/// Request context encapsulating what the file responder needs
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut response = route_request(req, &state).await;

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }
    Ok(response)
}

async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let prefix = state.prefix();
    let path = req.uri().path();

    if !path.starts_with(prefix) {
        // `/files` for a `/files/` prefix: point at the directory
        let is_read = matches!(*req.method(), Method::GET | Method::HEAD);
        if is_read && format!("{path}/") == prefix {
            return http::build_redirect_response(prefix);
        }
        return http::build_404_response();
    }

    match *req.method() {
        Method::GET | Method::HEAD => {
            let ctx = RequestContext {
                path,
                is_head: req.method() == Method::HEAD,
                if_none_match: header_string(&req, IF_NONE_MATCH),
                if_modified_since: header_string(&req, IF_MODIFIED_SINCE),
            };
            static_files::serve_path(&ctx, &state.root, prefix, &state.config.storage.index_files)
                .await
        }
        Method::OPTIONS => http::build_options_response(state.config.http.enable_cors),
        Method::POST => handle_upload(req, state).await,
        ref method => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            http::build_405_response()
        }
    }
}

/// Run one upload and turn its outcome into a response
async fn handle_upload<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let result = upload::save_upload(&state.upload, req).await;
    logger::log_upload(&result);

    http::build_upload_response(
        &ApiStatus::from_result(&result),
        state.config.upload.response_format,
    )
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
