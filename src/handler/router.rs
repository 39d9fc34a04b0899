//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: health probes, preflight, mount prefix
//! stripping, verb dispatch, error rendering and access logging.

use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, SERVER};
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::verbs::{self, Reply};
use crate::config::AppState;
use crate::error::{FsApiError, Result};
use crate::fs::LogicalPath;
use crate::http::{self, FormData, QueryFlags, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
///
/// Never fails: every error becomes a response here.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> std::result::Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let access_log = state.config.logging.access_log.then(|| access_entry(&req, peer_addr));
    let is_head = req.method() == Method::HEAD;

    let mut response = route_request(req, &state).await;
    if is_head {
        response = strip_body(response);
    }
    apply_common_headers(&mut response, &state);

    if let Some(mut entry) = access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on method, path and configuration
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let path = req.uri().path();

    // Health check endpoints (highest priority, always fast)
    let health = &state.config.health;
    if health.enabled
        && matches!(*req.method(), Method::GET | Method::HEAD)
        && (path == health.liveness_path || path == health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    if req.method() == Method::OPTIONS {
        return http::build_options_response(state.config.http.enable_cors);
    }

    let Some(raw_path) = strip_mount_prefix(path, state.config.mount_prefix()) else {
        return http::build_404_response();
    };
    let logical = match decode_path(raw_path) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    let method = req.method().clone();
    match dispatch(req, state, &logical).await {
        Ok(response) => response,
        Err(e) => {
            if let FsApiError::Io(ref io) = e {
                logger::log_error(&format!("{method} {logical} failed: {io}"));
            }
            error_response(&e)
        }
    }
}

/// Map a verb onto its handler
async fn dispatch<B>(
    req: Request<B>,
    state: &AppState,
    logical: &LogicalPath,
) -> Result<Response<ResponseBody>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let root = &state.root;
    let method = req.method().clone();
    match method {
        Method::GET | Method::HEAD => {
            let flags = QueryFlags::parse(req.uri().query());
            let reply = verbs::get_item(root, logical, flags).await?;
            Ok(reply_response(reply))
        }
        Method::DELETE => {
            let info = verbs::delete_item(root, logical).await?;
            logger::log_debug(&format!("Deleted {}", info.path));
            Ok(http::build_json_response(200, &info))
        }
        Method::POST => {
            let form = read_form(req, state).await?;
            let info = verbs::create_item(root, logical, &form).await?;
            logger::log_debug(&format!("Created {} ({})", info.path, info.kind));
            Ok(http::build_json_response(200, &info))
        }
        Method::PATCH => {
            let form = read_form(req, state).await?;
            let info = verbs::update_item(root, logical, &form).await?;
            logger::log_debug(&format!("Updated {logical} -> {}", info.path));
            Ok(http::build_json_response(200, &info))
        }
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Ok(http::build_405_response())
        }
    }
}

/// Keep status and headers (Content-Length included) but send no body; an
/// unread download file is closed here
fn strip_body(response: Response<ResponseBody>) -> Response<ResponseBody> {
    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, http::response::empty_body())
}

fn reply_response(reply: Reply) -> Response<ResponseBody> {
    match reply {
        Reply::Item(info) => http::build_json_response(200, &info),
        Reply::Children(children) => http::build_json_response(200, &children),
        Reply::Download { info, file } => http::build_file_response(file, info.kind, info.size),
    }
}

/// Parse the form body after checking the declared length
async fn read_form<B>(req: Request<B>, state: &AppState) -> Result<FormData>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let limit = state.config.max_body_size();
    check_body_size(&req, state.config.http.max_body_size)?;

    let (parts, body) = req.into_parts();
    let content_type = parts
        .headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    FormData::from_body(content_type, body, limit).await
}

/// Validate Content-Length header before reading anything
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Result<()> {
    let Some(content_length) = req.headers().get(CONTENT_LENGTH) else {
        return Ok(());
    };
    match content_length.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Err(FsApiError::PayloadTooLarge)
        }
        Some(_) => Ok(()),
        None => {
            logger::log_warning("Invalid Content-Length value, skipping size check");
            Ok(())
        }
    }
}

/// Remainder of `path` after the mount prefix, `None` when it is outside the mount
fn strip_mount_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Percent-decode and normalize the logical part of the URL
fn decode_path(raw: &str) -> Result<LogicalPath> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| FsApiError::BadRequest("path is not valid UTF-8".to_string()))?;
    if decoded.contains('\0') {
        return Err(FsApiError::BadRequest("path contains NUL".to_string()));
    }
    Ok(LogicalPath::normalize(&decoded))
}

fn error_response(err: &FsApiError) -> Response<ResponseBody> {
    match err {
        FsApiError::NotFound => http::build_null_response(),
        FsApiError::ItemExists => http::build_text_response(err.status(), "Item Exists"),
        FsApiError::BadRequest(message) => http::build_text_response(err.status(), message.clone()),
        FsApiError::PayloadTooLarge => http::build_413_response(),
        FsApiError::Io(_) => http::build_500_response(),
    }
}

fn apply_common_headers(response: &mut Response<ResponseBody>, state: &AppState) {
    let headers = response.headers_mut();
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, server);
    }
    if state.config.http.enable_cors {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: Option<SocketAddr>) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}
