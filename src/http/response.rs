//! HTTP response building module
//!
//! Every response shares one boxed body type so buffered payloads (JSON, text) and
//! streamed file downloads can come out of the same handler.

use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::Response;
use serde::Serialize;
use std::io;
use tokio_util::io::ReaderStream;

/// Methods the API answers to
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, PATCH, DELETE, OPTIONS";

/// Response body used throughout the server
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Buffered body
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Zero-length body
pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build JSON response
pub fn build_json_response<T: Serialize>(status: u16, body: &T) -> Response<ResponseBody> {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_500_response();
        }
    };
    let content_length = json.len();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", content_length)
        .body(full_body(json))
        .unwrap_or_else(|e| {
            log_build_error("JSON", &e);
            Response::new(empty_body())
        })
}

/// 200 with a JSON `null` body, the not-found answer of the item API
pub fn build_null_response() -> Response<ResponseBody> {
    build_json_response(200, &serde_json::Value::Null)
}

/// Plain text response
pub fn build_text_response(status: u16, text: impl Into<String>) -> Response<ResponseBody> {
    let text = text.into();
    let content_length = text.len();

    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", content_length)
        .body(full_body(text))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(empty_body())
        })
}

/// Stream a file in chunks
///
/// `content_length` is the size the caller stat'ed; the file itself is never
/// loaded into memory as a whole.
pub fn build_file_response(
    file: tokio::fs::File,
    content_type: &str,
    content_length: u64,
) -> Response<ResponseBody> {
    let stream = ReaderStream::new(file).map_ok(Frame::data);
    let body = StreamBody::new(stream).boxed_unsync();

    Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("download", &e);
            Response::new(empty_body())
        })
}

/// Build 404 Not Found response (outside the mount prefix)
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(404, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    let mut response = build_text_response(405, "405 Method Not Allowed");
    response
        .headers_mut()
        .insert("Allow", hyper::header::HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<ResponseBody> {
    build_text_response(413, "413 Payload Too Large")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    build_text_response(500, "Internal Server Error")
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(204)
        .header("Allow", ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(empty_body()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(empty_body())
    })
}

/// Health probe response
pub fn build_health_response(status: &str) -> Response<ResponseBody> {
    build_text_response(200, status)
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_null_response() {
        let response = build_null_response();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_bytes(response).await, Bytes::from("null"));
    }

    #[tokio::test]
    async fn test_text_response() {
        let response = build_text_response(400, "Item Exists");
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["content-length"], "11");
        assert_eq!(body_bytes(response).await, Bytes::from("Item Exists"));
    }

    #[tokio::test]
    async fn test_file_response_streams_whole_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();

        let file = tokio::fs::File::open(tmp.path()).await.unwrap();
        let response = build_file_response(file, "application/octet-stream", data.len() as u64);

        assert_eq!(response.headers()["content-length"], "200000");
        assert_eq!(body_bytes(response).await.as_ref(), data.as_slice());
    }

    #[test]
    fn test_options_response() {
        let response = build_options_response(true);
        assert_eq!(response.status(), 204);
        assert_eq!(response.headers()["allow"], ALLOWED_METHODS);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let response = build_options_response(false);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[test]
    fn test_405_lists_methods() {
        let response = build_405_response();
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers()["allow"], ALLOWED_METHODS);
    }
}
