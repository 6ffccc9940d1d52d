//! Response bookkeeping for a single request.
//!
//! A [`ResponseWriter`] buffers the response while the handler chain runs. The first
//! body write (or an explicit [`ResponseWriter::write_header`]) commits the status line
//! and headers; after that point both are frozen. Later status assignments are still
//! recorded in [`ResponseWriter::status`] but never reach the client.
//!
//! Headers set with [`ResponseWriter::insert_default_header`] are kept apart: they are
//! added at commit unless a handler set the same header, and they survive when a failed
//! handler's pending headers are discarded to render an error instead.

use crate::body::ResponseBody;
use bytes::{Bytes, BytesMut};
use http::response::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use std::mem;
use tracing::warn;

pub(crate) const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";
pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    defaults: HeaderMap,
    head: Option<Parts>,
    body: BytesMut,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), defaults: HeaderMap::new(), head: None, body: BytesMut::new() }
    }

    /// The most recently assigned status, which may differ from the committed one.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The status the client receives, once the head has been committed.
    pub fn committed_status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|head| head.status)
    }

    pub fn is_written(&self) -> bool {
        self.head.is_some()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if let Some(head) = &self.head {
            if head.status != status {
                warn!(committed = %head.status, ignored = %status, "superfluous status write, headers already sent");
            }
        }
        self.status = status;
    }

    /// Headers pending for the head; changes made after the head is committed are dropped.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The headers the client will see.
    pub fn headers(&self) -> &HeaderMap {
        match &self.head {
            Some(head) => &head.headers,
            None => &self.headers,
        }
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.is_written() {
            warn!(header = %name, "header set after headers were sent, ignored");
            return;
        }
        self.headers.insert(name, value);
    }

    /// Sets a header every response of this request carries, error responses included.
    pub fn insert_default_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.is_written() {
            warn!(header = %name, "header set after headers were sent, ignored");
            return;
        }
        self.defaults.insert(name, value);
    }

    /// Drops the headers queued by handlers; default headers are kept.
    pub(crate) fn clear_pending_headers(&mut self) {
        if !self.is_written() {
            self.headers.clear();
        }
    }

    pub(crate) fn insert_header_if_absent(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.is_written() {
            self.headers.entry(name).or_insert(value);
        }
    }

    pub fn write_header(&mut self, status: StatusCode) {
        self.set_status(status);
        self.commit();
    }

    pub fn write(&mut self, data: &[u8]) {
        self.commit();
        self.body.extend_from_slice(data);
    }

    pub fn written_body(&self) -> &[u8] {
        &self.body
    }

    fn commit(&mut self) {
        if self.head.is_some() {
            return;
        }

        let (mut head, ()) = Response::new(()).into_parts();
        head.status = self.status;
        head.headers = mem::take(&mut self.headers);
        for (name, value) in &self.defaults {
            if !head.headers.contains_key(name) {
                head.headers.insert(name.clone(), value.clone());
            }
        }
        self.defaults.clear();
        self.head = Some(head);
    }

    /// Hands the buffered response over, leaving the writer committed and empty.
    pub(crate) fn take_response(&mut self) -> Response<ResponseBody> {
        self.commit();
        let head = match self.head.take() {
            Some(head) => head,
            None => Response::new(()).into_parts().0,
        };
        let body: Bytes = self.body.split().freeze();
        Response::from_parts(head, ResponseBody::once(body))
    }

    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.defaults.clear();
        self.head = None;
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn first_write_commits_status() {
        let mut writer = ResponseWriter::new();
        writer.set_status(StatusCode::CREATED);
        assert!(!writer.is_written());

        writer.write(b"hello");
        assert!(writer.is_written());
        assert_eq!(writer.committed_status(), Some(StatusCode::CREATED));

        writer.set_status(StatusCode::BAD_REQUEST);
        assert_eq!(writer.status(), StatusCode::BAD_REQUEST);
        assert_eq!(writer.committed_status(), Some(StatusCode::CREATED));

        let response = writer.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn headers_freeze_at_commit() {
        let mut writer = ResponseWriter::new();
        writer.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        writer.write_header(StatusCode::ACCEPTED);

        writer.insert_header(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        writer.headers_mut().insert(http::header::ETAG, HeaderValue::from_static("\"1\""));

        let response = writer.take_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().len(), 1);
        assert!(response.headers().contains_key(http::header::CONTENT_TYPE));
    }

    #[tokio::test]
    async fn writes_are_appended() {
        let mut writer = ResponseWriter::new();
        writer.write(b"hello ");
        writer.write(b"world");

        let body = writer.take_response().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"hello world"));
    }

    #[test]
    fn unwritten_response_defaults_to_ok() {
        let mut writer = ResponseWriter::new();
        let response = writer.take_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn reset_clears_everything() {
        let mut writer = ResponseWriter::new();
        writer.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        writer.write_header(StatusCode::NOT_FOUND);
        writer.write(b"gone");

        writer.reset();

        assert_eq!(writer.status(), StatusCode::OK);
        assert!(!writer.is_written());
        assert!(writer.headers().is_empty());
        assert!(writer.written_body().is_empty());
    }

    #[test]
    fn default_headers_survive_cleared_pending_headers() {
        let mut writer = ResponseWriter::new();
        writer.insert_default_header(http::header::DATE, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
        writer.insert_header(http::header::LOCATION, HeaderValue::from_static("/elsewhere"));
        writer.insert_header(http::header::CONTENT_LENGTH, HeaderValue::from_static("999"));

        writer.clear_pending_headers();
        writer.write_header(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = writer.headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[http::header::DATE], "Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[test]
    fn handler_header_wins_over_default() {
        let mut writer = ResponseWriter::new();
        writer.insert_default_header(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        writer.insert_header(http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        writer.write(b"body");

        assert_eq!(writer.headers()[http::header::CACHE_CONTROL], "max-age=60");
    }
}
