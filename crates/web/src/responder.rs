//! Conversion of handler values into a written response.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! write themselves into a [`ResponseWriter`]. It includes implementations for common
//! types like Result, Option, String, etc., and the [`Json`] wrapper for serde values.

use crate::handler::HandlerResult;
use crate::response::{APPLICATION_JSON, APPLICATION_OCTET_STREAM, ResponseWriter, TEXT_PLAIN_UTF_8};
use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use serde::Serialize;

/// A trait for values that can be written as the response of a request.
pub trait Responder {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult;
}

/// Serializes the inner value as an `application/json` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        match self {
            Ok(t) => t.respond_to(writer),
            Err(e) => e.respond_to(writer),
        }
    }
}

/// None writes an empty body with the current status.
impl<T: Responder> Responder for Option<T> {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        match self {
            Some(t) => t.respond_to(writer),
            None => ().respond_to(writer),
        }
    }
}

/// Sets the status before the inner value commits the head.
impl<T: Responder> Responder for (StatusCode, T) {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        let (status, responder) = self;
        writer.set_status(status);
        responder.respond_to(writer)
    }
}

impl Responder for () {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        let status = writer.status();
        writer.write_header(status);
        Ok(())
    }
}

impl Responder for StatusCode {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        writer.write_header(self);
        Ok(())
    }
}

impl Responder for &'static str {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        write_text(writer, self.as_bytes());
        Ok(())
    }
}

impl Responder for String {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        write_text(writer, self.as_bytes());
        Ok(())
    }
}

impl Responder for Bytes {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        writer.insert_header_if_absent(http::header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_OCTET_STREAM));
        writer.write(&self);
        Ok(())
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn respond_to(self, writer: &mut ResponseWriter) -> HandlerResult {
        let bytes = serde_json::to_vec(&self.0)?;
        writer.insert_header_if_absent(http::header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        writer.write(&bytes);
        Ok(())
    }
}

fn write_text(writer: &mut ResponseWriter, bytes: &[u8]) {
    writer.insert_header_if_absent(http::header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
    writer.write(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct User {
        id: u32,
        name: &'static str,
    }

    #[test]
    fn string_is_plain_text() {
        let mut writer = ResponseWriter::new();
        "hello".respond_to(&mut writer).unwrap();

        assert_eq!(writer.committed_status(), Some(StatusCode::OK));
        assert_eq!(writer.headers()[http::header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(writer.written_body(), b"hello");
    }

    #[test]
    fn status_tuple_sets_status() {
        let mut writer = ResponseWriter::new();
        (StatusCode::CREATED, Json(User { id: 7, name: "ann" })).respond_to(&mut writer).unwrap();

        assert_eq!(writer.committed_status(), Some(StatusCode::CREATED));
        assert_eq!(writer.headers()[http::header::CONTENT_TYPE], "application/json");
        assert_eq!(writer.written_body(), br#"{"id":7,"name":"ann"}"#);
    }

    #[test]
    fn result_uses_matching_arm() {
        let mut writer = ResponseWriter::new();
        let result: Result<String, (StatusCode, &'static str)> = Err((StatusCode::BAD_REQUEST, "bad input"));
        result.respond_to(&mut writer).unwrap();

        assert_eq!(writer.committed_status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(writer.written_body(), b"bad input");
    }

    #[test]
    fn none_commits_empty_response() {
        let mut writer = ResponseWriter::new();
        Option::<String>::None.respond_to(&mut writer).unwrap();

        assert!(writer.is_written());
        assert!(writer.written_body().is_empty());
    }
}
