use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderValue, Response, StatusCode};
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;

use crate::gateway::GatewayError;

pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(err) => {
            log::error!("event=response_serialize_failed err={}", err);
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// OpenAI-style error envelope.
pub(crate) fn error_response(err: &GatewayError) -> Response<Body> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(
        status,
        &json!({
            "error": {
                "message": err.public_message(),
                "type": err.error_type(),
                "code": err.code(),
            }
        }),
    )
}

pub(crate) fn event_stream_response(
    frames: BoxStream<'static, Result<Bytes, Infallible>>,
) -> Response<Body> {
    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use futures::stream::{self, StreamExt};

    #[test]
    fn text_response_sets_status_and_plain_text_header() {
        let response = text_response(StatusCode::NOT_FOUND, "not found");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn exhausted_round_is_a_generic_503() {
        let response = error_response(&GatewayError::AllAttemptsExhausted { attempts: 4 });
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value["error"]["type"], "service_unavailable");
        assert_eq!(value["error"]["code"], "all_attempts_exhausted");
        assert!(!value["error"]["message"].as_str().unwrap_or("").contains('4'));
    }

    #[tokio::test]
    async fn event_stream_response_passes_frames_through() {
        let frames = stream::iter(vec![
            Ok::<_, Infallible>(Bytes::from_static(b"data: {}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ])
        .boxed();
        let response = event_stream_response(frames);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).and_then(|v| v.to_str().ok()),
            Some("no-cache")
        );
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        assert_eq!(&body[..], b"data: {}\n\ndata: [DONE]\n\n");
    }
}
