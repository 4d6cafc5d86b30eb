//! Request extractors that report failures through [`AppError`].

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejection is rendered in the standard error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Payload {
        slot: String,
    }

    fn app() -> Router {
        Router::new().route(
            "/echo",
            post(|AppJson(payload): AppJson<Payload>| async move { payload.slot }),
        )
    }

    fn request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_well_formed_body() {
        let response = app().oneshot(request(r#"{"slot":"9AM"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let response = app().oneshot(request(r#"{"date":"2025-06-01"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let response = app().oneshot(request("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
