//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server or
//! database is needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use immersion_api::error::AppError;
use immersion_core::error::CoreError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Convention",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Convention with id 42 not found");
}

#[tokio::test]
async fn not_found_by_key_names_the_key() {
    let err = AppError::Core(CoreError::NotFoundByKey {
        entity: "Establishment",
        key: "12345678901234".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Establishment 12345678901234 not found");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("Unknown notification kind 'fax'".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Unknown notification kind 'fax'");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("date_end must be after date_start".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "date_end must be after date_start");
}

#[tokio::test]
async fn conflict_error_returns_409() {
    let err = AppError::Core(CoreError::Conflict("already registered".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn unauthorized_and_forbidden_keep_their_message() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("Magic link expired".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Magic link expired");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Forbidden("Back-office only".into()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    for err in [
        AppError::InternalError("secret database credentials".into()),
        AppError::Core(CoreError::Internal("secret stack trace".into())),
    ] {
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json.to_string().contains("secret"));
        assert_eq!(json["error"], "An internal error occurred");
    }
}

#[tokio::test]
async fn row_not_found_maps_to_404() {
    let (status, _) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
