use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use proventory_auth::AuthzError;
use proventory_core::DomainError;
use proventory_infra::BackendError;
use proventory_reports::ExportError;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    Backend(BackendError),
    Forbidden(AuthzError),
    Export(ExportError),
}

pub type ApiResult<T = Response> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<proventory_core::ValidationErrors> for ApiError {
    fn from(value: proventory_core::ValidationErrors) -> Self {
        Self::Domain(value.into())
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        Self::Forbidden(value)
    }
}

impl From<ExportError> for ApiError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Backend(e) => backend_error_to_response(e),
            ApiError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
            ApiError::Export(e) => {
                tracing::error!(error = %e, "export failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_error", e.to_string())
            }
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::Fields(fields) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": fields.to_string(),
                "fields": fields,
            })),
        )
            .into_response(),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
    }
}

pub fn backend_error_to_response(err: BackendError) -> Response {
    if let Some(domain) = err.to_domain() {
        return domain_error_to_response(domain);
    }
    tracing::warn!(error = %err, "backend call failed");
    json_error(StatusCode::BAD_GATEWAY, "backend_error", err.to_string())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proventory_core::ValidationErrors;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::from(DomainError::validation("x")), StatusCode::BAD_REQUEST),
            (ApiError::from(DomainError::invariant("x")), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(DomainError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::from(DomainError::conflict("x")), StatusCode::CONFLICT),
            (ApiError::from(DomainError::Unauthorized), StatusCode::FORBIDDEN),
            (ApiError::from(AuthzError::TenantMismatch), StatusCode::FORBIDDEN),
            (ApiError::from(BackendError::not_found("items", "1")), StatusCode::NOT_FOUND),
            (ApiError::from(BackendError::Conflict("dup".into())), StatusCode::CONFLICT),
            (ApiError::from(BackendError::Transport("down".into())), StatusCode::BAD_GATEWAY),
            (
                ApiError::from(BackendError::Http { status: 500, message: "boom".into() }),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }

        let mut fields = ValidationErrors::new();
        fields.add("sku", "is required");
        assert_eq!(ApiError::from(fields).into_response().status(), StatusCode::BAD_REQUEST);
    }
}
