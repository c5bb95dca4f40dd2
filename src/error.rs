//! Shared error handling utilities.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::DbPool;

pub const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor";

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[schema(example = "Usuário não encontrado")]
    pub error: String,
    #[schema(example = "USER_NOT_FOUND")]
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(error, code)))
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(error, code)))
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(error, code)))
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }

    pub fn conflict(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(error, code)))
    }

    pub fn bad_gateway(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_GATEWAY, Json(Self::new(error, code)))
    }

    pub fn internal(code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(INTERNAL_ERROR_MESSAGE, code)),
        )
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("DB_ERROR")
    }

    /// Logs the diesel error and maps it to the generic 500 response.
    pub fn from_db(context: &'static str) -> impl FnOnce(diesel::result::Error) -> (StatusCode, Json<Self>) {
        move |e| {
            error!(error = %e, context, "Database query failed");
            Self::db_error()
        }
    }

    pub fn validation(errors: validator::ValidationErrors) -> (StatusCode, Json<Self>) {
        Self::bad_request(
            format!("Dados inválidos: {}", errors),
            "VALIDATION_ERROR",
        )
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub type DbConn =
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>;

pub fn get_db_conn(pool: &DbPool) -> Result<DbConn, (StatusCode, Json<ApiError>)> {
    pool.get().map_err(|e| {
        error!(error = %e, "Database connection error");
        ApiError::internal("DB_CONNECTION_ERROR")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_uses_generic_message() {
        let (status, Json(body)) = ApiError::internal("SOMETHING_BROKE");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, INTERNAL_ERROR_MESSAGE);
        assert_eq!(body.code, "SOMETHING_BROKE");
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(ApiError::bad_request("x", "X").0, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x", "X").0, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x", "X").0, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x", "X").0, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x", "X").0, StatusCode::CONFLICT);
        assert_eq!(ApiError::bad_gateway("x", "X").0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_db_error_mapping() {
        let map = ApiError::from_db("test");
        let (status, Json(body)) = map(diesel::result::Error::NotFound);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "DB_ERROR");
    }
}
