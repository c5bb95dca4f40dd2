//! Shared helper functions for handlers.

use axum::{http::StatusCode, Json};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::password::{PasswordPolicy, PasswordService};
use crate::error::{ApiError, ApiResult};
use crate::models::Author;
use crate::schema::{ongs, users};
use crate::validation::{is_valid_image, non_blank, normalize_state};
use crate::workflow::WorkflowError;

pub fn workflow_error(err: WorkflowError) -> (StatusCode, Json<ApiError>) {
    if err.is_bad_request() {
        ApiError::bad_request(err.message(), err.code())
    } else {
        ApiError::conflict(err.message(), err.code())
    }
}

/// Error type for transactions that apply a workflow transition.
#[derive(Debug)]
pub enum TransitionError {
    Db(DieselError),
    Workflow(WorkflowError),
}

impl From<DieselError> for TransitionError {
    fn from(err: DieselError) -> Self {
        TransitionError::Db(err)
    }
}

impl TransitionError {
    pub fn into_response(self, context: &'static str) -> (StatusCode, Json<ApiError>) {
        match self {
            TransitionError::Db(e) => ApiError::from_db(context)(e),
            TransitionError::Workflow(e) => workflow_error(e),
        }
    }
}

pub fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Emails identify an account across both users and NGOs.
pub fn email_taken(
    conn: &mut PgConnection,
    email: &str,
    except: Option<Uuid>,
) -> QueryResult<bool> {
    let mut user_query = users::table
        .filter(users::email.eq(email))
        .select(users::id)
        .into_boxed();
    let mut ong_query = ongs::table
        .filter(ongs::email.eq(email))
        .select(ongs::id)
        .into_boxed();
    if let Some(id) = except {
        user_query = user_query.filter(users::id.ne(id));
        ong_query = ong_query.filter(ongs::id.ne(id));
    }

    let user_hit: Option<Uuid> = user_query.first(conn).optional()?;
    if user_hit.is_some() {
        return Ok(true);
    }
    let ong_hit: Option<Uuid> = ong_query.first(conn).optional()?;
    Ok(ong_hit.is_some())
}

pub fn ensure_email_available(
    conn: &mut PgConnection,
    email: &str,
    except: Option<Uuid>,
) -> ApiResult<()> {
    if email_taken(conn, email, except).map_err(ApiError::from_db("email_taken"))? {
        return Err(ApiError::bad_request(
            "Este email já está em uso",
            "EMAIL_IN_USE",
        ));
    }
    Ok(())
}

/// Applies the password policy and hashes with the configured cost.
pub fn hash_new_password(
    policy: &PasswordPolicy,
    cost: u32,
    password: &str,
) -> ApiResult<String> {
    policy
        .validate(password)
        .map_err(|e| ApiError::bad_request(e.to_string(), "WEAK_PASSWORD"))?;

    PasswordService::hash_password_with_cost(password, cost).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ApiError::internal("HASH_ERROR")
    })
}

/// Display names for a set of authors, resolved with one query per table.
pub fn author_names(
    conn: &mut PgConnection,
    authors: &[Author],
) -> QueryResult<HashMap<Author, String>> {
    let user_ids: Vec<Uuid> = authors.iter().filter_map(Author::user_id).collect();
    let ong_ids: Vec<Uuid> = authors.iter().filter_map(Author::ong_id).collect();
    let mut names = HashMap::with_capacity(authors.len());

    if !user_ids.is_empty() {
        let rows: Vec<(Uuid, String)> = users::table
            .filter(users::id.eq_any(&user_ids))
            .select((users::id, users::name))
            .load(conn)?;
        names.extend(rows.into_iter().map(|(id, name)| (Author::User(id), name)));
    }
    if !ong_ids.is_empty() {
        let rows: Vec<(Uuid, String)> = ongs::table
            .filter(ongs::id.eq_any(&ong_ids))
            .select((ongs::id, ongs::name))
            .load(conn)?;
        names.extend(rows.into_iter().map(|(id, name)| (Author::Ong(id), name)));
    }

    Ok(names)
}

pub fn author_name(conn: &mut PgConnection, author: Author) -> QueryResult<String> {
    match author {
        Author::User(id) => users::table.find(id).select(users::name).first(conn),
        Author::Ong(id) => ongs::table.find(id).select(ongs::name).first(conn),
    }
}

pub fn parse_state(state: Option<String>) -> ApiResult<Option<String>> {
    non_blank(state)
        .map(|s| {
            normalize_state(&s)
                .ok_or_else(|| ApiError::bad_request("Estado (UF) inválido", "INVALID_STATE"))
        })
        .transpose()
}

pub fn parse_image(image: Option<String>) -> ApiResult<Option<String>> {
    match non_blank(image) {
        Some(img) if !is_valid_image(&img) => Err(ApiError::bad_request(
            "Imagem deve ser uma data URL base64 ou um link http(s)",
            "INVALID_IMAGE",
        )),
        other => Ok(other),
    }
}

/// Escapes `%` and `_` so user input can be embedded in an ILIKE pattern.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_status() {
        assert_eq!(
            workflow_error(WorkflowError::NotCollaborator).0,
            StatusCode::BAD_REQUEST
        );
        let (status, Json(body)) = workflow_error(WorkflowError::AlreadyResponded);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "ALREADY_RESPONDED");
    }

    #[test]
    fn test_transition_error_mapping() {
        let (status, _) =
            TransitionError::Workflow(WorkflowError::AlreadyInOng).into_response("test");
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, Json(body)) = TransitionError::from(DieselError::NotFound).into_response("test");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "DB_ERROR");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("horta"), "%horta%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_hash_new_password_applies_policy() {
        let policy = PasswordPolicy::new(6);
        let (status, Json(body)) = hash_new_password(&policy, 4, "123").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "WEAK_PASSWORD");

        let hash = hash_new_password(&policy, 4, "123456").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_state_and_image_parsing() {
        assert_eq!(
            parse_state(Some("rj".to_string())).unwrap(),
            Some("RJ".to_string())
        );
        assert_eq!(parse_state(None).unwrap(), None);
        assert!(parse_state(Some("ZZ".to_string())).is_err());

        assert!(parse_image(Some("ftp://x".to_string())).is_err());
        assert_eq!(parse_image(Some(" ".to_string())).unwrap(), None);
    }

    #[test]
    fn test_unique_violation_detection() {
        assert!(!is_unique_violation(&DieselError::NotFound));
    }
}
