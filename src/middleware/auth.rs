//! Bearer token authentication.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use diesel::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{Actor, ActorKind};
use crate::error::{get_db_conn, ApiError};
use crate::models::User;
use crate::schema::{ongs, users};
use crate::AppState;

fn unauthorized(message: &str, code: &str) -> Response {
    ApiError::unauthorized(message, code).into_response()
}

fn bearer_token(req: &Request) -> Result<&str, Response> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Token não fornecido", "MISSING_TOKEN"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("Formato de token inválido", "INVALID_AUTH_FORMAT"))
}

/// Verifies the token, re-reads the account it names and stores the
/// resulting [`Actor`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&req)?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        unauthorized("Token inválido ou expirado", "INVALID_TOKEN")
    })?;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("Token inválido ou expirado", "INVALID_TOKEN"))?;

    let mut conn = get_db_conn(&state.db_pool).map_err(IntoResponse::into_response)?;

    let actor = match claims.kind {
        ActorKind::User => users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| ApiError::from_db("auth_load_user")(e).into_response())?
            .map(|user| Actor::user(user.id, user.user_role(), user.ong_id)),
        ActorKind::Ong => ongs::table
            .find(id)
            .select(ongs::id)
            .first::<Uuid>(&mut conn)
            .optional()
            .map_err(|e| ApiError::from_db("auth_load_ong")(e).into_response())?
            .map(Actor::ong),
    };

    let Some(actor) = actor else {
        warn!(subject = %id, kind = ?claims.kind, "Token refers to a deleted account");
        return Err(unauthorized("Conta não encontrada", "ACCOUNT_NOT_FOUND"));
    };

    drop(conn);
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
