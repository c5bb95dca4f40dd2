//! Login, current actor and password reset handlers.

use axum::{extract::State, Extension, Json};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{actor::ONG_ROLE, password::PasswordService, Actor, ActorKind},
    error::{get_db_conn, ApiError, ApiResult},
    helpers::hash_new_password,
    integrations::templates,
    models::{NewPasswordResetToken, Ong, User},
    schema::{ongs, password_reset_tokens, users},
    telemetry::{record_login_attempt, LoginOutcome},
    validation::normalize_email,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Email inválido"))]
    #[schema(example = "maria@example.com")]
    pub email: String,
    #[schema(example = "senha-segura")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActorSummary {
    pub id: Uuid,
    #[schema(example = "VOLUNTARY")]
    pub role: String,
    #[schema(example = "Maria Souza")]
    pub name: String,
    #[schema(example = "maria@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    pub actor: ActorSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub kind: ActorKind,
    #[schema(example = "COLLABORATOR")]
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ong: Option<Ong>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Email inválido"))]
    #[schema(example = "maria@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForgotPasswordResponse {
    #[schema(example = "Se o email estiver cadastrado, você receberá um link para redefinir a senha")]
    pub message: String,
    /// Only returned in development.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token obrigatório"))]
    pub token: String,
    #[schema(example = "nova-senha-segura")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Senha redefinida com sucesso")]
    pub message: String,
}

/// An account that can sign in: either table shares email and password.
enum Account {
    User(User),
    Ong(Ong),
}

impl Account {
    fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<Self>> {
        let user = users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()?;
        if let Some(user) = user {
            return Ok(Some(Account::User(user)));
        }

        let ong = ongs::table
            .filter(ongs::email.eq(email))
            .select(Ong::as_select())
            .first(conn)
            .optional()?;
        Ok(ong.map(Account::Ong))
    }

    fn id(&self) -> Uuid {
        match self {
            Account::User(u) => u.id,
            Account::Ong(o) => o.id,
        }
    }

    fn kind(&self) -> ActorKind {
        match self {
            Account::User(_) => ActorKind::User,
            Account::Ong(_) => ActorKind::Ong,
        }
    }

    fn role(&self) -> &'static str {
        match self {
            Account::User(u) => u.user_role().as_str(),
            Account::Ong(_) => ONG_ROLE,
        }
    }

    fn name(&self) -> &str {
        match self {
            Account::User(u) => &u.name,
            Account::Ong(o) => &o.name,
        }
    }

    fn email(&self) -> &str {
        match self {
            Account::User(u) => &u.email,
            Account::Ong(o) => &o.email,
        }
    }

    fn password_hash(&self) -> &str {
        match self {
            Account::User(u) => &u.password_hash,
            Account::Ong(o) => &o.password_hash,
        }
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_reset_token() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    payload.validate().map_err(ApiError::validation)?;

    let email = normalize_email(&payload.email);
    let mut conn = get_db_conn(&state.db_pool)?;

    let invalid = || ApiError::unauthorized("Email ou senha inválidos", "INVALID_CREDENTIALS");

    let Some(account) =
        Account::find_by_email(&mut conn, &email).map_err(ApiError::from_db("login_lookup"))?
    else {
        warn!("Login attempt for unknown email");
        record_login_attempt("unknown", LoginOutcome::InvalidCredentials);
        return Err(invalid());
    };

    let actor_label = account.role().to_lowercase();

    let valid = PasswordService::verify_password(&payload.password, account.password_hash())
        .map_err(|e| {
            error!(error = %e, account_id = %account.id(), "Password verification error");
            ApiError::internal("PASSWORD_VERIFY_ERROR")
        })?;

    if !valid {
        warn!(account_id = %account.id(), "Failed login attempt");
        record_login_attempt(&actor_label, LoginOutcome::InvalidCredentials);
        return Err(invalid());
    }

    let token = state
        .jwt_config
        .generate_access_token(account.id(), account.kind(), account.role())
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("TOKEN_ERROR")
        })?;

    record_login_attempt(&actor_label, LoginOutcome::Success);
    info!(account_id = %account.id(), role = account.role(), "Logged in");

    Ok(Json(LoginResponse {
        token,
        actor: ActorSummary {
            id: account.id(),
            role: account.role().to_string(),
            name: account.name().to_string(),
            email: account.email().to_string(),
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<MeResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let (user, ong) = match actor.kind {
        ActorKind::User => {
            let user = users::table
                .find(actor.id)
                .select(User::as_select())
                .first(&mut conn)
                .map_err(ApiError::from_db("me_user"))?;
            (Some(user), None)
        }
        ActorKind::Ong => {
            let ong = ongs::table
                .find(actor.id)
                .select(Ong::as_select())
                .first(&mut conn)
                .map_err(ApiError::from_db("me_ong"))?;
            (None, Some(ong))
        }
    };

    Ok(Json(MeResponse {
        kind: actor.kind,
        role: actor.role().to_string(),
        user,
        ong,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/forgot-password",
    tag = "Authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested", body = ForgotPasswordResponse),
        (status = 400, description = "Validation error", body = ApiError)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    payload.validate().map_err(ApiError::validation)?;

    let email = normalize_email(&payload.email);
    let mut response = ForgotPasswordResponse {
        message: "Se o email estiver cadastrado, você receberá um link para redefinir a senha"
            .to_string(),
        reset_token: None,
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let Some(account) =
        Account::find_by_email(&mut conn, &email).map_err(ApiError::from_db("reset_lookup"))?
    else {
        info!("Password reset requested for unknown email");
        return Ok(Json(response));
    };

    let (user_id, ong_id) = match &account {
        Account::User(u) => (Some(u.id), None),
        Account::Ong(o) => (None, Some(o.id)),
    };

    let token = generate_reset_token();
    let expires_at =
        (Utc::now() + Duration::minutes(state.password_reset_expiry_mins)).naive_utc();

    conn.transaction(|conn| {
        diesel::delete(
            password_reset_tokens::table.filter(
                password_reset_tokens::user_id
                    .eq(user_id)
                    .or(password_reset_tokens::ong_id.eq(ong_id)),
            ),
        )
        .execute(conn)?;

        diesel::insert_into(password_reset_tokens::table)
            .values(&NewPasswordResetToken {
                user_id,
                ong_id,
                token_hash: hash_token(&token),
                expires_at,
            })
            .execute(conn)
    })
    .map_err(ApiError::from_db("reset_token_insert"))?;

    info!(account_id = %account.id(), "Password reset requested");

    state.mailer.dispatch(templates::password_reset(
        &state.frontend_url,
        account.email(),
        account.name(),
        &token,
        state.password_reset_expiry_mins,
    ));

    if state.environment.is_development() {
        response.reset_token = Some(token);
    }

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    payload.validate().map_err(ApiError::validation)?;

    let password_hash = hash_new_password(
        &state.password_policy,
        state.password_hash_cost,
        &payload.password,
    )?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let now = Utc::now().naive_utc();

    let record: Option<(Uuid, Option<Uuid>, Option<Uuid>)> = password_reset_tokens::table
        .filter(password_reset_tokens::token_hash.eq(hash_token(&payload.token)))
        .filter(password_reset_tokens::expires_at.gt(now))
        .filter(password_reset_tokens::used_at.is_null())
        .select((
            password_reset_tokens::id,
            password_reset_tokens::user_id,
            password_reset_tokens::ong_id,
        ))
        .first(&mut conn)
        .optional()
        .map_err(ApiError::from_db("reset_token_lookup"))?;

    let Some((token_id, user_id, ong_id)) = record else {
        warn!("Rejected password reset token");
        return Err(ApiError::bad_request(
            "Token inválido ou expirado",
            "INVALID_RESET_TOKEN",
        ));
    };

    let reset = conn.transaction(|conn| {
        // claiming the token first makes a concurrent reuse update zero rows
        let claimed = diesel::update(
            password_reset_tokens::table
                .filter(password_reset_tokens::id.eq(token_id))
                .filter(password_reset_tokens::used_at.is_null()),
        )
        .set(password_reset_tokens::used_at.eq(Some(now)))
        .execute(conn)?;
        if claimed == 0 {
            return Ok(false);
        }

        if let Some(id) = user_id {
            diesel::update(users::table.find(id))
                .set((users::password_hash.eq(&password_hash), users::updated_at.eq(now)))
                .execute(conn)?;
        }
        if let Some(id) = ong_id {
            diesel::update(ongs::table.find(id))
                .set((ongs::password_hash.eq(&password_hash), ongs::updated_at.eq(now)))
                .execute(conn)?;
        }
        Ok::<_, diesel::result::Error>(true)
    })
    .map_err(ApiError::from_db("reset_password"))?;

    if !reset {
        return Err(ApiError::bad_request(
            "Token inválido ou expirado",
            "INVALID_RESET_TOKEN",
        ));
    }

    info!(user_id = ?user_id, ong_id = ?ong_id, "Password reset completed");

    Ok(Json(MessageResponse {
        message: "Senha redefinida com sucesso".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_tokens_are_random_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_login_request_validation() {
        let bad = LoginRequest {
            email: "not-an-email".to_string(),
            password: "x".to_string(),
        };
        assert!(bad.validate().is_err());
    }
}
