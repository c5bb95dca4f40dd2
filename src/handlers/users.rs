//! User account handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    error::{get_db_conn, ApiError, ApiResult},
    helpers::{
        ensure_email_available, hash_new_password, is_unique_violation, parse_image, parse_state,
    },
    models::{Author, Contribution, NewUser, User, UserChangeset, UserRole},
    pagination::{PageMeta, PageParams},
    schema::{contributions, users},
    validation::{non_blank, normalize_email},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 255, message = "Nome deve ter entre 2 e 255 caracteres"))]
    #[schema(example = "Maria Souza")]
    pub name: String,
    #[validate(email(message = "Email inválido"))]
    #[schema(example = "maria@example.com")]
    pub email: String,
    #[schema(example = "senha-segura")]
    pub password: String,
    /// COLLABORATOR or VOLUNTARY. Defaults to VOLUNTARY.
    #[schema(example = "VOLUNTARY")]
    pub role: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    #[schema(example = "SP")]
    pub state: Option<String>,
    /// Base64 data URL or http(s) link.
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 255, message = "Nome deve ter entre 2 e 255 caracteres"))]
    pub name: Option<String>,
    #[validate(email(message = "Email inválido"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// ADMIN, COLLABORATOR or VOLUNTARY
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub data: Vec<User>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContributionListResponse {
    pub data: Vec<Contribution>,
}

fn parse_signup_role(role: Option<&str>) -> ApiResult<UserRole> {
    let Some(raw) = role.filter(|r| !r.trim().is_empty()) else {
        return Ok(UserRole::Voluntary);
    };
    match UserRole::parse(raw) {
        Some(UserRole::Admin) => Err(ApiError::bad_request(
            "O perfil ADMIN não pode ser escolhido no cadastro",
            "ROLE_NOT_ALLOWED",
        )),
        Some(role) => Ok(role),
        None => Err(ApiError::bad_request("Perfil inválido", "INVALID_ROLE")),
    }
}

fn load_user(conn: &mut PgConnection, id: Uuid) -> ApiResult<User> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_user"))?
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado", "USER_NOT_FOUND"))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid data or email already in use", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    payload.validate().map_err(ApiError::validation)?;

    let role = parse_signup_role(payload.role.as_deref())?;
    let email = normalize_email(&payload.email);
    let user_state = parse_state(payload.state)?;
    let image = parse_image(payload.image)?;
    let password_hash = hash_new_password(
        &state.password_policy,
        state.password_hash_cost,
        &payload.password,
    )?;

    let mut conn = get_db_conn(&state.db_pool)?;
    ensure_email_available(&mut conn, &email, None)?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            role: role.as_str().to_string(),
            phone: non_blank(payload.phone),
            bio: non_blank(payload.bio),
            city: non_blank(payload.city),
            state: user_state,
            image,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Este email já está em uso", "EMAIL_IN_USE")
            } else {
                ApiError::from_db("create_user")(e)
            }
        })?;

    info!(user_id = %user.id, role = %role, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(PageParams, UserFilter),
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 400, description = "Unknown role filter", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<UserListResponse>> {
    let role = match non_blank(filter.role) {
        Some(r) => Some(
            UserRole::parse(&r)
                .ok_or_else(|| ApiError::bad_request("Perfil inválido", "INVALID_ROLE"))?,
        ),
        None => None,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let filtered = || -> users::BoxedQuery<'static, Pg> {
        let mut query = users::table.into_boxed();
        if let Some(role) = role {
            query = query.filter(users::role.eq(role.as_str()));
        }
        query
    };

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_users"))?;

    let data = filtered()
        .select(User::as_select())
        .order(users::name.asc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_users"))?;

    Ok(Json(UserListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_user(&mut conn, id).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid data", body = ApiError),
        (status = 403, description = "Not your account", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    payload.validate().map_err(ApiError::validation)?;

    if actor.as_author() != Author::User(id) {
        warn!(actor_id = %actor.id, target_id = %id, "Rejected update of another user");
        return Err(ApiError::forbidden(
            "Você só pode editar o seu próprio perfil",
            "FORBIDDEN",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    load_user(&mut conn, id)?;

    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        ensure_email_available(&mut conn, email, Some(id))?;
    }

    let password_hash = match payload.password.as_deref() {
        Some(pw) => Some(hash_new_password(
            &state.password_policy,
            state.password_hash_cost,
            pw,
        )?),
        None => None,
    };

    let changes = UserChangeset {
        name: non_blank(payload.name),
        email,
        password_hash,
        phone: non_blank(payload.phone),
        bio: non_blank(payload.bio),
        city: non_blank(payload.city),
        state: parse_state(payload.state)?,
        image: parse_image(payload.image)?,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let user = diesel::update(users::table.find(id))
        .set(&changes)
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Este email já está em uso", "EMAIL_IN_USE")
            } else {
                ApiError::from_db("update_user")(e)
            }
        })?;

    info!(user_id = %id, "User profile updated");

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let is_self = actor.as_author() == Author::User(id);
    if !is_self && !actor.is_admin() {
        return Err(ApiError::forbidden(
            "Você não pode excluir este usuário",
            "FORBIDDEN",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(users::table.find(id))
        .execute(&mut conn)
        .map_err(ApiError::from_db("delete_user"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Usuário não encontrado", "USER_NOT_FOUND"));
    }

    info!(user_id = %id, deleted_by = %actor.id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/contributions",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Contributions logged by the user", body = ContributionListResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_user_contributions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContributionListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_user(&mut conn, id)?;

    let data = contributions::table
        .filter(contributions::user_id.eq(id))
        .select(Contribution::as_select())
        .order(contributions::created_at.desc())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_user_contributions"))?;

    Ok(Json(ContributionListResponse { data }))
}
