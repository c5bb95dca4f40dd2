//! NGO account handlers.

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
    models::{NewOng, Ong, OngChangeset, Project, User},
    pagination::{PageMeta, PageParams},
    schema::{associate_user_ong, ongs, projects, users},
    validation::{non_blank, normalize_cep, normalize_cnpj, normalize_email},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOngRequest {
    #[validate(length(min = 2, max = 255, message = "Nome deve ter entre 2 e 255 caracteres"))]
    #[schema(example = "Instituto Mãos Dadas")]
    pub name: String,
    #[validate(email(message = "Email inválido"))]
    #[schema(example = "contato@maosdadas.org")]
    pub email: String,
    pub password: String,
    #[schema(example = "11.222.333/0001-81")]
    pub cnpj: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    #[schema(example = "Educação")]
    pub cause: Option<String>,
    #[schema(example = "01001-000")]
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    #[schema(example = "SP")]
    pub state: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
}

/// The CNPJ is fixed at registration and cannot be changed.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOngRequest {
    #[validate(length(min = 2, max = 255, message = "Nome deve ter entre 2 e 255 caracteres"))]
    pub name: Option<String>,
    #[validate(email(message = "Email inválido"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OngFilter {
    #[param(example = "SP")]
    pub state: Option<String>,
    pub city: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OngListResponse {
    pub data: Vec<Ong>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OngProjectsResponse {
    pub data: Vec<Project>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CollaboratorListResponse {
    pub data: Vec<User>,
}

fn parse_cep(cep: Option<String>) -> ApiResult<Option<String>> {
    non_blank(cep)
        .map(|c| normalize_cep(&c).ok_or_else(|| ApiError::bad_request("CEP inválido", "INVALID_CEP")))
        .transpose()
}

pub(crate) fn load_ong(conn: &mut PgConnection, id: Uuid) -> ApiResult<Ong> {
    ongs::table
        .find(id)
        .select(Ong::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_ong"))?
        .ok_or_else(|| ApiError::not_found("ONG não encontrada", "ONG_NOT_FOUND"))
}

fn ensure_cnpj_available(conn: &mut PgConnection, cnpj: &str) -> ApiResult<()> {
    let existing: Option<Uuid> = ongs::table
        .filter(ongs::cnpj.eq(cnpj))
        .select(ongs::id)
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("cnpj_lookup"))?;

    match existing {
        Some(_) => Err(ApiError::bad_request(
            "Este CNPJ já está cadastrado",
            "CNPJ_IN_USE",
        )),
        None => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/ongs",
    tag = "Ongs",
    request_body = CreateOngRequest,
    responses(
        (status = 201, description = "NGO registered", body = Ong),
        (status = 400, description = "Invalid data, email or CNPJ in use", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn create_ong(
    State(state): State<AppState>,
    Json(payload): Json<CreateOngRequest>,
) -> ApiResult<(StatusCode, Json<Ong>)> {
    payload.validate().map_err(ApiError::validation)?;

    let cnpj = normalize_cnpj(&payload.cnpj)
        .ok_or_else(|| ApiError::bad_request("CNPJ inválido", "INVALID_CNPJ"))?;
    let email = normalize_email(&payload.email);
    let cep = parse_cep(payload.cep)?;
    let ong_state = parse_state(payload.state)?;
    let image = parse_image(payload.image)?;
    let password_hash = hash_new_password(
        &state.password_policy,
        state.password_hash_cost,
        &payload.password,
    )?;

    let mut conn = get_db_conn(&state.db_pool)?;
    ensure_email_available(&mut conn, &email, None)?;
    ensure_cnpj_available(&mut conn, &cnpj)?;

    let ong: Ong = diesel::insert_into(ongs::table)
        .values(&NewOng {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            cnpj,
            phone: non_blank(payload.phone),
            description: non_blank(payload.description),
            about: non_blank(payload.about),
            cause: non_blank(payload.cause),
            cep,
            street: non_blank(payload.street),
            number: non_blank(payload.number),
            district: non_blank(payload.district),
            city: non_blank(payload.city),
            state: ong_state,
            website: non_blank(payload.website),
            image,
        })
        .returning(Ong::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Email ou CNPJ já cadastrado", "ONG_ALREADY_EXISTS")
            } else {
                ApiError::from_db("create_ong")(e)
            }
        })?;

    info!(ong_id = %ong.id, "NGO registered");

    Ok((StatusCode::CREATED, Json(ong)))
}

#[utoipa::path(
    get,
    path = "/api/v1/ongs",
    tag = "Ongs",
    params(PageParams, OngFilter),
    responses(
        (status = 200, description = "NGOs", body = OngListResponse)
    )
)]
pub async fn list_ongs(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<OngFilter>,
) -> ApiResult<Json<OngListResponse>> {
    let state_filter = non_blank(filter.state).map(|s| s.to_uppercase());
    let city = non_blank(filter.city);
    let cause = non_blank(filter.cause);

    let filtered = || -> ongs::BoxedQuery<'static, Pg> {
        let mut query = ongs::table.into_boxed();
        if let Some(s) = &state_filter {
            query = query.filter(ongs::state.eq(s.clone()));
        }
        if let Some(c) = &city {
            query = query.filter(ongs::city.ilike(c.clone()));
        }
        if let Some(c) = &cause {
            query = query.filter(ongs::cause.ilike(c.clone()));
        }
        query
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_ongs"))?;

    let data = filtered()
        .select(Ong::as_select())
        .order(ongs::name.asc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_ongs"))?;

    Ok(Json(OngListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/ongs/{id}",
    tag = "Ongs",
    params(("id" = Uuid, Path, description = "NGO ID")),
    responses(
        (status = 200, description = "NGO", body = Ong),
        (status = 404, description = "NGO not found", body = ApiError)
    )
)]
pub async fn get_ong(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Ong>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_ong(&mut conn, id).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/v1/ongs/{id}",
    tag = "Ongs",
    params(("id" = Uuid, Path, description = "NGO ID")),
    request_body = UpdateOngRequest,
    responses(
        (status = 200, description = "NGO updated", body = Ong),
        (status = 400, description = "Invalid data", body = ApiError),
        (status = 403, description = "Not your NGO", body = ApiError),
        (status = 404, description = "NGO not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_ong(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOngRequest>,
) -> ApiResult<Json<Ong>> {
    payload.validate().map_err(ApiError::validation)?;

    if !(actor.is_ong() && actor.id == id) {
        warn!(actor_id = %actor.id, ong_id = %id, "Rejected update of another NGO");
        return Err(ApiError::forbidden(
            "Você só pode editar o perfil da sua ONG",
            "FORBIDDEN",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    load_ong(&mut conn, id)?;

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

    let changes = OngChangeset {
        name: non_blank(payload.name),
        email,
        password_hash,
        phone: non_blank(payload.phone),
        description: non_blank(payload.description),
        about: non_blank(payload.about),
        cause: non_blank(payload.cause),
        cep: parse_cep(payload.cep)?,
        street: non_blank(payload.street),
        number: non_blank(payload.number),
        district: non_blank(payload.district),
        city: non_blank(payload.city),
        state: parse_state(payload.state)?,
        website: non_blank(payload.website),
        image: parse_image(payload.image)?,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let ong = diesel::update(ongs::table.find(id))
        .set(&changes)
        .returning(Ong::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Este email já está em uso", "EMAIL_IN_USE")
            } else {
                ApiError::from_db("update_ong")(e)
            }
        })?;

    info!(ong_id = %id, "NGO profile updated");

    Ok(Json(ong))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ongs/{id}",
    tag = "Ongs",
    params(("id" = Uuid, Path, description = "NGO ID")),
    responses(
        (status = 204, description = "NGO deleted"),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "NGO not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_ong(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let is_self = actor.is_ong() && actor.id == id;
    if !is_self && !actor.is_admin() {
        return Err(ApiError::forbidden(
            "Você não pode excluir esta ONG",
            "FORBIDDEN",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = conn
        .transaction(|conn| {
            let released = diesel::update(users::table.filter(users::ong_id.eq(id)))
                .set(users::ong_id.eq(None::<Uuid>))
                .execute(conn)?;
            let deleted = diesel::delete(ongs::table.find(id)).execute(conn)?;
            if deleted > 0 {
                info!(ong_id = %id, collaborators_released = released, "NGO deleted");
            }
            Ok::<_, diesel::result::Error>(deleted)
        })
        .map_err(ApiError::from_db("delete_ong"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("ONG não encontrada", "ONG_NOT_FOUND"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/ongs/{id}/projects",
    tag = "Ongs",
    params(("id" = Uuid, Path, description = "NGO ID")),
    responses(
        (status = 200, description = "Projects of the NGO", body = OngProjectsResponse),
        (status = 404, description = "NGO not found", body = ApiError)
    )
)]
pub async fn list_ong_projects(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OngProjectsResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_ong(&mut conn, id)?;

    let data = projects::table
        .filter(projects::ong_id.eq(id))
        .select(Project::as_select())
        .order(projects::created_at.desc())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_ong_projects"))?;

    Ok(Json(OngProjectsResponse { data }))
}

#[utoipa::path(
    get,
    path = "/api/v1/ongs/{id}/collaborators",
    tag = "Ongs",
    params(("id" = Uuid, Path, description = "NGO ID")),
    responses(
        (status = 200, description = "Collaborators attached to the NGO", body = CollaboratorListResponse),
        (status = 404, description = "NGO not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_collaborators(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CollaboratorListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_ong(&mut conn, id)?;

    let data = users::table
        .filter(users::ong_id.eq(id))
        .select(User::as_select())
        .order(users::name.asc())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_collaborators"))?;

    Ok(Json(CollaboratorListResponse { data }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ongs/{id}/collaborators/{user_id}",
    tag = "Ongs",
    params(
        ("id" = Uuid, Path, description = "NGO ID"),
        ("user_id" = Uuid, Path, description = "Collaborator user ID")
    ),
    responses(
        (status = 204, description = "Collaborator removed"),
        (status = 403, description = "Not your NGO", body = ApiError),
        (status = 404, description = "Not a collaborator of this NGO", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_collaborator(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let ong_id = actor.require_ong()?;
    if ong_id != id {
        return Err(ApiError::forbidden(
            "Você só pode gerenciar os colaboradores da sua ONG",
            "FORBIDDEN",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let released = conn
        .transaction(|conn| {
            let released = diesel::update(
                users::table
                    .filter(users::id.eq(user_id))
                    .filter(users::ong_id.eq(ong_id)),
            )
            .set((
                users::ong_id.eq(None::<Uuid>),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

            if released > 0 {
                diesel::delete(
                    associate_user_ong::table
                        .filter(associate_user_ong::user_id.eq(user_id))
                        .filter(associate_user_ong::ong_id.eq(ong_id)),
                )
                .execute(conn)?;
            }
            Ok::<_, diesel::result::Error>(released)
        })
        .map_err(ApiError::from_db("remove_collaborator"))?;

    if released == 0 {
        return Err(ApiError::not_found(
            "Colaborador não encontrado nesta ONG",
            "COLLABORATOR_NOT_FOUND",
        ));
    }

    info!(ong_id = %ong_id, user_id = %user_id, "Collaborator removed");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cep() {
        assert_eq!(
            parse_cep(Some("01001-000".to_string())).unwrap(),
            Some("01001000".to_string())
        );
        assert_eq!(parse_cep(None).unwrap(), None);
        let (status, Json(body)) = parse_cep(Some("123".to_string())).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_CEP");
    }

    #[test]
    fn test_create_request_requires_valid_email() {
        let request = CreateOngRequest {
            name: "Instituto".to_string(),
            email: "sem-arroba".to_string(),
            password: "senha-segura".to_string(),
            cnpj: "11222333000181".to_string(),
            phone: None,
            description: None,
            about: None,
            cause: None,
            cep: None,
            street: None,
            number: None,
            district: None,
            city: None,
            state: None,
            website: None,
            image: None,
        };
        assert!(request.validate().is_err());
    }
}
