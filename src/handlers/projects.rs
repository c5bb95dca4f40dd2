//! Project handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    error::{get_db_conn, ApiError, ApiResult},
    helpers::{parse_image, parse_state},
    models::{NewProject, Project, ProjectChangeset, User},
    pagination::{PageMeta, PageParams},
    schema::{projects, user_associate_project, users},
    validation::non_blank,
    workflow::RequestStatus,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Nome é obrigatório"))]
    #[schema(example = "Reforço escolar")]
    pub name: String,
    #[validate(length(min = 1, message = "Descrição é obrigatória"))]
    #[schema(example = "Aulas de reforço para crianças do bairro")]
    pub description: String,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Nome não pode ser vazio"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Descrição não pode ser vazia"))]
    pub description: Option<String>,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectFilter {
    pub ong_id: Option<Uuid>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub data: Vec<Project>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VolunteerListResponse {
    pub data: Vec<User>,
}

pub(crate) fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ApiResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ApiError::bad_request(
            "A data de término não pode ser anterior à data de início",
            "INVALID_DATES",
        )),
        _ => Ok(()),
    }
}

pub(crate) fn load_project(conn: &mut PgConnection, id: Uuid) -> ApiResult<Project> {
    projects::table
        .find(id)
        .select(Project::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_project"))?
        .ok_or_else(|| ApiError::not_found("Projeto não encontrado", "PROJECT_NOT_FOUND"))
}

fn require_manager(actor: &Actor, project: &Project) -> ApiResult<()> {
    if actor.manages_ong(project.ong_id) {
        Ok(())
    } else {
        warn!(actor_id = %actor.id, project_id = %project.id, "Rejected change to a project of another NGO");
        Err(ApiError::forbidden(
            "Apenas a ONG responsável ou seus colaboradores podem alterar este projeto",
            "FORBIDDEN",
        ))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "Projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid data", body = ApiError),
        (status = 403, description = "Only NGOs and their collaborators create projects", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Some(ong_id) = actor.managed_ong() else {
        return Err(ApiError::forbidden(
            "Apenas ONGs ou colaboradores vinculados podem criar projetos",
            "FORBIDDEN",
        ));
    };

    payload.validate().map_err(ApiError::validation)?;
    let name = non_blank(Some(payload.name))
        .ok_or_else(|| ApiError::bad_request("Nome é obrigatório", "MISSING_NAME"))?;
    let description = non_blank(Some(payload.description))
        .ok_or_else(|| ApiError::bad_request("Descrição é obrigatória", "MISSING_DESCRIPTION"))?;
    check_dates(payload.start_date, payload.end_date)?;

    let new_project = NewProject {
        ong_id,
        name,
        description,
        about: non_blank(payload.about),
        cause: non_blank(payload.cause),
        city: non_blank(payload.city),
        state: parse_state(payload.state)?,
        start_date: payload.start_date,
        end_date: payload.end_date,
        image: parse_image(payload.image)?,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let project = diesel::insert_into(projects::table)
        .values(&new_project)
        .returning(Project::as_returning())
        .get_result(&mut conn)
        .map_err(ApiError::from_db("create_project"))?;

    info!(project_id = %project.id, ong_id = %ong_id, created_by = %actor.id, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "Projects",
    params(PageParams, ProjectFilter),
    responses(
        (status = 200, description = "Projects, newest first", body = ProjectListResponse)
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Json<ProjectListResponse>> {
    let ong_id = filter.ong_id;
    let state_filter = non_blank(filter.state).map(|s| s.to_uppercase());
    let city = non_blank(filter.city);
    let cause = non_blank(filter.cause);

    let filtered = || -> projects::BoxedQuery<'static, Pg> {
        let mut query = projects::table.into_boxed();
        if let Some(id) = ong_id {
            query = query.filter(projects::ong_id.eq(id));
        }
        if let Some(s) = &state_filter {
            query = query.filter(projects::state.eq(s.clone()));
        }
        if let Some(c) = &city {
            query = query.filter(projects::city.ilike(c.clone()));
        }
        if let Some(c) = &cause {
            query = query.filter(projects::cause.ilike(c.clone()));
        }
        query
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_projects"))?;

    let data = filtered()
        .select(Project::as_select())
        .order(projects::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_projects"))?;

    Ok(Json(ProjectListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found", body = ApiError)
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_project(&mut conn, id).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Invalid data", body = ApiError),
        (status = 403, description = "Not a manager of the project", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    payload.validate().map_err(ApiError::validation)?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let current = load_project(&mut conn, id)?;
    require_manager(&actor, &current)?;

    check_dates(
        payload.start_date.or(current.start_date),
        payload.end_date.or(current.end_date),
    )?;

    let changes = ProjectChangeset {
        name: non_blank(payload.name),
        description: non_blank(payload.description),
        about: non_blank(payload.about),
        cause: non_blank(payload.cause),
        city: non_blank(payload.city),
        state: parse_state(payload.state)?,
        start_date: payload.start_date,
        end_date: payload.end_date,
        image: parse_image(payload.image)?,
        updated_at: Some(Utc::now().naive_utc()),
    };

    let project = diesel::update(projects::table.find(id))
        .set(&changes)
        .returning(Project::as_returning())
        .get_result(&mut conn)
        .map_err(ApiError::from_db("update_project"))?;

    info!(project_id = %id, updated_by = %actor.id, "Project updated");

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Not a manager of the project", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let project = load_project(&mut conn, id)?;
    require_manager(&actor, &project)?;

    diesel::delete(projects::table.find(id))
        .execute(&mut conn)
        .map_err(ApiError::from_db("delete_project"))?;

    info!(project_id = %id, deleted_by = %actor.id, "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/volunteers",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Accepted volunteers", body = VolunteerListResponse),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_volunteers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VolunteerListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_project(&mut conn, id)?;

    let data = user_associate_project::table
        .inner_join(users::table)
        .filter(user_associate_project::project_id.eq(id))
        .filter(user_associate_project::status.eq(RequestStatus::Accepted.as_str()))
        .select(User::as_select())
        .order(users::name.asc())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_volunteers"))?;

    Ok(Json(VolunteerListResponse { data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn project_of(ong_id: Uuid) -> Project {
        let now = Utc::now().naive_utc();
        Project {
            id: Uuid::new_v4(),
            ong_id,
            name: "Horta".to_string(),
            description: "Horta comunitária".to_string(),
            about: None,
            cause: None,
            city: None,
            state: None,
            start_date: None,
            end_date: None,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_check_dates() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        assert!(check_dates(d("2024-01-01"), d("2024-02-01")).is_ok());
        assert!(check_dates(d("2024-01-01"), None).is_ok());
        let (status, _) = check_dates(d("2024-02-01"), d("2024-01-01")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_require_manager() {
        let ong_id = Uuid::new_v4();
        let project = project_of(ong_id);

        assert!(require_manager(&Actor::ong(ong_id), &project).is_ok());
        assert!(require_manager(
            &Actor::user(Uuid::new_v4(), UserRole::Collaborator, Some(ong_id)),
            &project
        )
        .is_ok());

        let (status, _) = require_manager(&Actor::ong(Uuid::new_v4()), &project).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(require_manager(
            &Actor::user(Uuid::new_v4(), UserRole::Voluntary, Some(ong_id)),
            &project
        )
        .is_err());
    }
}
