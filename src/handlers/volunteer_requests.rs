//! Volunteer requests to join a project.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::Actor,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{invites::RespondRequest, ongs::load_ong, projects::load_project},
    helpers::{is_unique_violation, workflow_error, TransitionError},
    integrations::templates,
    models::{NewVolunteerRequest, User, UserRole, VolunteerRequest},
    pagination::{PageMeta, PageParams},
    schema::{projects, user_associate_project, users},
    telemetry::record_workflow_transition,
    validation::non_blank,
    workflow::{self, Decision, RequestPlan, RequestStatus, WorkflowError},
    AppState,
};

const WORKFLOW: &str = "volunteer_request";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VolunteerRequestFilter {
    /// REQUEST_PENDING_USER_TO_ONG, ACCEPTED or REJECTED_BY_ONG.
    pub status: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VolunteerRequestListResponse {
    pub data: Vec<VolunteerRequest>,
    pub pagination: PageMeta,
}

fn request_status(request: &VolunteerRequest) -> ApiResult<RequestStatus> {
    RequestStatus::parse(&request.status).ok_or_else(|| {
        error!(request_id = %request.id, status = %request.status, "Unknown volunteer request status");
        ApiError::internal("INVALID_STATUS")
    })
}

fn load_request(conn: &mut PgConnection, id: Uuid) -> ApiResult<VolunteerRequest> {
    user_associate_project::table
        .find(id)
        .select(VolunteerRequest::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_volunteer_request"))?
        .ok_or_else(|| ApiError::not_found("Solicitação não encontrada", "REQUEST_NOT_FOUND"))
}

fn load_user(conn: &mut PgConnection, id: Uuid) -> ApiResult<User> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .map_err(ApiError::from_db("volunteer_request_user"))
}

/// A rejected request is resubmitted in place; otherwise a new pending row
/// is inserted. Responds 201 for a new request and 200 for a resubmission.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/volunteer-requests",
    tag = "Volunteer requests",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 201, description = "Request created", body = VolunteerRequest),
        (status = 200, description = "Rejected request resubmitted", body = VolunteerRequest),
        (status = 403, description = "Only volunteers may apply", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 409, description = "Already pending or accepted", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_volunteer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<VolunteerRequest>)> {
    let user_id = actor.require_role(UserRole::Voluntary)?;
    let mut conn = get_db_conn(&state.db_pool)?;
    let project = load_project(&mut conn, project_id)?;

    let existing: Option<VolunteerRequest> = user_associate_project::table
        .filter(user_associate_project::user_id.eq(user_id))
        .filter(user_associate_project::project_id.eq(project_id))
        .select(VolunteerRequest::as_select())
        .first(&mut conn)
        .optional()
        .map_err(ApiError::from_db("find_volunteer_request"))?;

    let existing_status = existing.as_ref().map(request_status).transpose()?;
    let plan = workflow::plan_volunteer_request(existing_status).map_err(workflow_error)?;

    let pending = RequestStatus::RequestPendingUserToOng.as_str();
    let (status, request) = match (plan, existing) {
        (RequestPlan::Resubmit, Some(previous)) => {
            let resubmitted: Option<VolunteerRequest> = diesel::update(
                user_associate_project::table
                    .filter(user_associate_project::id.eq(previous.id))
                    .filter(user_associate_project::status.eq(RequestStatus::RejectedByOng.as_str())),
            )
            .set((
                user_associate_project::status.eq(pending),
                user_associate_project::updated_at.eq(Utc::now().naive_utc()),
            ))
            .returning(VolunteerRequest::as_returning())
            .get_result(&mut conn)
            .optional()
            .map_err(ApiError::from_db("resubmit_volunteer_request"))?;

            let request = resubmitted.ok_or_else(|| workflow_error(WorkflowError::AlreadyRequested))?;
            (StatusCode::OK, request)
        }
        _ => {
            let request = diesel::insert_into(user_associate_project::table)
                .values(&NewVolunteerRequest {
                    user_id,
                    project_id,
                    status: pending.to_string(),
                })
                .returning(VolunteerRequest::as_returning())
                .get_result(&mut conn)
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        workflow_error(WorkflowError::AlreadyRequested)
                    } else {
                        ApiError::from_db("create_volunteer_request")(e)
                    }
                })?;
            (StatusCode::CREATED, request)
        }
    };

    record_workflow_transition(WORKFLOW, pending);
    info!(
        request_id = %request.id,
        project_id = %project_id,
        user_id = %user_id,
        resubmitted = status == StatusCode::OK,
        "Volunteer request submitted"
    );

    let ong = load_ong(&mut conn, project.ong_id)?;
    let user = load_user(&mut conn, user_id)?;
    state.mailer.dispatch(templates::request_received(
        &state.frontend_url,
        &ong.email,
        &ong.name,
        &user.name,
        &project.name,
    ));

    Ok((status, Json(request)))
}

#[utoipa::path(
    get,
    path = "/api/v1/volunteer-requests",
    tag = "Volunteer requests",
    params(PageParams, VolunteerRequestFilter),
    responses(
        (status = 200, description = "Own requests, or requests for the managed NGO's projects", body = VolunteerRequestListResponse),
        (status = 400, description = "Unknown status", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_volunteer_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageParams>,
    Query(filter): Query<VolunteerRequestFilter>,
) -> ApiResult<Json<VolunteerRequestListResponse>> {
    let status = non_blank(filter.status)
        .map(|s| {
            RequestStatus::parse(&s.to_uppercase())
                .ok_or_else(|| ApiError::bad_request("Status inválido", "INVALID_STATUS"))
        })
        .transpose()?;
    let project_id = filter.project_id;
    let managed_ong = actor.managed_ong();
    let actor_id = actor.id;

    let filtered = move || -> user_associate_project::BoxedQuery<'static, Pg> {
        let mut query = match managed_ong {
            Some(ong_id) => user_associate_project::table
                .filter(
                    user_associate_project::project_id.eq_any(
                        projects::table
                            .filter(projects::ong_id.eq(ong_id))
                            .select(projects::id),
                    ),
                )
                .into_boxed(),
            None => user_associate_project::table
                .filter(user_associate_project::user_id.eq(actor_id))
                .into_boxed(),
        };
        if let Some(s) = status {
            query = query.filter(user_associate_project::status.eq(s.as_str()));
        }
        if let Some(id) = project_id {
            query = query.filter(user_associate_project::project_id.eq(id));
        }
        query
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_volunteer_requests"))?;

    let data = filtered()
        .select(VolunteerRequest::as_select())
        .order(user_associate_project::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_volunteer_requests"))?;

    Ok(Json(VolunteerRequestListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/volunteer-requests/{id}",
    tag = "Volunteer requests",
    params(("id" = Uuid, Path, description = "Volunteer request ID")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Request answered", body = VolunteerRequest),
        (status = 403, description = "Not a manager of the project's NGO", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError),
        (status = 409, description = "Already answered", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_to_volunteer_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<Json<VolunteerRequest>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let request = load_request(&mut conn, id)?;
    let project = load_project(&mut conn, request.project_id)?;

    if !actor.manages_ong(project.ong_id) {
        warn!(request_id = %id, actor_id = %actor.id, "Rejected answer to a request of another NGO");
        return Err(ApiError::forbidden(
            "Apenas a ONG responsável ou seus colaboradores podem responder",
            "FORBIDDEN",
        ));
    }

    let decision = Decision::from_accept(payload.accept);
    let next = workflow::respond_to_request(request_status(&request)?, decision)
        .map_err(workflow_error)?;

    let updated = conn
        .transaction::<_, TransitionError, _>(|conn| {
            let updated: Option<VolunteerRequest> = diesel::update(
                user_associate_project::table
                    .filter(user_associate_project::id.eq(id))
                    .filter(
                        user_associate_project::status
                            .eq(RequestStatus::RequestPendingUserToOng.as_str()),
                    ),
            )
            .set((
                user_associate_project::status.eq(next.as_str()),
                user_associate_project::updated_at.eq(Utc::now().naive_utc()),
            ))
            .returning(VolunteerRequest::as_returning())
            .get_result(conn)
            .optional()?;

            updated.ok_or(TransitionError::Workflow(WorkflowError::AlreadyResponded))
        })
        .map_err(|e| e.into_response("respond_to_volunteer_request"))?;

    record_workflow_transition(WORKFLOW, next.as_str());
    info!(request_id = %id, answered_by = %actor.id, status = next.as_str(), "Volunteer request answered");

    let user = load_user(&mut conn, request.user_id)?;
    state.mailer.dispatch(templates::request_answered(
        &state.frontend_url,
        &user.email,
        &user.name,
        &project.name,
        decision == Decision::Accept,
    ));

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/volunteer-requests/{id}",
    tag = "Volunteer requests",
    params(("id" = Uuid, Path, description = "Volunteer request ID")),
    responses(
        (status = 204, description = "Request cancelled"),
        (status = 403, description = "Not the requesting user", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError),
        (status = 409, description = "Request no longer pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_volunteer_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user_id = actor.require_user()?;
    let mut conn = get_db_conn(&state.db_pool)?;
    let request = load_request(&mut conn, id)?;

    if request.user_id != user_id {
        return Err(ApiError::forbidden(
            "Apenas quem fez a solicitação pode cancelá-la",
            "FORBIDDEN",
        ));
    }
    workflow::check_request_cancellation(request_status(&request)?).map_err(workflow_error)?;

    let removed = diesel::delete(
        user_associate_project::table
            .filter(user_associate_project::id.eq(id))
            .filter(
                user_associate_project::status.eq(RequestStatus::RequestPendingUserToOng.as_str()),
            ),
    )
    .execute(&mut conn)
    .map_err(ApiError::from_db("cancel_volunteer_request"))?;

    if removed == 0 {
        return Err(workflow_error(WorkflowError::NotPending));
    }

    info!(request_id = %id, user_id = %user_id, "Volunteer request cancelled");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_status_parsing() {
        let now = Utc::now().naive_utc();
        let mut request = VolunteerRequest {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            status: "REJECTED_BY_ONG".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(request_status(&request).unwrap(), RequestStatus::RejectedByOng);

        request.status = "REJECTED_BY_USER".to_string();
        assert!(request_status(&request).is_err());
    }

    #[test]
    fn test_filter_defaults() {
        let filter = VolunteerRequestFilter::default();
        assert!(filter.status.is_none());
        assert!(filter.project_id.is_none());
    }
}
