//! NGO invitations to collaborators.

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
    auth::{Actor, ActorKind},
    error::{get_db_conn, ApiError, ApiResult},
    handlers::ongs::load_ong,
    helpers::{is_unique_violation, workflow_error, TransitionError},
    integrations::templates,
    models::{Invite, NewInvite, User},
    pagination::{PageMeta, PageParams},
    schema::{associate_user_ong, users},
    telemetry::record_workflow_transition,
    validation::{non_blank, normalize_email},
    workflow::{self, Decision, InviteStatus, WorkflowError},
    AppState,
};

const WORKFLOW: &str = "invite";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInviteRequest {
    /// Target user; alternatively identify them by `email`.
    pub user_id: Option<Uuid>,
    #[schema(example = "joao@example.com")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InviteFilter {
    /// INVITE_PENDING_ONG_TO_USER, ACCEPTED or REJECTED_BY_USER.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InviteListResponse {
    pub data: Vec<Invite>,
    pub pagination: PageMeta,
}

fn invite_status(invite: &Invite) -> ApiResult<InviteStatus> {
    InviteStatus::parse(&invite.status).ok_or_else(|| {
        error!(invite_id = %invite.id, status = %invite.status, "Unknown invite status");
        ApiError::internal("INVALID_STATUS")
    })
}

fn load_invite(conn: &mut PgConnection, id: Uuid) -> ApiResult<Invite> {
    associate_user_ong::table
        .find(id)
        .select(Invite::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_invite"))?
        .ok_or_else(|| ApiError::not_found("Convite não encontrado", "INVITE_NOT_FOUND"))
}

fn find_target(conn: &mut PgConnection, payload: CreateInviteRequest) -> ApiResult<User> {
    let query: users::BoxedQuery<'static, Pg> = match (payload.user_id, non_blank(payload.email)) {
        (Some(id), _) => users::table.filter(users::id.eq(id)).into_boxed(),
        (None, Some(email)) => users::table
            .filter(users::email.eq(normalize_email(&email)))
            .into_boxed(),
        (None, None) => {
            return Err(ApiError::bad_request(
                "Informe o usuário ou o email a ser convidado",
                "MISSING_TARGET",
            ))
        }
    };

    query
        .select(User::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("find_invite_target"))?
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado", "USER_NOT_FOUND"))
}

#[utoipa::path(
    post,
    path = "/api/v1/invites",
    tag = "Invites",
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invite sent", body = Invite),
        (status = 400, description = "Target is not a collaborator", body = ApiError),
        (status = 403, description = "Only NGOs invite", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "Already in an NGO or already invited", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<Invite>)> {
    let ong_id = actor.require_ong()?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let target = find_target(&mut conn, payload)?;

    let existing: Option<String> = associate_user_ong::table
        .filter(associate_user_ong::user_id.eq(target.id))
        .filter(associate_user_ong::ong_id.eq(ong_id))
        .select(associate_user_ong::status)
        .first(&mut conn)
        .optional()
        .map_err(ApiError::from_db("find_existing_invite"))?;

    // a row with an unknown status still counts as an existing relation
    let existing = existing.map(|s| {
        InviteStatus::parse(&s).unwrap_or(InviteStatus::InvitePendingOngToUser)
    });

    workflow::check_invite(target.user_role(), target.ong_id, existing).map_err(|e| {
        info!(ong_id = %ong_id, user_id = %target.id, reason = e.code(), "Invite refused");
        workflow_error(e)
    })?;

    let status = InviteStatus::InvitePendingOngToUser;
    let invite = diesel::insert_into(associate_user_ong::table)
        .values(&NewInvite {
            user_id: target.id,
            ong_id,
            status: status.as_str().to_string(),
        })
        .returning(Invite::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                workflow_error(WorkflowError::AlreadyInvited)
            } else {
                ApiError::from_db("create_invite")(e)
            }
        })?;

    record_workflow_transition(WORKFLOW, status.as_str());
    info!(invite_id = %invite.id, ong_id = %ong_id, user_id = %target.id, "Invite created");

    let ong = load_ong(&mut conn, ong_id)?;
    state.mailer.dispatch(templates::invite_received(
        &state.frontend_url,
        &target.email,
        &target.name,
        &ong.name,
    ));

    Ok((StatusCode::CREATED, Json(invite)))
}

#[utoipa::path(
    get,
    path = "/api/v1/invites",
    tag = "Invites",
    params(PageParams, InviteFilter),
    responses(
        (status = 200, description = "Invites received (users) or sent (NGOs)", body = InviteListResponse),
        (status = 400, description = "Unknown status", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_invites(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageParams>,
    Query(filter): Query<InviteFilter>,
) -> ApiResult<Json<InviteListResponse>> {
    let status = non_blank(filter.status)
        .map(|s| {
            InviteStatus::parse(&s.to_uppercase())
                .ok_or_else(|| ApiError::bad_request("Status inválido", "INVALID_STATUS"))
        })
        .transpose()?;

    let (kind, id) = (actor.kind, actor.id);
    let filtered = move || -> associate_user_ong::BoxedQuery<'static, Pg> {
        let mut query = match kind {
            ActorKind::User => associate_user_ong::table
                .filter(associate_user_ong::user_id.eq(id))
                .into_boxed(),
            ActorKind::Ong => associate_user_ong::table
                .filter(associate_user_ong::ong_id.eq(id))
                .into_boxed(),
        };
        if let Some(s) = status {
            query = query.filter(associate_user_ong::status.eq(s.as_str()));
        }
        query
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_invites"))?;

    let data = filtered()
        .select(Invite::as_select())
        .order(associate_user_ong::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_invites"))?;

    Ok(Json(InviteListResponse {
        data,
        pagination: page.meta(total),
    }))
}

/// Accepting sets the user's NGO in the same transaction as the status
/// change. Both writes are conditional so concurrent answers apply once.
#[utoipa::path(
    put,
    path = "/api/v1/invites/{id}",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "Invite ID")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Invite answered", body = Invite),
        (status = 403, description = "Not the invited user", body = ApiError),
        (status = 404, description = "Invite not found", body = ApiError),
        (status = 409, description = "Already answered or user joined another NGO", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_to_invite(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<Json<Invite>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let invite = load_invite(&mut conn, id)?;

    if actor.kind != ActorKind::User || invite.user_id != actor.id {
        warn!(invite_id = %id, actor_id = %actor.id, "Rejected answer to another user's invite");
        return Err(ApiError::forbidden(
            "Apenas o usuário convidado pode responder",
            "FORBIDDEN",
        ));
    }

    let decision = Decision::from_accept(payload.accept);
    let next = workflow::respond_to_invite(invite_status(&invite)?, decision)
        .map_err(workflow_error)?;

    let pending = InviteStatus::InvitePendingOngToUser.as_str();
    let updated = conn
        .transaction::<_, TransitionError, _>(|conn| {
            let now = Utc::now().naive_utc();
            let updated: Option<Invite> = diesel::update(
                associate_user_ong::table
                    .filter(associate_user_ong::id.eq(id))
                    .filter(associate_user_ong::status.eq(pending)),
            )
            .set((
                associate_user_ong::status.eq(next.as_str()),
                associate_user_ong::updated_at.eq(now),
            ))
            .returning(Invite::as_returning())
            .get_result(conn)
            .optional()?;

            let Some(updated) = updated else {
                return Err(TransitionError::Workflow(WorkflowError::AlreadyResponded));
            };

            if decision == Decision::Accept {
                let joined = diesel::update(
                    users::table
                        .filter(users::id.eq(invite.user_id))
                        .filter(users::ong_id.is_null()),
                )
                .set((
                    users::ong_id.eq(invite.ong_id),
                    users::updated_at.eq(now),
                ))
                .execute(conn)?;

                if joined == 0 {
                    return Err(TransitionError::Workflow(WorkflowError::AlreadyInOng));
                }
            }

            Ok(updated)
        })
        .map_err(|e| e.into_response("respond_to_invite"))?;

    record_workflow_transition(WORKFLOW, next.as_str());
    info!(invite_id = %id, user_id = %actor.id, status = next.as_str(), "Invite answered");

    let ong = load_ong(&mut conn, invite.ong_id)?;
    let user_name: String = users::table
        .find(invite.user_id)
        .select(users::name)
        .first(&mut conn)
        .map_err(ApiError::from_db("invite_user_name"))?;
    state.mailer.dispatch(templates::invite_answered(
        &state.frontend_url,
        &ong.email,
        &ong.name,
        &user_name,
        decision == Decision::Accept,
    ));

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/invites/{id}",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 204, description = "Invite withdrawn"),
        (status = 403, description = "Not the inviting NGO", body = ApiError),
        (status = 404, description = "Invite not found", body = ApiError),
        (status = 409, description = "Invite no longer pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn withdraw_invite(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ong_id = actor.require_ong()?;
    let mut conn = get_db_conn(&state.db_pool)?;
    let invite = load_invite(&mut conn, id)?;

    if invite.ong_id != ong_id {
        return Err(ApiError::forbidden(
            "Apenas a ONG que enviou o convite pode cancelá-lo",
            "FORBIDDEN",
        ));
    }
    workflow::check_invite_withdrawal(invite_status(&invite)?).map_err(workflow_error)?;

    let removed = diesel::delete(
        associate_user_ong::table
            .filter(associate_user_ong::id.eq(id))
            .filter(associate_user_ong::status.eq(InviteStatus::InvitePendingOngToUser.as_str())),
    )
    .execute(&mut conn)
    .map_err(ApiError::from_db("withdraw_invite"))?;

    if removed == 0 {
        return Err(workflow_error(WorkflowError::NotPending));
    }

    info!(invite_id = %id, ong_id = %ong_id, "Invite withdrawn");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite_with(status: &str) -> Invite {
        let now = Utc::now().naive_utc();
        Invite {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ong_id: Uuid::new_v4(),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_invite_status_parsing() {
        assert_eq!(
            invite_status(&invite_with("ACCEPTED")).unwrap(),
            InviteStatus::Accepted
        );
        let (status, _) = invite_status(&invite_with("SOMETHING")).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_respond_request_shape() {
        let req: RespondRequest = serde_json::from_str(r#"{"accept": true}"#).unwrap();
        assert!(req.accept);
        assert!(serde_json::from_str::<RespondRequest>("{}").is_err());
    }
}
