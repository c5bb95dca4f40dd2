//! Volunteering records logged by users and rated by NGOs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Actor, ActorKind},
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{ongs::load_ong, projects::check_dates},
    models::{Contribution, NewContribution},
    pagination::{PageMeta, PageParams},
    schema::contributions,
    validation::non_blank,
    AppState,
};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateContributionRequest {
    #[validate(length(min = 1, max = 255, message = "Título é obrigatório"))]
    #[schema(example = "Mutirão de limpeza")]
    pub title: String,
    pub description: Option<String>,
    /// Registered NGO the work was done for.
    pub ong_id: Option<Uuid>,
    /// Free-text organization name when the NGO is not registered.
    pub ong_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 0, max = 100000, message = "Horas inválidas"))]
    #[schema(example = 8)]
    pub hours: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    #[schema(example = 5, minimum = 1, maximum = 5)]
    pub rating: i16,
    #[schema(example = "Participação excelente!")]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContributionPage {
    pub data: Vec<Contribution>,
    pub pagination: PageMeta,
}

fn check_rating(rating: i16) -> ApiResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            format!("A nota deve estar entre {} e {}", MIN_RATING, MAX_RATING),
            "INVALID_RATING",
        ))
    }
}

fn load_contribution(conn: &mut PgConnection, id: Uuid) -> ApiResult<Contribution> {
    contributions::table
        .find(id)
        .select(Contribution::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_contribution"))?
        .ok_or_else(|| {
            ApiError::not_found("Contribuição não encontrada", "CONTRIBUTION_NOT_FOUND")
        })
}

#[utoipa::path(
    post,
    path = "/api/v1/contributions",
    tag = "Contributions",
    request_body = CreateContributionRequest,
    responses(
        (status = 201, description = "Contribution logged", body = Contribution),
        (status = 400, description = "Invalid data", body = ApiError),
        (status = 403, description = "Only users log contributions", body = ApiError),
        (status = 404, description = "NGO not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_contribution(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateContributionRequest>,
) -> ApiResult<(StatusCode, Json<Contribution>)> {
    let user_id = actor.require_user()?;
    payload.validate().map_err(ApiError::validation)?;

    let title = non_blank(Some(payload.title))
        .ok_or_else(|| ApiError::bad_request("Título é obrigatório", "MISSING_TITLE"))?;
    check_dates(payload.start_date, payload.end_date)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    // a linked NGO wins over the free-text name
    let ong_name = match payload.ong_id {
        Some(ong_id) => Some(load_ong(&mut conn, ong_id)?.name),
        None => non_blank(payload.ong_name),
    };

    let contribution = diesel::insert_into(contributions::table)
        .values(&NewContribution {
            user_id,
            ong_id: payload.ong_id,
            ong_name,
            title,
            description: non_blank(payload.description),
            hours: payload.hours,
            start_date: payload.start_date,
            end_date: payload.end_date,
        })
        .returning(Contribution::as_returning())
        .get_result(&mut conn)
        .map_err(ApiError::from_db("create_contribution"))?;

    info!(contribution_id = %contribution.id, user_id = %user_id, "Contribution logged");

    Ok((StatusCode::CREATED, Json(contribution)))
}

#[utoipa::path(
    get,
    path = "/api/v1/contributions",
    tag = "Contributions",
    params(PageParams),
    responses(
        (status = 200, description = "Caller's contributions, or those linked to the calling NGO", body = ContributionPage),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_contributions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<ContributionPage>> {
    let (kind, id) = (actor.kind, actor.id);
    let filtered = move || -> contributions::BoxedQuery<'static, Pg> {
        match kind {
            ActorKind::User => contributions::table
                .filter(contributions::user_id.eq(id))
                .into_boxed(),
            ActorKind::Ong => contributions::table
                .filter(contributions::ong_id.eq(id))
                .into_boxed(),
        }
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_contributions"))?;

    let data = filtered()
        .select(Contribution::as_select())
        .order(contributions::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_contributions"))?;

    Ok(Json(ContributionPage {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/contributions/{id}",
    tag = "Contributions",
    params(("id" = Uuid, Path, description = "Contribution ID")),
    responses(
        (status = 200, description = "Contribution", body = Contribution),
        (status = 404, description = "Contribution not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_contribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Contribution>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_contribution(&mut conn, id).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/v1/contributions/{id}/feedback",
    tag = "Contributions",
    params(("id" = Uuid, Path, description = "Contribution ID")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback saved", body = Contribution),
        (status = 400, description = "Rating outside 1..=5", body = ApiError),
        (status = 403, description = "Only the linked NGO may rate", body = ApiError),
        (status = 404, description = "Contribution not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn give_feedback(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeedbackRequest>,
) -> ApiResult<Json<Contribution>> {
    let ong_id = actor.require_ong()?;
    check_rating(payload.rating)?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let contribution = load_contribution(&mut conn, id)?;

    if contribution.ong_id != Some(ong_id) {
        return Err(ApiError::forbidden(
            "Apenas a ONG vinculada pode avaliar esta contribuição",
            "FORBIDDEN",
        ));
    }

    let updated = diesel::update(contributions::table.find(id))
        .set((
            contributions::rating.eq(payload.rating),
            contributions::feedback.eq(non_blank(payload.feedback)),
            contributions::updated_at.eq(Utc::now().naive_utc()),
        ))
        .returning(Contribution::as_returning())
        .get_result(&mut conn)
        .map_err(ApiError::from_db("give_feedback"))?;

    info!(contribution_id = %id, ong_id = %ong_id, rating = payload.rating, "Contribution rated");

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/contributions/{id}",
    tag = "Contributions",
    params(("id" = Uuid, Path, description = "Contribution ID")),
    responses(
        (status = 204, description = "Contribution deleted"),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Contribution not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_contribution(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let contribution = load_contribution(&mut conn, id)?;

    if actor.kind != ActorKind::User || contribution.user_id != actor.id {
        return Err(ApiError::forbidden(
            "Apenas o autor pode excluir esta contribuição",
            "FORBIDDEN",
        ));
    }

    diesel::delete(contributions::table.find(id))
        .execute(&mut conn)
        .map_err(ApiError::from_db("delete_contribution"))?;

    info!(contribution_id = %id, "Contribution deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());

        let (status, Json(body)) = check_rating(0).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_RATING");
        assert!(check_rating(6).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateContributionRequest = serde_json::from_value(serde_json::json!({
            "title": "",
            "hours": -2
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("hours"));
    }
}
