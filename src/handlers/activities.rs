use axum::{
    extract::{Query, State},
    Extension, Json,
};
use diesel::{pg::Pg, prelude::*};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Actor,
    error::{get_db_conn, ApiError, ApiResult},
    models::{Activity, Author},
    pagination::{PageMeta, PageParams},
    schema::activities,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub data: Vec<Activity>,
    pub pagination: PageMeta,
}

fn load_page<F>(
    state: &AppState,
    page: PageParams,
    filtered: F,
) -> ApiResult<Json<ActivityListResponse>>
where
    F: Fn() -> activities::BoxedQuery<'static, Pg>,
{
    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_activities"))?;

    let data = filtered()
        .select(Activity::as_select())
        .order((activities::created_at.desc(), activities::id.desc()))
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_activities"))?;

    Ok(Json(ActivityListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/activities",
    tag = "Activities",
    params(PageParams),
    responses(
        (status = 200, description = "Platform activity, newest first", body = ActivityListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<ActivityListResponse>> {
    load_page(&state, page, || activities::table.into_boxed())
}

/// Activity performed by the caller or aimed at one of their posts.
#[utoipa::path(
    get,
    path = "/api/v1/activities/me",
    tag = "Activities",
    params(PageParams),
    responses(
        (status = 200, description = "Caller's activity, newest first", body = ActivityListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_activities(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<ActivityListResponse>> {
    let author = actor.as_author();
    load_page(&state, page, move || match author {
        Author::User(id) => activities::table
            .filter(
                activities::user_id
                    .eq(id)
                    .or(activities::target_user_id.eq(id)),
            )
            .into_boxed(),
        Author::Ong(id) => activities::table
            .filter(activities::ong_id.eq(id).or(activities::target_ong_id.eq(id)))
            .into_boxed(),
    })
}
