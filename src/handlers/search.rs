//! Name search and filter options.

use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    helpers::like_pattern,
    models::{Ong, Project, User},
    schema::{ongs, projects, users},
    validation::non_blank,
    AppState,
};

pub const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    All,
    Ongs,
    Projects,
    Users,
}

impl SearchType {
    fn includes(self, other: SearchType) -> bool {
        self == SearchType::All || self == other
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive fragment of the name.
    pub q: Option<String>,
    /// all, ongs, projects or users.
    #[serde(rename = "type", default)]
    #[param(value_type = Option<String>, example = "all")]
    pub kind: SearchType,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SearchResults {
    pub ongs: Vec<Ong>,
    pub projects: Vec<Project>,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilterOptions {
    #[schema(example = json!(["RJ", "SP"]))]
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub causes: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/search-results",
    tag = "Search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matches by name, at most 20 per kind", body = SearchResults),
        (status = 400, description = "Missing query", body = ApiError)
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let term = non_blank(params.q)
        .ok_or_else(|| ApiError::bad_request("Informe um termo de busca", "MISSING_QUERY"))?;
    let pattern = like_pattern(&term);
    let kind = params.kind;

    let mut conn = get_db_conn(&state.db_pool)?;
    let mut results = SearchResults::default();

    if kind.includes(SearchType::Ongs) {
        results.ongs = ongs::table
            .filter(ongs::name.ilike(&pattern))
            .select(Ong::as_select())
            .order(ongs::name.asc())
            .limit(SEARCH_LIMIT)
            .load(&mut conn)
            .map_err(ApiError::from_db("search_ongs"))?;
    }
    if kind.includes(SearchType::Projects) {
        results.projects = projects::table
            .filter(projects::name.ilike(&pattern))
            .select(Project::as_select())
            .order(projects::name.asc())
            .limit(SEARCH_LIMIT)
            .load(&mut conn)
            .map_err(ApiError::from_db("search_projects"))?;
    }
    if kind.includes(SearchType::Users) {
        results.users = users::table
            .filter(users::name.ilike(&pattern))
            .select(User::as_select())
            .order(users::name.asc())
            .limit(SEARCH_LIMIT)
            .load(&mut conn)
            .map_err(ApiError::from_db("search_users"))?;
    }

    tracing::debug!(
        term = %term,
        ongs = results.ongs.len(),
        projects = results.projects.len(),
        users = results.users.len(),
        "Search completed"
    );

    Ok(Json(results))
}

fn merge(a: Vec<Option<String>>, b: Vec<Option<String>>) -> Vec<String> {
    a.into_iter()
        .chain(b)
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/v1/filters",
    tag = "Search",
    responses(
        (status = 200, description = "Distinct states, cities and causes in use", body = FilterOptions)
    )
)]
pub async fn filters(State(state): State<AppState>) -> ApiResult<Json<FilterOptions>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    macro_rules! distinct {
        ($table:ident, $column:ident) => {
            $table::table
                .select($table::$column)
                .distinct()
                .load::<Option<String>>(&mut conn)
                .map_err(ApiError::from_db(concat!("filters_", stringify!($table))))?
        };
    }

    Ok(Json(FilterOptions {
        states: merge(distinct!(ongs, state), distinct!(projects, state)),
        cities: merge(distinct!(ongs, city), distinct!(projects, city)),
        causes: merge(distinct!(ongs, cause), distinct!(projects, cause)),
    }))
}
