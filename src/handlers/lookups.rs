//! Proxies to the public CNPJ and CEP registries.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::{
    error::{ApiError, ApiResult},
    integrations::{AddressInfo, CompanyInfo, LookupError},
    validation::{normalize_cep, normalize_cnpj},
    AppState,
};

fn lookup_error(err: LookupError, not_found: &str, code: &str) -> (StatusCode, Json<ApiError>) {
    match err {
        LookupError::NotFound => ApiError::not_found(not_found, code),
        other => {
            warn!(error = %other, "External lookup failed");
            ApiError::bad_gateway(
                "Serviço de consulta indisponível no momento",
                "LOOKUP_UNAVAILABLE",
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/lookups/cnpj/{cnpj}",
    tag = "Lookups",
    params(("cnpj" = String, Path, description = "CNPJ, with or without punctuation")),
    responses(
        (status = 200, description = "Registered company data", body = CompanyInfo),
        (status = 400, description = "Invalid CNPJ", body = ApiError),
        (status = 404, description = "CNPJ not registered", body = ApiError),
        (status = 502, description = "Registry unavailable", body = ApiError)
    )
)]
pub async fn lookup_cnpj(
    State(state): State<AppState>,
    Path(cnpj): Path<String>,
) -> ApiResult<Json<CompanyInfo>> {
    let cnpj = normalize_cnpj(&cnpj)
        .ok_or_else(|| ApiError::bad_request("CNPJ inválido", "INVALID_CNPJ"))?;

    state
        .lookup
        .company(&cnpj)
        .await
        .map(Json)
        .map_err(|e| lookup_error(e, "CNPJ não encontrado", "CNPJ_NOT_FOUND"))
}

#[utoipa::path(
    get,
    path = "/api/v1/lookups/cep/{cep}",
    tag = "Lookups",
    params(("cep" = String, Path, description = "CEP, 8 digits")),
    responses(
        (status = 200, description = "Address", body = AddressInfo),
        (status = 400, description = "Invalid CEP", body = ApiError),
        (status = 404, description = "CEP not found", body = ApiError),
        (status = 502, description = "Postal service unavailable", body = ApiError)
    )
)]
pub async fn lookup_cep(
    State(state): State<AppState>,
    Path(cep): Path<String>,
) -> ApiResult<Json<AddressInfo>> {
    let cep = normalize_cep(&cep)
        .ok_or_else(|| ApiError::bad_request("CEP inválido", "INVALID_CEP"))?;

    state
        .lookup
        .address(&cep)
        .await
        .map(Json)
        .map_err(|e| lookup_error(e, "CEP não encontrado", "CEP_NOT_FOUND"))
}
