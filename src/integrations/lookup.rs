//! CNPJ and CEP lookups against public Brazilian registries.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::config::LookupConfig;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("record not found")]
    NotFound,
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lookup service answered with status {0}")]
    Upstream(u16),
}

/// Normalized company registration data.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CompanyInfo {
    #[schema(example = "11222333000181")]
    pub cnpj: String,
    pub name: String,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cep: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AddressInfo {
    #[schema(example = "01001000")]
    pub cep: String,
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CnpjRecord {
    cnpj: Option<String>,
    razao_social: Option<String>,
    nome_fantasia: Option<String>,
    email: Option<String>,
    ddd_telefone_1: Option<String>,
    cep: Option<String>,
    municipio: Option<String>,
    uf: Option<String>,
    logradouro: Option<String>,
    numero: Option<String>,
    bairro: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CepRecord {
    cep: Option<String>,
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    // "true" or true when the CEP does not exist
    erro: Option<serde_json::Value>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CnpjRecord {
    fn normalize(self, requested: &str) -> CompanyInfo {
        let cnpj = present(self.cnpj)
            .map(|c| crate::validation::only_digits(&c))
            .unwrap_or_else(|| requested.to_string());
        let trade_name = present(self.nome_fantasia);

        CompanyInfo {
            cnpj,
            name: present(self.razao_social)
                .or_else(|| trade_name.clone())
                .unwrap_or_default(),
            trade_name,
            email: present(self.email).map(|e| e.to_lowercase()),
            phone: present(self.ddd_telefone_1),
            cep: present(self.cep).map(|c| crate::validation::only_digits(&c)),
            city: present(self.municipio),
            state: present(self.uf).map(|s| s.to_uppercase()),
            street: present(self.logradouro),
            number: present(self.numero),
            district: present(self.bairro),
        }
    }
}

impl CepRecord {
    fn is_missing(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }

    fn normalize(self, requested: &str) -> Result<AddressInfo, LookupError> {
        if self.is_missing() {
            return Err(LookupError::NotFound);
        }

        Ok(AddressInfo {
            cep: present(self.cep)
                .map(|c| crate::validation::only_digits(&c))
                .unwrap_or_else(|| requested.to_string()),
            street: present(self.logradouro),
            district: present(self.bairro),
            city: present(self.localidade),
            state: present(self.uf).map(|s| s.to_uppercase()),
        })
    }
}

#[derive(Clone)]
pub struct LookupClient {
    client: reqwest::Client,
    config: LookupConfig,
}

impl LookupClient {
    pub fn new(config: LookupConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("colabora/0.1")
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Expects an already validated 14-digit CNPJ.
    pub async fn company(&self, cnpj: &str) -> Result<CompanyInfo, LookupError> {
        let url = format!("{}/{}", self.config.cnpj_url.trim_end_matches('/'), cnpj);
        let record: CnpjRecord = self.fetch(&url).await?;
        Ok(record.normalize(cnpj))
    }

    /// Expects an already validated 8-digit CEP.
    pub async fn address(&self, cep: &str) -> Result<AddressInfo, LookupError> {
        let url = format!("{}/{}/json/", self.config.cep_url.trim_end_matches('/'), cep);
        let record: CepRecord = self.fetch(&url).await?;
        record.normalize(cep)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, LookupError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        // ViaCEP answers 400 for malformed input
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), url, "Lookup service returned an error");
            return Err(LookupError::Upstream(status.as_u16()));
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_normalize_company() {
        let record: CnpjRecord = serde_json::from_value(serde_json::json!({
            "cnpj": "11.222.333/0001-81",
            "razao_social": "ASSOCIACAO MAOS DADAS",
            "nome_fantasia": "",
            "email": "CONTATO@MAOSDADAS.ORG",
            "ddd_telefone_1": "1133334444",
            "cep": "01001-000",
            "municipio": "SAO PAULO",
            "uf": "sp",
            "logradouro": "PRACA DA SE",
            "numero": "100",
            "bairro": "SE"
        }))
        .unwrap();

        let info = record.normalize("11222333000181");
        assert_eq!(info.cnpj, "11222333000181");
        assert_eq!(info.name, "ASSOCIACAO MAOS DADAS");
        assert_eq!(info.trade_name, None);
        assert_eq!(info.email.as_deref(), Some("contato@maosdadas.org"));
        assert_eq!(info.cep.as_deref(), Some("01001000"));
        assert_eq!(info.state.as_deref(), Some("SP"));
    }

    #[test]
    fn test_normalize_company_falls_back_to_trade_name() {
        let record: CnpjRecord =
            serde_json::from_value(serde_json::json!({ "nome_fantasia": "Mãos Dadas" })).unwrap();
        let info = record.normalize("11222333000181");
        assert_eq!(info.cnpj, "11222333000181");
        assert_eq!(info.name, "Mãos Dadas");
    }

    #[test]
    fn test_normalize_address() {
        let record: CepRecord = serde_json::from_value(serde_json::json!({
            "cep": "01001-000",
            "logradouro": "Praça da Sé",
            "bairro": "Sé",
            "localidade": "São Paulo",
            "uf": "SP"
        }))
        .unwrap();

        let address = record.normalize("01001000").unwrap();
        assert_eq!(address.cep, "01001000");
        assert_eq!(address.city.as_deref(), Some("São Paulo"));
    }

    #[test]
    fn test_missing_cep_flag() {
        for erro in [serde_json::json!(true), serde_json::json!("true")] {
            let record: CepRecord =
                serde_json::from_value(serde_json::json!({ "erro": erro })).unwrap();
            assert!(matches!(
                record.normalize("99999999"),
                Err(LookupError::NotFound)
            ));
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_transport_error() {
        let client = LookupClient::new(Config::default_for_testing().lookup);
        assert!(matches!(
            client.address("01001000").await,
            Err(LookupError::Transport(_))
        ));
    }
}
