use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::SerproError;
use crate::utils::taxpayer::digits_only;

const SYSTEM_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaxpayerType {
    /// CPF
    Individual,
    /// CNPJ
    Organization,
}

impl TaxpayerType {
    pub fn code(self) -> u8 {
        match self {
            Self::Individual => 1,
            Self::Organization => 2,
        }
    }
}

impl From<TaxpayerType> for u8 {
    fn from(value: TaxpayerType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for TaxpayerType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Individual),
            2 => Ok(Self::Organization),
            other => Err(format!("unknown taxpayer type {other}")),
        }
    }
}

/// One DAS emission request, as entered by staff or read from a batch row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    pub taxpayer_id: String,
    pub taxpayer_type: TaxpayerType,
    pub system_id: String,
    pub service_id: String,
    pub billing_period: String,
}

impl DocumentRequest {
    pub fn new(
        taxpayer_id: impl Into<String>,
        taxpayer_type: TaxpayerType,
        system_id: impl Into<String>,
        service_id: impl Into<String>,
        billing_period: impl Into<String>,
    ) -> Self {
        Self {
            taxpayer_id: taxpayer_id.into(),
            taxpayer_type,
            system_id: system_id.into(),
            service_id: service_id.into(),
            billing_period: billing_period.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    #[serde(rename = "numero")]
    pub number: String,
    #[serde(rename = "tipo")]
    pub kind: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceData {
    #[serde(rename = "idSistema")]
    pub system_id: String,
    #[serde(rename = "idServico")]
    pub service_id: String,
    #[serde(rename = "versaoSistema")]
    pub system_version: String,
    /// JSON document encoded as a string, as the gateway expects.
    #[serde(rename = "dados")]
    pub data: String,
}

/// Request body for the document-generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    #[serde(rename = "contratante")]
    pub contractor: Party,
    #[serde(rename = "autorPedidoDados")]
    pub requester: Party,
    #[serde(rename = "contribuinte")]
    pub taxpayer: Party,
    #[serde(rename = "pedidoDados")]
    pub service: ServiceData,
}

/// Builds envelopes on behalf of a fixed contractor and requester.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    contractor_id: String,
    requester_id: String,
}

impl RequestBuilder {
    pub fn new(contractor_id: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            contractor_id: digits_only(&contractor_id.into()),
            requester_id: digits_only(&requester_id.into()),
        }
    }

    pub fn build_request(&self, request: &DocumentRequest) -> Result<Envelope, SerproError> {
        let taxpayer_id = digits_only(&request.taxpayer_id);
        require("taxpayer_id", &taxpayer_id)?;
        require("system_id", &request.system_id)?;
        require("service_id", &request.service_id)?;
        require("billing_period", &request.billing_period)?;

        let data = json!({ "parcelaParaEmitir": request.billing_period.trim() }).to_string();

        Ok(Envelope {
            contractor: Party {
                number: self.contractor_id.clone(),
                kind: TaxpayerType::Organization.code(),
            },
            requester: Party {
                number: self.requester_id.clone(),
                kind: TaxpayerType::Organization.code(),
            },
            taxpayer: Party {
                number: taxpayer_id,
                kind: request.taxpayer_type.code(),
            },
            service: ServiceData {
                system_id: request.system_id.trim().to_string(),
                service_id: request.service_id.trim().to_string(),
                system_version: SYSTEM_VERSION.to_string(),
                data,
            },
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), SerproError> {
    if value.trim().is_empty() {
        return Err(SerproError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}
