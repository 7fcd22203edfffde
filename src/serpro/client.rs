use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::envelope::Envelope;
use super::error::SerproError;
use super::http::HttpClient;
use super::token::TokenManager;
use crate::config::SerproConfig;

pub const EMIT_ENDPOINT: &str = "/Emitir";

const DOCUMENT_FIELD: &str = "docArrecadacaoPdfB64";
const NO_DOCUMENT_MESSAGE: &str = "no collection document found in response";

/// HTTP methods the gateway's document endpoints accept. GET sends no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Post,
    Get,
}

/// Outcome of a document call: the base64 PDF when one was generated, plus
/// whatever message the gateway (or the client) had to say.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentResponse {
    pub document: Option<String>,
    pub message: Option<String>,
}

impl DocumentResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            document: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayMessage {
    #[serde(default, rename = "codigo")]
    code: Value,
    #[serde(default, rename = "texto")]
    text: Value,
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    #[serde(default, rename = "mensagens")]
    messages: Option<Vec<GatewayMessage>>,
    #[serde(default, rename = "dados")]
    data: Value,
}

#[derive(Clone)]
pub struct SerproClient {
    http: HttpClient,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl SerproClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Wires the authentication client (mutual TLS) and the gateway client.
    pub fn from_config(config: &SerproConfig) -> Result<Self, SerproError> {
        let identity = config.credentials.load_identity()?;
        let auth_http = HttpClient::builder()
            .timeout(config.timeout)
            .identity(identity)
            .build()
            .map_err(|e| SerproError::Configuration(e.to_string()))?;
        let gateway_http = HttpClient::builder()
            .timeout(config.timeout)
            .max_attempts(config.max_attempts)
            .build()
            .map_err(|e| SerproError::Configuration(e.to_string()))?;

        let tokens = TokenManager::new(auth_http, config.auth_url.clone(), &config.credentials);
        Ok(Self::new(gateway_http, config.base_url.clone(), Arc::new(tokens)))
    }

    /// Calls a gateway endpoint. Only token acquisition failures are returned
    /// as errors; every HTTP outcome is folded into the [`DocumentResponse`].
    #[instrument(skip(self, envelope))]
    pub async fn call(
        &self,
        endpoint: &str,
        method: ApiMethod,
        envelope: &Envelope,
    ) -> Result<DocumentResponse, SerproError> {
        let tokens = self.tokens.get_tokens().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let request = match method {
            // json() sets the content type itself
            ApiMethod::Post => self.http.request(Method::POST, &url).json(envelope),
            ApiMethod::Get => self
                .http
                .request(Method::GET, &url)
                .header(CONTENT_TYPE, "application/json"),
        }
        .bearer_auth(&tokens.access_token)
        .header("jwt_token", &tokens.jwt_token);

        debug!(%url, taxpayer = %envelope.taxpayer.number, "Sending SERPRO request");

        let response = match self.http.send(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "SERPRO request failed");
                return Ok(DocumentResponse::failed(format!("request error: {e}")));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to read SERPRO response body");
                return Ok(DocumentResponse::failed(format!("request error: {e}")));
            }
        };

        let parsed = parse_response(status, &body);
        match &parsed.document {
            Some(_) => info!(%status, "SERPRO returned a document"),
            None => warn!(%status, message = ?parsed.message, "SERPRO returned no document"),
        }
        Ok(parsed)
    }
}

/// Interprets a gateway reply.
pub fn parse_response(status: StatusCode, body: &str) -> DocumentResponse {
    if status == StatusCode::OK {
        return parse_success(body);
    }

    match serde_json::from_str::<GatewayReply>(body) {
        Ok(GatewayReply {
            messages: Some(messages),
            ..
        }) if !messages.is_empty() => DocumentResponse::failed(join_messages(&messages)),
        Ok(_) => DocumentResponse::failed(format!(
            "unknown server error (HTTP {})",
            status.as_u16()
        )),
        Err(_) => DocumentResponse::failed(format!(
            "SERPRO request failed: {} - {}",
            status.as_u16(),
            body
        )),
    }
}

fn parse_success(body: &str) -> DocumentResponse {
    let reply = match serde_json::from_str::<GatewayReply>(body) {
        Ok(reply) => reply,
        Err(e) => return DocumentResponse::failed(format!("error parsing response JSON: {e}")),
    };

    let joined = join_messages(reply.messages.as_deref().unwrap_or_default());
    let message = (!joined.is_empty()).then_some(joined);

    let inner = match reply.data {
        Value::String(raw) if !raw.trim().is_empty() => match serde_json::from_str::<Value>(&raw) {
            Ok(inner) => Some(inner),
            Err(e) => {
                return DocumentResponse::failed(format!("error parsing inner payload: {e}"));
            }
        },
        Value::Object(map) => Some(Value::Object(map)),
        _ => None,
    };

    let document = inner
        .as_ref()
        .and_then(|inner| inner.get(DOCUMENT_FIELD))
        .and_then(Value::as_str)
        .map(str::to_string);

    match document {
        Some(document) => DocumentResponse {
            document: Some(document),
            message,
        },
        None => DocumentResponse {
            document: None,
            message: Some(message.unwrap_or_else(|| NO_DOCUMENT_MESSAGE.to_string())),
        },
    }
}

fn join_messages(messages: &[GatewayMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", scalar_text(&m.code), scalar_text(&m.text)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::serpro::credentials::Credentials;
    use crate::serpro::envelope::{DocumentRequest, RequestBuilder, TaxpayerType};

    fn envelope() -> Envelope {
        RequestBuilder::new("00000000000000", "00000000000000")
            .build_request(&DocumentRequest::new(
                "11.111.111/0001-11",
                TaxpayerType::Organization,
                "PARCSN",
                "GERARDAS161",
                "202401",
            ))
            .unwrap()
    }

    async fn client_for(server: &MockServer) -> SerproClient {
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "jwt_token": "jwt",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        let credentials = Credentials {
            certificate_dir: "/unused".into(),
            certificate_name: "cert.pfx".into(),
            certificate_password: "pfx".into(),
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
        };
        let http = HttpClient::builder().build().unwrap();
        let tokens = TokenManager::new(
            http.clone(),
            format!("{}/authenticate", server.uri()),
            &credentials,
        );
        SerproClient::new(http, server.uri(), Arc::new(tokens))
    }

    #[test]
    fn success_with_document_returns_document_and_messages() {
        let body = r#"{"mensagens":[{"codigo":"1","texto":"ok"}],"dados":"{\"docArrecadacaoPdfB64\":\"QQ==\"}"}"#;

        assert_eq!(
            parse_response(StatusCode::OK, body),
            DocumentResponse {
                document: Some("QQ==".into()),
                message: Some("1: ok".into()),
            }
        );
    }

    #[test]
    fn success_without_messages_has_no_message() {
        let body = r#"{"mensagens":[],"dados":"{\"docArrecadacaoPdfB64\":\"QQ==\"}"}"#;

        let parsed = parse_response(StatusCode::OK, body);

        assert_eq!(parsed.document.as_deref(), Some("QQ=="));
        assert_eq!(parsed.message, None);
    }

    #[test]
    fn success_without_document_returns_messages() {
        let body = r#"{"mensagens":[{"codigo":"1","texto":"ok"}],"dados":"{\"outro\":1}"}"#;

        assert_eq!(
            parse_response(StatusCode::OK, body),
            DocumentResponse::failed("1: ok")
        );
    }

    #[test]
    fn success_without_anything_uses_default_message() {
        assert_eq!(
            parse_response(StatusCode::OK, r#"{"dados":""}"#),
            DocumentResponse::failed(NO_DOCUMENT_MESSAGE)
        );
    }

    #[test]
    fn joins_several_messages() {
        let body = r#"{"mensagens":[{"codigo":"A1","texto":"first"},{"codigo":"A2","texto":"second"}]}"#;

        assert_eq!(
            parse_response(StatusCode::OK, body).message.as_deref(),
            Some("A1: first, A2: second")
        );
    }

    #[test]
    fn malformed_inner_payload_is_reported() {
        let body = r#"{"mensagens":[],"dados":"{not json"}"#;

        let message = parse_response(StatusCode::OK, body).message.unwrap();

        assert!(message.starts_with("error parsing inner payload:"), "{message}");
    }

    #[test]
    fn malformed_outer_payload_is_reported() {
        let message = parse_response(StatusCode::OK, "<html>").message.unwrap();

        assert!(message.starts_with("error parsing response JSON:"), "{message}");
    }

    #[test]
    fn error_status_with_structured_messages() {
        let body = r#"{"mensagens":[{"codigo":"9","texto":"fail"}]}"#;

        assert_eq!(
            parse_response(StatusCode::INTERNAL_SERVER_ERROR, body),
            DocumentResponse::failed("9: fail")
        );
    }

    #[test]
    fn error_status_with_unparseable_body_keeps_status_and_text() {
        assert_eq!(
            parse_response(StatusCode::BAD_GATEWAY, "upstream down"),
            DocumentResponse::failed("SERPRO request failed: 502 - upstream down")
        );
    }

    #[test]
    fn error_status_without_messages() {
        assert_eq!(
            parse_response(StatusCode::FORBIDDEN, "{}"),
            DocumentResponse::failed("unknown server error (HTTP 403)")
        );
    }

    #[tokio::test]
    async fn post_sends_tokens_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Emitir"))
            .and(header("Authorization", "Bearer access"))
            .and(header("jwt_token", "jwt"))
            .and(body_partial_json(json!({
                "contribuinte": { "numero": "11111111000111", "tipo": 2 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mensagens": [{ "codigo": "1", "texto": "ok" }],
                "dados": "{\"docArrecadacaoPdfB64\":\"QQ==\"}"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client
            .call(EMIT_ENDPOINT, ApiMethod::Post, &envelope())
            .await
            .unwrap();

        assert_eq!(response.document.as_deref(), Some("QQ=="));
        assert_eq!(response.message.as_deref(), Some("1: ok"));
    }

    #[tokio::test]
    async fn get_sends_tokens_and_json_content_type_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Consultar"))
            .and(header("Authorization", "Bearer access"))
            .and(header("jwt_token", "jwt"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mensagens": [{ "codigo": "1", "texto": "ok" }],
                "dados": "{\"docArrecadacaoPdfB64\":\"QQ==\"}"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client
            .call("/Consultar", ApiMethod::Get, &envelope())
            .await
            .unwrap();

        assert_eq!(response.document.as_deref(), Some("QQ=="));
        let sent = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.url.path() == "/Consultar")
            .unwrap();
        assert!(sent.body.is_empty());
    }

    #[tokio::test]
    async fn remote_error_is_folded_into_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Emitir"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "mensagens": [{ "codigo": "9", "texto": "fail" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client
            .call(EMIT_ENDPOINT, ApiMethod::Post, &envelope())
            .await
            .unwrap();

        assert_eq!(response, DocumentResponse::failed("9: fail"));
    }

    #[tokio::test]
    async fn authentication_failure_is_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Emitir"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let credentials = Credentials {
            certificate_dir: "/unused".into(),
            certificate_name: "cert.pfx".into(),
            certificate_password: "pfx".into(),
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
        };
        let http = HttpClient::builder().build().unwrap();
        let tokens = TokenManager::new(
            http.clone(),
            format!("{}/authenticate", server.uri()),
            &credentials,
        );
        let client = SerproClient::new(http, server.uri(), Arc::new(tokens));

        let err = client
            .call(EMIT_ENDPOINT, ApiMethod::Post, &envelope())
            .await
            .unwrap_err();

        assert!(matches!(err, SerproError::Authentication(_)));
    }
}
