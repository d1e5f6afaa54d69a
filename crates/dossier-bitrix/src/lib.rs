//! Bitrix24 REST adapter (reqwest).
//!
//! Implements the `dossier-core` `BitrixApi` port over incoming-webhook URLs of the
//! form `<portal>/rest/1/<token>/<method>`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use dossier_core::{errors::Error, params::Params, ports::BitrixApi, Result};

pub const USER_AGENT: &str = "DealDossier/1.0";

/// Webhook base URL: `<portal>/rest/1/<token>/`.
pub fn rest_base_url(portal: &str, token: &str) -> String {
    format!("{}/rest/1/{token}/", portal.trim_end_matches('/'))
}

#[derive(Clone, Debug)]
pub struct BitrixClient {
    base_url: String,
    http: reqwest::Client,
}

impl BitrixClient {
    pub fn new(portal: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: rest_base_url(portal, token),
            http,
        })
    }
}

#[async_trait]
impl BitrixApi for BitrixClient {
    async fn call(&self, method: &str, params: &Params) -> Result<Value> {
        let transport = |e: reqwest::Error| Error::Transport {
            method: method.to_string(),
            reason: e.to_string(),
        };

        tracing::debug!(method, "bitrix request");
        let resp = self
            .http
            .get(format!("{}{method}", self.base_url))
            .query(params.pairs())
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                method: method.to_string(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let envelope: Value = resp.json().await.map_err(transport)?;
        check_envelope(method, envelope)
    }
}

/// Bitrix reports some failures with HTTP 200 and an `error` field.
fn check_envelope(method: &str, envelope: Value) -> Result<Value> {
    let Some(code) = envelope.get("error").filter(|v| !v.is_null()) else {
        return Ok(envelope);
    };
    let code = match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let description = envelope
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Err(Error::Api {
        method: method.to_string(),
        code,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn base_url_embeds_token() {
        assert_eq!(
            rest_base_url("https://test.bitrix24.ru", "test_token"),
            "https://test.bitrix24.ru/rest/1/test_token/"
        );
        assert_eq!(
            rest_base_url("https://test.bitrix24.ru/", "t"),
            "https://test.bitrix24.ru/rest/1/t/"
        );
    }

    #[test]
    fn client_uses_webhook_base() {
        let c = BitrixClient::new("https://portal.example", "abc", Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url, "https://portal.example/rest/1/abc/");
    }

    fn client_for(server: &MockServer) -> BitrixClient {
        BitrixClient::new(&server.uri(), "tok", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_user_agent_and_php_style_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/1/tok/user.get"))
            .and(header("user-agent", USER_AGENT))
            .and(query_param("id", "42"))
            .and(query_param("select[]", "ID"))
            .and(query_param("select[]", "EMAIL"))
            .and(query_param("filter[OWNER_TYPE_ID]", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": [{"ID": "42"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = Params::new()
            .set("id", 42)
            .list("select", &["ID", "EMAIL"])
            .filter("OWNER_TYPE_ID", 2);
        let envelope = client_for(&server)
            .call("user.get", &params)
            .await
            .unwrap();

        assert_eq!(envelope, json!({"result": [{"ID": "42"}]}));
    }

    #[tokio::test]
    async fn non_success_status_is_an_http_error_with_short_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/1/tok/crm.deal.get"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call("crm.deal.get", &Params::new().set("id", 1))
            .await
            .unwrap_err();

        match err {
            Error::Http {
                method,
                status,
                body,
            } => {
                assert_eq!(method, "crm.deal.get");
                assert_eq!(status, 503);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/1/tok/crm.contact.get"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call("crm.contact.get", &Params::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Transport { ref method, .. } if method == "crm.contact.get"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn error_envelope_over_http_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/1/tok/crm.deal.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "ACCESS_DENIED",
                "error_description": "Access denied"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call("crm.deal.get", &Params::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { ref code, .. } if code == "ACCESS_DENIED"));
    }

    #[test]
    fn error_envelope_becomes_api_error() {
        let err = check_envelope(
            "crm.deal.get",
            json!({"error": "NOT_FOUND", "error_description": "Not found"}),
        )
        .unwrap_err();
        match err {
            Error::Api {
                method,
                code,
                description,
            } => {
                assert_eq!(method, "crm.deal.get");
                assert_eq!(code, "NOT_FOUND");
                assert_eq!(description, "Not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn result_envelope_passes_through() {
        let env = json!({"result": [1], "total": 1});
        assert_eq!(check_envelope("crm.activity.list", env.clone()).unwrap(), env);
    }
}
