//! Shared HTTP plumbing for the service clients.

use std::time::Duration;

use digest_core::{DigestError, DigestResult, Service};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

const USER_AGENT: &str = concat!("daily-digest/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in an error message
const BODY_SNIPPET_LEN: usize = 200;

/// One client per run, shared by every service.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Send a request and fail on any non-success status.
pub async fn send(service: Service, request: RequestBuilder) -> DigestResult<Response> {
    let response = request.send().await.map_err(|e| DigestError::NetworkFailure {
        service,
        detail: e.to_string(),
    })?;

    debug!(%service, url = %response.url(), status = %response.status(), "HTTP response");
    check_status(service, response).await
}

/// Send a request and decode its JSON body.
pub async fn get_json<T: DeserializeOwned>(service: Service, request: RequestBuilder) -> DigestResult<T> {
    let response = send(service, request).await?;
    let url = response.url().clone();
    response
        .json::<T>()
        .await
        .map_err(|e| DigestError::malformed(service, format!("{url}: {e}")))
}

async fn check_status(service: Service, response: Response) -> DigestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DigestError::AuthenticationFailure {
            service,
            status: status.as_u16(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(DigestError::UnexpectedStatus {
        service,
        status: status.as_u16(),
        body: snippet(&body),
    })
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn maps_statuses_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();

        let err = send(Service::GitHub, client.get(format!("{}/denied", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DigestError::AuthenticationFailure {
                service: Service::GitHub,
                status: 401
            }
        ));

        let err = send(Service::Jira, client.get(format!("{}/broken", server.uri())))
            .await
            .unwrap_err();
        match err {
            DigestError::UnexpectedStatus { service, status, body } => {
                assert_eq!(service, Service::Jira);
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn sends_user_agent_and_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "n": 3 })))
            .mount(&server)
            .await;

        #[derive(serde::Deserialize)]
        struct Body {
            n: u32,
        }

        let client = build_client(Duration::from_secs(5)).unwrap();
        let body: Body = get_json(Service::GitHub, client.get(format!("{}/ok", server.uri())))
            .await
            .unwrap();
        assert_eq!(body.n, 3);
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let err = get_json::<serde_json::Value>(Service::Jira, client.get(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::MalformedResponse { service: Service::Jira, .. }));
    }

    #[tokio::test]
    async fn connection_failure_is_network_error() {
        let client = build_client(Duration::from_secs(5)).unwrap();
        // port 9 on localhost is not listening
        let err = send(Service::Calendar, client.get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::NetworkFailure { service: Service::Calendar, .. }));
    }

    #[test]
    fn long_bodies_are_cut() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), BODY_SNIPPET_LEN + 3);
    }
}
