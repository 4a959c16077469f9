use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use podsync::{
    ClientConfig, Credential, CredentialError, FailureKind, HttpAuthenticator, HttpClient,
    HttpRequest, LoginDetails, MemoryResponseCache, ReqwestClient, SessionStore, SyncError,
    SyncServerClient,
};

type Store = SessionStore<HttpAuthenticator<ReqwestClient>>;

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(&format!("{}/api", server.uri()))
        .unwrap()
        .with_timeout(Duration::from_secs(5))
}

fn store(config: &ClientConfig) -> Store {
    let http = ReqwestClient::from_config(config).unwrap();
    SessionStore::new(HttpAuthenticator::new(http, config.clone()))
}

fn client(config: ClientConfig, store: Store) -> (SyncServerClient<ReqwestClient, Store>, Arc<Store>) {
    let store = Arc::new(store);
    let client = SyncServerClient::connect(config, store.clone()).unwrap();
    (client, store)
}

async fn mount_token_endpoint(server: &MockServer, refresh_token: &str, issued: Value, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/user/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(issued))
        .expect(times)
        .mount(server)
        .await;
}

mod token_refresh {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn cached_token_is_used_without_refresh() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = store(&config);
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;
        let (client, _store) = client(config, store);

        Mock::given(method("GET"))
            .and(path("/api/user/podcast/list"))
            .and(header("authorization", "Bearer tokA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"podcasts": ["a"]})))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "r1", json!({"access_token": "unused"}), 0).await;

        let value: Value = client.get_json("user/podcast/list").await.unwrap();

        assert_eq!(value, json!({"podcasts": ["a"]}));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_retried() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = store(&config);
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;
        let (client, store) = client(config, store);

        Mock::given(method("GET"))
            .and(path("/api/user/podcast/list"))
            .and(header("authorization", "Bearer tokA"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user/podcast/list"))
            .and(header("authorization", "Bearer tokB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"podcasts": []})))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(
            &server,
            "r1",
            json!({"access_token": "tokB", "refresh_token": "r2"}),
            1,
        )
        .await;

        let value: Value = client.get_json("user/podcast/list").await.unwrap();

        assert_eq!(value, json!({"podcasts": []}));
        assert_eq!(store.refresh_token().await.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn persistent_rejection_retries_only_once() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = store(&config);
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;
        let (client, _store) = client(config, store);

        Mock::given(method("GET"))
            .and(path("/api/user/podcast/list"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "r1", json!({"access_token": "tokB"}), 1).await;

        let result: Result<Value, SyncError> = client.get_json("user/podcast/list").await;

        assert!(result.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn rejected_refresh_token_falls_back_to_login() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = store(&config)
            .with_refresh_token("revoked")
            .with_login(LoginDetails::new("me@example.com", "secret"));
        let (client, _store) = client(config, store);

        Mock::given(method("POST"))
            .and(path("/api/user/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/user/login"))
            .and(body_partial_json(json!({"email": "me@example.com", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "tokL", "refreshToken": "r9"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user/stats"))
            .and(header("authorization", "Bearer tokL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listened": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let value: Value = client.get_json("user/stats").await.unwrap();

        assert_eq!(value, json!({"listened": 42}));
    }

    #[tokio::test]
    async fn signed_out_store_never_calls_the_server() {
        let server = MockServer::start().await;
        let config = config(&server);
        let (client, _store) = client(config.clone(), store(&config));

        let result: Result<Value, SyncError> = client.get_json("user/podcast/list").await;

        assert_eq!(
            result,
            Err(SyncError::CredentialUnavailable(CredentialError::NotSignedIn))
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn server_error_is_returned_unretried() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = store(&config);
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;
        let (client, _store) = client(config, store);

        Mock::given(method("POST"))
            .and(path("/api/user/sync/update"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "r1", json!({"access_token": "tokB"}), 0).await;

        let result: Result<Value, SyncError> = client
            .post_json("user/sync/update", &json!({"episodes": []}))
            .await;

        assert_eq!(
            result,
            Err(SyncError::Other {
                kind: FailureKind::Status(503),
                message: "maintenance".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn transport_timeout_is_not_retried() {
        let server = MockServer::start().await;
        let config = config(&server).with_timeout(Duration::from_millis(200));
        let store = store(&config);
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;
        let (client, _store) = client(config, store);

        Mock::given(method("GET"))
            .and(path("/api/user/podcast/list"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "r1", json!({"access_token": "tokB"}), 0).await;

        let result: Result<Value, SyncError> = client.get_json("user/podcast/list").await;

        assert_eq!(result.unwrap_err().kind(), Some(FailureKind::Timeout));
    }
}

mod response_cache {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn repeated_get_is_served_from_cache() {
        let server = MockServer::start().await;
        let config = config(&server);
        let cache = MemoryResponseCache::shared(4);
        let http = ReqwestClient::from_config(&config)
            .unwrap()
            .with_cache(cache.clone());

        Mock::given(method("GET"))
            .and(path("/api/episodes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=300")
                    .set_body_string("[]"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = config.endpoint("episodes").unwrap();
        let first = http.send(HttpRequest::get(url.clone()).bearer("tokA")).await.unwrap();
        let second = http.send(HttpRequest::get(url).bearer("tokA")).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.status, 200);
        assert_eq!(second.body, first.body);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn sign_out_discards_cached_responses() {
        let server = MockServer::start().await;
        let config = config(&server);
        let store = Arc::new(store(&config));
        store
            .set_tokens(Credential::new("tokA"), Some("r1".to_string()))
            .await;

        let cache = MemoryResponseCache::shared(16);
        let http = ReqwestClient::from_config(&config)
            .unwrap()
            .with_cache(cache.clone());
        let client = SyncServerClient::new(http, config, store.clone(), Some(cache.clone()));

        Mock::given(method("GET"))
            .and(path("/api/user/stats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=60")
                    .set_body_json(json!({"listened": 1})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let first: Value = client.get_json("user/stats").await.unwrap();
        let cached: Value = client.get_json("user/stats").await.unwrap();
        assert_eq!(first, cached);
        assert_eq!(cache.len(), 1);

        client.sign_out();
        store.sign_out().await;
        assert!(cache.is_empty());

        store
            .set_tokens(Credential::new("tokOther"), Some("r2".to_string()))
            .await;
        let _: Value = client.get_json("user/stats").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].headers.get("authorization").unwrap(),
            "Bearer tokOther"
        );
    }
}
