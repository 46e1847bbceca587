//! Defines the HTTP surface.
//!
//! ## Structure
//! - **Open endpoints**
//!   - `GET  /healthz`: liveness
//!   - `GET  /readyz`: provider readiness
//!   - `POST /token`: form login, returns a bearer token
//!
//! - **Bearer-protected endpoints**
//!   - `GET  /buckets/`: list bucket names
//!   - `POST /buckets/create`: create a bucket
//!   - `POST /buckets/create-with-folder`: create a bucket plus folder marker
//!   - `GET  /buckets/{bucket_name}`: bucket region
//!
//! `GET /buckets/create` and `GET /buckets/create-with-folder` hit the static
//! POST routes and answer 405, so those two names cannot be inspected here.

use crate::{
    handlers::{
        auth_handlers::issue_token,
        bucket_handlers::{
            create_bucket, create_bucket_with_folder, get_bucket_details, list_buckets,
        },
        health_handlers::{healthz, readyz},
    },
    middleware::auth::require_bearer,
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Build the full router. The token gate is a `route_layer` on the bucket
/// routes only, so `/token` and the health probes stay open.
pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/buckets", get(list_buckets))
        .route("/buckets/", get(list_buckets))
        .route("/buckets/create", post(create_bucket))
        .route("/buckets/create-with-folder", post(create_bucket_with_folder))
        .route("/buckets/{bucket_name}", get(get_bucket_details))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/token", post(issue_token))
        .merge(protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        bucket_service::{BucketService, tests::RecordingProvider},
        credential_store::{StaticCredentialStore, hash_password},
        token_service::TokenService,
    };
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::{collections::HashMap, sync::Arc};
    use tower::ServiceExt;

    const SECRET: &[u8] = b"router-test-signing-key";

    struct Harness {
        app: Router,
        provider: Arc<RecordingProvider>,
        tokens: TokenService,
    }

    fn token_service(ttl: Duration) -> TokenService {
        let store = StaticCredentialStore::new(HashMap::from([(
            "alice".to_string(),
            hash_password("wonderland").unwrap(),
        )]));
        TokenService::new(Arc::new(store), SECRET, ttl)
    }

    fn harness() -> Harness {
        let provider = Arc::new(RecordingProvider::default());
        provider.foreign.lock().unwrap().push("not-yours".into());
        let tokens = token_service(Duration::minutes(30));
        let buckets = BucketService::new(provider.clone(), "us-east-1");
        Harness {
            app: routes(AppState::new(tokens.clone(), buckets)),
            provider,
            tokens,
        }
    }

    fn bearer(tokens: &TokenService) -> String {
        let token = tokens.issue("alice", "wonderland").unwrap();
        format!("Bearer {}", token.access_token)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn login(app: &Router, form: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn login_returns_bearer_token() {
        let h = harness();
        let (status, body) = login(&h.app, "username=alice&password=wonderland").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        let token = body["access_token"].as_str().unwrap();
        assert_eq!(h.tokens.verify(token).unwrap(), "alice");
    }

    #[tokio::test]
    async fn login_with_bad_password_is_400() {
        let h = harness();
        let (status, body) = login(&h.app, "username=alice&password=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Incorrect username or password");
    }

    #[tokio::test]
    async fn bucket_routes_without_token_never_reach_provider() {
        let h = harness();
        for (method, uri) in [
            (Method::GET, "/buckets/"),
            (Method::GET, "/buckets"),
            (Method::POST, "/buckets/create?bucket_name=abc"),
            (Method::POST, "/buckets/create-with-folder?bucket_name=abc"),
            (Method::GET, "/buckets/abc"),
        ] {
            let request = Request::builder()
                .method(method.clone())
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = h.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(
                response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                "Bearer"
            );
        }
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn expired_and_tampered_tokens_are_401() {
        let h = harness();
        let stale = token_service(Duration::minutes(-5));
        let (status, body) = send(&h.app, Method::GET, "/buckets/", Some(&bearer(&stale))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Token has expired");

        let mut tampered = bearer(&h.tokens);
        tampered.push('x');
        let (status, _) = send(&h.app, Method::GET, "/buckets/", Some(&tampered)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn create_list_and_inspect_flow() {
        let h = harness();
        let auth = bearer(&h.tokens);

        let (status, body) = send(
            &h.app,
            Method::POST,
            "/buckets/create?bucket_name=reports&region=eu-west-1",
            Some(&auth),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Bucket created successfully");
        assert_eq!(body["bucket_name"], "reports");
        assert_eq!(body["region"], "eu-west-1");

        let (status, _) = send(
            &h.app,
            Method::POST,
            "/buckets/create?bucket_name=reports",
            Some(&auth),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&h.app, Method::GET, "/buckets/", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["reports"]));

        let (status, body) = send(&h.app, Method::GET, "/buckets/reports", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"], "eu-west-1");
    }

    #[tokio::test]
    async fn generated_name_and_default_region_when_omitted() {
        let h = harness();
        let auth = bearer(&h.tokens);
        let (status, body) = send(
            &h.app,
            Method::POST,
            "/buckets/create?bucket_name=",
            Some(&auth),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["bucket_name"].as_str().unwrap().starts_with("bucket-"));
        assert_eq!(body["region"], "us-east-1");
    }

    #[tokio::test]
    async fn details_map_validation_and_provider_errors() {
        let h = harness();
        let auth = bearer(&h.tokens);
        for (uri, expected) in [
            ("/buckets/Bad_Name", StatusCode::BAD_REQUEST),
            ("/buckets/missing", StatusCode::NOT_FOUND),
            ("/buckets/not-yours", StatusCode::FORBIDDEN),
        ] {
            let (status, _) = send(&h.app, Method::GET, uri, Some(&auth)).await;
            assert_eq!(status, expected, "{uri}");
        }
    }

    #[tokio::test]
    async fn create_with_folder_reports_folder_and_skips_marker_on_conflict() {
        let h = harness();
        let auth = bearer(&h.tokens);

        let (status, body) = send(
            &h.app,
            Method::POST,
            "/buckets/create-with-folder?bucket_name=seeded&folder_name=inbox",
            Some(&auth),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["folder_name"], "inbox/");
        assert_eq!(h.provider.objects.lock().unwrap().len(), 1);

        let (status, _) = send(
            &h.app,
            Method::POST,
            "/buckets/create-with-folder?bucket_name=seeded",
            Some(&auth),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(h.provider.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn health_probes_are_open() {
        let h = harness();
        let (status, body) = send(&h.app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let (status, body) = send(&h.app, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["provider"]["ok"], true);
    }

    #[tokio::test]
    async fn readyz_is_503_when_provider_is_unhealthy() {
        let provider = Arc::new(RecordingProvider {
            fail_health: true,
            ..Default::default()
        });
        let tokens = token_service(Duration::minutes(30));
        let app = routes(AppState::new(
            tokens,
            BucketService::new(provider, "us-east-1"),
        ));

        let (status, body) = send(&app, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["checks"]["provider"]["ok"], false);
        assert!(body["checks"]["provider"]["error"].is_string());
    }
}
