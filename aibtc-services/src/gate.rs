use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use aibtc_kv::{KvStore, SharedStore};
use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::future::try_join_all;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};

use crate::error::ServiceError;

/// Name of the trusted service whose key matched, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCaller(pub String);

/// Checks the `Authorization` header against the shared keys of a fixed set
/// of trusted callers. Keys live at `key:{caller}` and are read on every call,
/// so a rotated key applies to the very next request.
#[derive(Clone)]
pub struct SharedSecretGate {
    store: SharedStore,
    callers: Vec<String>,
}

impl SharedSecretGate {
    pub fn new(store: SharedStore, callers: Vec<String>) -> Self {
        Self { store, callers }
    }

    pub fn callers(&self) -> &[String] {
        &self.callers
    }

    pub fn secret_key(caller: &str) -> String {
        format!("key:{}", caller)
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> Result<TrustedCaller, ServiceError> {
        let presented = headers
            .get(AUTHORIZATION)
            .map(|value| value.as_bytes())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ServiceError::Unauthenticated("Missing Authorization header".to_string()))?;

        let secrets = try_join_all(self.callers.iter().map(|caller| async move {
            let key = Self::secret_key(caller);
            match self.store.get(&key).await? {
                Some(secret) => Ok::<_, ServiceError>((caller, secret)),
                None => Err(ServiceError::Configuration(format!(
                    "shared key {} is not set",
                    key
                ))),
            }
        }))
        .await?;

        // Compare against every key so timing does not reveal which one matched
        let mut matched = None;
        for (caller, secret) in &secrets {
            let equal: bool = secret.as_bytes().ct_eq(presented).into();
            if equal && matched.is_none() {
                matched = Some(*caller);
            }
        }

        matched
            .map(|caller| TrustedCaller(caller.clone()))
            .ok_or_else(|| ServiceError::Unauthenticated("Invalid Authorization key".to_string()))
    }
}

/// Applies a [`SharedSecretGate`] to every path under a prefix
#[derive(Clone)]
pub struct SharedSecretLayer {
    gate: SharedSecretGate,
    protected_prefix: String,
    excluded_paths: Vec<String>,
}

impl SharedSecretLayer {
    pub fn new(gate: SharedSecretGate, protected_prefix: &str) -> Self {
        Self {
            gate,
            protected_prefix: protected_prefix.to_string(),
            excluded_paths: vec![],
        }
    }

    /// Let one exact path under the prefix through without a key
    pub fn exclude_path(mut self, path: &str) -> Self {
        self.excluded_paths.push(path.to_string());
        self
    }
}

impl<S> Layer<S> for SharedSecretLayer {
    type Service = SharedSecretMiddleware<S>;

    fn layer(&self, service: S) -> Self::Service {
        SharedSecretMiddleware {
            inner: service,
            gate: self.gate.clone(),
            protected_prefix: self.protected_prefix.clone(),
            excluded_paths: self.excluded_paths.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SharedSecretMiddleware<S> {
    inner: S,
    gate: SharedSecretGate,
    protected_prefix: String,
    excluded_paths: Vec<String>,
}

impl<S> SharedSecretMiddleware<S> {
    fn is_protected(&self, path: &str) -> bool {
        path.starts_with(&self.protected_prefix)
            && !self.excluded_paths.iter().any(|excluded| excluded == path)
    }
}

impl<S> Service<Request> for SharedSecretMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        if !self.is_protected(req.uri().path()) {
            return Box::pin(self.inner.call(req));
        }

        // The ready service goes into the future, a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            match gate.authorize(req.headers()).await {
                Ok(caller) => {
                    log::debug!("Request authorized for {}", caller.0);
                    req.extensions_mut().insert(caller);
                    inner.call(req).await
                }
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aibtc_kv::{KvError, KvStore, MemoryStore};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Extension, Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Store that is always unreachable
    struct FailingStore;

    #[async_trait]
    impl KvStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
            Err(KvError::Connection("refused".to_string()))
        }

        async fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), KvError> {
            Err(KvError::Connection("refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), KvError> {
            Err(KvError::Connection("refused".to_string()))
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.put("key:aibtcdev-frontend", "frontend-secret", None).await.unwrap();
        store.put("key:aibtcdev-backend", "backend-secret", None).await.unwrap();
        store
    }

    fn callers() -> Vec<String> {
        vec!["aibtcdev-frontend".to_string(), "aibtcdev-backend".to_string()]
    }

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, value.parse().unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn test_authorize_matches_each_caller() {
        let gate = SharedSecretGate::new(seeded_store().await, callers());

        let caller = gate.authorize(&headers(Some("frontend-secret"))).await.unwrap();
        assert_eq!(caller, TrustedCaller("aibtcdev-frontend".to_string()));

        let caller = gate.authorize(&headers(Some("backend-secret"))).await.unwrap();
        assert_eq!(caller, TrustedCaller("aibtcdev-backend".to_string()));
    }

    #[tokio::test]
    async fn test_authorize_rejects_missing_and_wrong_keys() {
        let gate = SharedSecretGate::new(seeded_store().await, callers());

        for value in [None, Some("")] {
            match gate.authorize(&headers(value)).await {
                Err(ServiceError::Unauthenticated(msg)) => {
                    assert_eq!(msg, "Missing Authorization header")
                }
                other => panic!("unexpected result {other:?}"),
            }
        }

        // Near misses do not match
        for value in ["wrong", "frontend-secre", "frontend-secret ", "Bearer frontend-secret"] {
            match gate.authorize(&headers(Some(value))).await {
                Err(ServiceError::Unauthenticated(msg)) => {
                    assert_eq!(msg, "Invalid Authorization key");
                    assert!(!msg.contains("secret"));
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_secret_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        store.put("key:aibtcdev-frontend", "frontend-secret", None).await.unwrap();
        let gate = SharedSecretGate::new(store, callers());

        let result = gate.authorize(&headers(Some("frontend-secret"))).await;
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let gate = SharedSecretGate::new(Arc::new(FailingStore), callers());

        let result = gate.authorize(&headers(Some("frontend-secret"))).await;
        assert!(matches!(result, Err(ServiceError::Store(KvError::Connection(_)))));
    }

    #[tokio::test]
    async fn test_rotation_applies_immediately() {
        let store = seeded_store().await;
        let gate = SharedSecretGate::new(store.clone(), callers());

        assert!(gate.authorize(&headers(Some("frontend-secret"))).await.is_ok());
        store.put("key:aibtcdev-frontend", "rotated", None).await.unwrap();

        assert!(gate.authorize(&headers(Some("frontend-secret"))).await.is_err());
        assert!(gate.authorize(&headers(Some("rotated"))).await.is_ok());
    }

    fn app(gate: SharedSecretGate) -> Router {
        Router::new()
            .route(
                "/auth/whoami",
                get(|Extension(caller): Extension<TrustedCaller>| async move { caller.0 }),
            )
            .route("/auth/", get(|| async { "listing" }))
            .route("/health", get(|| async { "ok" }))
            .layer(SharedSecretLayer::new(gate, "/auth/").exclude_path("/auth/"))
    }

    #[tokio::test]
    async fn test_layer_guards_prefix() {
        let app = app(SharedSecretGate::new(seeded_store().await, callers()));

        let request = Request::builder()
            .uri("/auth/whoami")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/auth/whoami")
            .header(AUTHORIZATION, "backend-secret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"aibtcdev-backend");

        // Excluded and unprefixed paths pass without a key
        for uri in ["/auth/", "/health"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }
}
