use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::error::ServiceError;
use crate::models::User;
use crate::service::{decode, normalize_base};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolves a session token to its user, `None` when the session is unknown.
    async fn current_user(&self, token: &str) -> Result<Option<User>, ServiceError>;
}

#[derive(Clone)]
pub struct HttpSessionStore {
    http: Client,
    base: Url,
}

impl HttpSessionStore {
    pub fn new(http: Client, base: Url) -> Self {
        Self { http, base: normalize_base(base) }
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn current_user(&self, token: &str) -> Result<Option<User>, ServiceError> {
        let url = self.base.join("auth/me")?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        decode(resp).await.map(Some)
    }
}

/// A user the gate has let through. Only [`AccessGate::check`] builds one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminUser(User);

impl AdminUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn user(&self) -> &User {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Granted(AdminUser),
    RedirectLogin,
    RedirectHome,
}

impl Access {
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Access::Granted(_) => None,
            Access::RedirectLogin => Some("/login"),
            Access::RedirectHome => Some("/"),
        }
    }
}

/// Decides where the operator is sent. The remote service still authorizes every call.
pub struct AccessGate<S: ?Sized> {
    store: std::sync::Arc<S>,
}

impl<S: SessionStore + ?Sized> AccessGate<S> {
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self { store }
    }

    pub async fn check(&self, token: Option<&str>) -> Access {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Access::RedirectLogin;
        };
        match self.store.current_user(token).await {
            Ok(Some(user)) if user.is_admin() => Access::Granted(AdminUser(user)),
            Ok(Some(_)) => Access::RedirectHome,
            Ok(None) => Access::RedirectLogin,
            Err(e) => {
                warn!(error = %e, "session lookup failed, sending operator to login");
                Access::RedirectLogin
            }
        }
    }
}

impl<S: ?Sized> Clone for AccessGate<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn user(id: i64, role: &str) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            first_name: Some("Test".into()),
            last_name: None,
            role: role.into(),
        }
    }

    pub(crate) struct FixedSessions(pub HashMap<String, User>);

    #[async_trait]
    impl SessionStore for FixedSessions {
        async fn current_user(&self, token: &str) -> Result<Option<User>, ServiceError> {
            if token == "broken" {
                return Err(ServiceError::Decode("boom".into()));
            }
            Ok(self.0.get(token).cloned())
        }
    }

    pub(crate) fn gate() -> AccessGate<FixedSessions> {
        let sessions = HashMap::from([
            ("admin-token".to_string(), user(1, "admin")),
            ("buyer-token".to_string(), user(2, "customer")),
        ]);
        AccessGate::new(Arc::new(FixedSessions(sessions)))
    }

    #[tokio::test]
    async fn gate_routes_by_session_and_role() {
        let gate = gate();
        assert_eq!(gate.check(None).await, Access::RedirectLogin);
        assert_eq!(gate.check(Some("")).await, Access::RedirectLogin);
        assert_eq!(gate.check(Some("unknown")).await, Access::RedirectLogin);
        assert_eq!(gate.check(Some("broken")).await, Access::RedirectLogin);
        assert_eq!(gate.check(Some("buyer-token")).await, Access::RedirectHome);
        match gate.check(Some("admin-token")).await {
            Access::Granted(admin) => assert_eq!(admin.id(), 1),
            other => panic!("expected access, got {other:?}"),
        }
    }

    #[test]
    fn role_compare_is_literal() {
        assert!(!user(3, "Admin").is_admin());
        assert!(!user(3, "administrator").is_admin());
        assert!(user(3, "admin").is_admin());
    }

    #[tokio::test]
    async fn http_store_maps_unauthorized_to_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user(5, "admin")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let http = crate::service::http_client(Duration::from_secs(5)).unwrap();
        let store = HttpSessionStore::new(http, Url::parse(&format!("{}/api", server.uri())).unwrap());
        assert_eq!(store.current_user("good").await.unwrap().map(|u| u.id), Some(5));
        assert_eq!(store.current_user("expired").await.unwrap(), None);
    }
}
