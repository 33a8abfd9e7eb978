use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ServiceError;
use crate::filters::NotificationFilters;
use crate::models::{Notification, NotificationCreate, NotificationStatus, UnreadCount};

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn get_notifications(&self, filters: &NotificationFilters) -> Result<Vec<Notification>, ServiceError>;

    async fn get_unread_count(&self) -> Result<UnreadCount, ServiceError>;

    async fn create_notification(&self, body: &NotificationCreate) -> Result<Notification, ServiceError>;

    async fn mark_as_read(&self, id: i64) -> Result<(), ServiceError>;

    async fn mark_as_archived(&self, id: i64) -> Result<(), ServiceError>;
}

/// Builds the shared reqwest client used by the remote backends.
pub fn http_client(timeout: Duration) -> Result<Client, ServiceError> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()?)
}

/// `Url::join` drops the last segment of a base without a trailing slash.
pub(crate) fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) async fn ensure_success(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Status { status: status.as_u16(), body })
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    ensure_success(resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

#[derive(Clone)]
pub struct HttpNotificationService {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl HttpNotificationService {
    pub fn new(http: Client, base: Url, token: Option<String>) -> Self {
        Self { http, base: normalize_base(base), token }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn get_notifications(&self, filters: &NotificationFilters) -> Result<Vec<Notification>, ServiceError> {
        let url = self.endpoint("notifications/")?;
        let resp = self
            .authorize(self.http.get(url).query(&filters.query_pairs()))
            .send()
            .await?;
        decode(resp).await
    }

    async fn get_unread_count(&self) -> Result<UnreadCount, ServiceError> {
        let url = self.endpoint("notifications/unread-count")?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        decode(resp).await
    }

    async fn create_notification(&self, body: &NotificationCreate) -> Result<Notification, ServiceError> {
        let url = self.endpoint("notifications/")?;
        let resp = self.authorize(self.http.post(url).json(body)).send().await?;
        decode(resp).await
    }

    async fn mark_as_read(&self, id: i64) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("notifications/{id}/read"))?;
        let resp = self.authorize(self.http.put(url)).send().await?;
        ensure_success(resp).await.map(|_| ())
    }

    async fn mark_as_archived(&self, id: i64) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("notifications/{id}/archive"))?;
        let resp = self.authorize(self.http.put(url)).send().await?;
        ensure_success(resp).await.map(|_| ())
    }
}

/// In-process backend applying the status state machine itself.
#[derive(Default)]
pub struct MemoryNotificationService {
    inner: Mutex<MemoryStore>,
}

#[derive(Default)]
struct MemoryStore {
    next_id: i64,
    items: Vec<Notification>,
}

impl MemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_item<F>(&self, id: i64, f: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut Notification),
    {
        let mut store = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let item = store
            .items
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(ServiceError::NotFound(id))?;
        f(item);
        Ok(())
    }
}

#[async_trait]
impl NotificationService for MemoryNotificationService {
    async fn get_notifications(&self, filters: &NotificationFilters) -> Result<Vec<Notification>, ServiceError> {
        let store = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<Notification> = store
            .items
            .iter()
            .filter(|n| filters.status.map_or(true, |s| n.status == s))
            .filter(|n| filters.notification_type.map_or(true, |t| n.notification_type == t))
            .filter(|n| filters.priority.map_or(true, |p| n.priority == p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(filters.skip as usize)
            .take(filters.limit as usize)
            .collect())
    }

    async fn get_unread_count(&self) -> Result<UnreadCount, ServiceError> {
        let store = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let unread_count = store
            .items
            .iter()
            .filter(|n| n.status == NotificationStatus::Unread)
            .count() as u64;
        Ok(UnreadCount { unread_count })
    }

    async fn create_notification(&self, body: &NotificationCreate) -> Result<Notification, ServiceError> {
        let mut store = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        store.next_id += 1;
        let created = Notification {
            id: store.next_id,
            notification_type: body.notification_type,
            title: body.title.clone(),
            message: body.message.clone(),
            status: NotificationStatus::Unread,
            priority: body.priority,
            related_id: body.related_id,
            related_type: body.related_type.clone(),
            triggered_by_user_id: body.triggered_by_user_id,
            user_first_name: None,
            user_last_name: None,
            user_email: None,
            metadata: body.metadata.clone(),
            created_at: Utc::now(),
            read_at: None,
        };
        store.items.push(created.clone());
        Ok(created)
    }

    async fn mark_as_read(&self, id: i64) -> Result<(), ServiceError> {
        self.with_item(id, |n| n.mark_read(Utc::now()))
    }

    async fn mark_as_archived(&self, id: i64) -> Result<(), ServiceError> {
        self.with_item(id, Notification::archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterChange;
    use crate::models::{NotificationType, Priority};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create(title: &str, kind: NotificationType) -> NotificationCreate {
        NotificationCreate {
            notification_type: kind,
            title: title.into(),
            message: "body".into(),
            priority: Priority::Medium,
            related_id: None,
            related_type: None,
            triggered_by_user_id: None,
            metadata: None,
        }
    }

    fn remote(server: &MockServer) -> HttpNotificationService {
        let base = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
        HttpNotificationService::new(
            http_client(Duration::from_secs(5)).unwrap(),
            base,
            Some("secret".into()),
        )
    }

    fn wire(id: i64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "new_order",
            "title": "Order",
            "message": "placed",
            "status": status,
            "priority": "high",
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn list_sends_only_set_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications/"))
            .and(query_param("status", "unread"))
            .and(query_param("skip", "0"))
            .and(query_param("limit", "20"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([wire(1, "unread")])))
            .expect(1)
            .mount(&server)
            .await;

        let mut filters = NotificationFilters::default();
        filters.apply(FilterChange::Status(Some(NotificationStatus::Unread)));
        let page = remote(&server).get_notifications(&filters).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn unread_count_and_transitions_hit_contract_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications/unread-count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unread_count": 4})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/notifications/9/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wire(9, "read")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/notifications/9/archive"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let svc = remote(&server);
        assert_eq!(svc.get_unread_count().await.unwrap().unread_count, 4);
        svc.mark_as_read(9).await.unwrap();
        svc.mark_as_archived(9).await.unwrap();
    }

    #[tokio::test]
    async fn create_posts_payload_and_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/notifications/"))
            .and(body_partial_json(json!({"type": "order_updated", "title": "Shipped"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(wire(12, "unread")))
            .mount(&server)
            .await;

        let created = remote(&server)
            .create_notification(&create("Shipped", NotificationType::OrderUpdated))
            .await
            .unwrap();
        assert_eq!(created.id, 12);
    }

    #[tokio::test]
    async fn error_status_and_bad_json_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications/unread-count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let svc = remote(&server);
        match svc.get_notifications(&NotificationFilters::default()).await {
            Err(ServiceError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(matches!(svc.get_unread_count().await, Err(ServiceError::Decode(_))));
    }

    #[tokio::test]
    async fn memory_backend_applies_state_machine() {
        let svc = MemoryNotificationService::new();
        let a = svc.create_notification(&create("a", NotificationType::NewOrder)).await.unwrap();
        let b = svc.create_notification(&create("b", NotificationType::UserRegistered)).await.unwrap();
        assert_eq!(svc.get_unread_count().await.unwrap().unread_count, 2);

        svc.mark_as_read(a.id).await.unwrap();
        svc.mark_as_read(a.id).await.unwrap();
        svc.mark_as_archived(b.id).await.unwrap();

        let all = svc.get_notifications(&NotificationFilters::default()).await.unwrap();
        let a_now = all.iter().find(|n| n.id == a.id).unwrap();
        assert_eq!(a_now.status, NotificationStatus::Read);
        assert!(a_now.read_at.is_some());
        assert_eq!(svc.get_unread_count().await.unwrap().unread_count, 0);

        let mut only_archived = NotificationFilters::default();
        only_archived.apply(FilterChange::Status(Some(NotificationStatus::Archived)));
        let archived = svc.get_notifications(&only_archived).await.unwrap();
        assert_eq!(archived.iter().map(|n| n.id).collect::<Vec<_>>(), vec![b.id]);

        assert!(matches!(svc.mark_as_read(99).await, Err(ServiceError::NotFound(99))));
    }
}
