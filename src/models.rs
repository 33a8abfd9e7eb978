use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic envelope every console route answers with
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: String,
    pub meta: Option<PageMeta>,
}
impl<T: Serialize> Envelope<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: message.into(), meta: None }
    }
    pub fn err(code: &str, message: &str) -> Self {
        Self { success: false, data: None, error: Some(code.into()), message: message.into(), meta: None }
    }
    pub fn with_meta(mut self, meta: PageMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Paging info for the current page. `total` is the length of that page,
/// the remote service reports no filtered total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageMeta {
    pub total: usize,
    pub skip: u32,
    pub limit: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType { NewOrder, OrderUpdated, PaymentReceived, UserRegistered }

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::OrderUpdated => "order_updated",
            Self::PaymentReceived => "payment_received",
            Self::UserRegistered => "user_registered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus { Unread, Read, Archived }

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Archived => "archived",
        }
    }

    /// Transitions the operator may trigger. Archived is terminal.
    pub fn can_transition_to(self, next: NotificationStatus) -> bool {
        use NotificationStatus::*;
        matches!((self, next), (Unread, Read) | (Unread, Archived) | (Read, Archived))
    }

    pub fn badge_color(self) -> &'static str {
        match self {
            Self::Unread => "blue",
            Self::Read => "gray",
            Self::Archived => "slate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority { Low, Medium, High, Urgent }

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn badge_color(self) -> &'static str {
        match self {
            Self::Low => "green",
            Self::Medium => "yellow",
            Self::High => "orange",
            Self::Urgent => "red",
        }
    }
}

/// Operator actions offered on a list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action { MarkRead, Archive }

/// Server-owned record; the console only ever holds a point-in-time copy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    pub priority: Priority,
    #[serde(default)]
    pub related_id: Option<i64>,
    #[serde(default)]
    pub related_type: Option<String>,
    #[serde(default)]
    pub triggered_by_user_id: Option<i64>,
    #[serde(default)]
    pub user_first_name: Option<String>,
    #[serde(default)]
    pub user_last_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn can_mark_read(&self) -> bool {
        self.status == NotificationStatus::Unread
    }

    pub fn can_archive(&self) -> bool {
        self.status != NotificationStatus::Archived
    }

    pub fn actions(&self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        if self.can_mark_read() {
            actions.push(Action::MarkRead);
        }
        if self.can_archive() {
            actions.push(Action::Archive);
        }
        actions
    }

    /// unread -> read, stamping `read_at` once. Repeating it, or calling it
    /// on an archived record, leaves the record untouched.
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if self.status.can_transition_to(NotificationStatus::Read) {
            self.status = NotificationStatus::Read;
            self.read_at.get_or_insert(now);
        }
    }

    pub fn archive(&mut self) {
        if self.status.can_transition_to(NotificationStatus::Archived) {
            self.status = NotificationStatus::Archived;
        }
    }

    /// Who triggered the event, as shown in the list.
    pub fn display_name(&self) -> String {
        let name = [self.user_first_name.as_deref(), self.user_last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            return name;
        }
        self.user_email.clone().unwrap_or_else(|| "System".to_string())
    }
}

/// POST /notifications/
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct NotificationCreate {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// GET /notifications/unread-count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

/// Session user as reported by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[cfg(test)]
pub(crate) fn sample(id: i64, status: NotificationStatus) -> Notification {
    Notification {
        id,
        notification_type: NotificationType::NewOrder,
        title: format!("Order #{id}"),
        message: "A new order was placed".into(),
        status,
        priority: Priority::Medium,
        related_id: Some(id * 10),
        related_type: Some("order".into()),
        triggered_by_user_id: None,
        user_first_name: None,
        user_last_name: None,
        user_email: None,
        metadata: None,
        created_at: Utc::now(),
        read_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mark_read_stamps_once_and_never_regresses() {
        let mut n = sample(1, NotificationStatus::Unread);
        let first = Utc::now();
        n.mark_read(first);
        assert_eq!(n.status, NotificationStatus::Read);
        assert_eq!(n.read_at, Some(first));

        n.mark_read(first + chrono::Duration::seconds(30));
        assert_eq!(n.status, NotificationStatus::Read);
        assert_eq!(n.read_at, Some(first));
    }

    #[test]
    fn archive_reachable_from_unread_and_read_only() {
        let mut unread = sample(1, NotificationStatus::Unread);
        assert!(unread.actions().contains(&Action::Archive));
        unread.archive();
        assert_eq!(unread.status, NotificationStatus::Archived);
        assert!(unread.read_at.is_none());

        let mut read = sample(2, NotificationStatus::Read);
        assert_eq!(read.actions(), vec![Action::Archive]);
        read.archive();
        assert_eq!(read.status, NotificationStatus::Archived);

        assert!(read.actions().is_empty());
        read.mark_read(Utc::now());
        assert_eq!(read.status, NotificationStatus::Archived);
        assert!(!NotificationStatus::Archived.can_transition_to(NotificationStatus::Unread));
    }

    #[test]
    fn decodes_wire_record_with_opaque_metadata() {
        let raw = json!({
            "id": 7,
            "type": "payment_received",
            "title": "Payment",
            "message": "Invoice 42 paid",
            "status": "unread",
            "priority": "urgent",
            "related_id": 42,
            "related_type": "order",
            "user_first_name": "Ada",
            "user_last_name": "Lovelace",
            "metadata": {"amount": {"value": 1200, "currency": "EUR"}},
            "created_at": "2024-05-01T10:00:00Z",
            "read_at": null
        });
        let n: Notification = serde_json::from_value(raw).unwrap();
        assert_eq!(n.notification_type, NotificationType::PaymentReceived);
        assert_eq!(n.priority.badge_color(), "red");
        assert_eq!(n.display_name(), "Ada Lovelace");
        assert_eq!(n.metadata.unwrap()["amount"]["currency"], "EUR");
    }

    #[test]
    fn create_payload_omits_unset_optionals() {
        let body = NotificationCreate {
            notification_type: NotificationType::UserRegistered,
            title: "Welcome".into(),
            message: "New account".into(),
            priority: Priority::Low,
            related_id: None,
            related_type: None,
            triggered_by_user_id: Some(3),
            metadata: None,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["type"], "user_registered");
        assert_eq!(v["triggered_by_user_id"], 3);
        assert!(v.get("related_id").is_none());
    }
}
