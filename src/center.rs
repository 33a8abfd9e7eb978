use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::auth::AdminUser;
use crate::error::{CenterError, FormError};
use crate::filters::{FilterChange, Generation, NotificationFilters};
use crate::models::{Notification, NotificationCreate, NotificationType, PageMeta, Priority};
use crate::service::NotificationService;

/// Creation form as the operator is filling it in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateForm {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub metadata: Option<Value>,
}

impl Default for CreateForm {
    fn default() -> Self {
        Self {
            notification_type: NotificationType::NewOrder,
            priority: Priority::Medium,
            title: String::new(),
            message: String::new(),
            related_id: None,
            related_type: None,
            metadata: None,
        }
    }
}

impl CreateForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::MissingTitle);
        }
        if self.message.trim().is_empty() {
            return Err(FormError::MissingMessage);
        }
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        self.validate().is_ok()
    }

    fn to_create(&self, by: &AdminUser) -> NotificationCreate {
        NotificationCreate {
            notification_type: self.notification_type,
            title: self.title.clone(),
            message: self.message.clone(),
            priority: self.priority,
            related_id: self.related_id,
            related_type: self.related_type.clone(),
            triggered_by_user_id: Some(by.id()),
            metadata: self.metadata.clone(),
        }
    }
}

/// What happened to a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer request had already landed; the response was dropped.
    Stale,
    /// The service call failed; the previous data is still shown.
    Failed,
}

/// Everything the list view renders.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub total: usize,
    pub filters: NotificationFilters,
    pub has_previous: bool,
    pub has_next: bool,
    pub form: CreateForm,
    pub can_submit: bool,
}

impl Snapshot {
    pub fn page_meta(&self) -> PageMeta {
        PageMeta {
            total: self.total,
            skip: self.filters.skip,
            limit: self.filters.limit,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

struct CenterState {
    filters: NotificationFilters,
    notifications: Vec<Notification>,
    unread_count: u64,
    form: CreateForm,
    list_gen: Generation,
    count_gen: Generation,
}

pub struct NotificationCenter {
    service: Arc<dyn NotificationService>,
    state: Mutex<CenterState>,
}

impl NotificationCenter {
    pub fn new(service: Arc<dyn NotificationService>, page_size: u32) -> Self {
        Self {
            service,
            state: Mutex::new(CenterState {
                filters: NotificationFilters::with_limit(page_size),
                notifications: Vec::new(),
                unread_count: 0,
                form: CreateForm::default(),
                list_gen: Generation::default(),
                count_gen: Generation::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            total: state.notifications.len(),
            has_previous: state.filters.has_previous(),
            has_next: state.filters.has_next(state.notifications.len()),
            notifications: state.notifications.clone(),
            unread_count: state.unread_count,
            filters: state.filters.clone(),
            can_submit: state.form.is_submittable(),
            form: state.form.clone(),
        }
    }

    pub fn filters(&self) -> NotificationFilters {
        self.lock().filters.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.lock().unread_count
    }

    pub fn form(&self) -> CreateForm {
        self.lock().form.clone()
    }

    pub fn update_form<F: FnOnce(&mut CreateForm)>(&self, edit: F) {
        edit(&mut self.lock().form);
    }

    /// Applies one filter edit and issues exactly one list fetch for the result.
    pub async fn set_filter(&self, change: FilterChange) -> FetchOutcome {
        self.lock().filters.apply(change);
        self.refresh_list().await
    }

    pub async fn refresh_list(&self) -> FetchOutcome {
        let (token, filters) = {
            let mut state = self.lock();
            (state.list_gen.issue(), state.filters.clone())
        };
        let result = self.service.get_notifications(&filters).await;

        let mut state = self.lock();
        // A failed newer request still outranks an older one in flight.
        if !state.list_gen.try_apply(token) {
            debug!(token, latest = state.list_gen.latest(), "dropping stale notification page");
            return FetchOutcome::Stale;
        }
        match result {
            Ok(page) => {
                debug!(token, count = page.len(), skip = filters.skip, "notification page applied");
                state.notifications = page;
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch notifications, keeping previous page");
                FetchOutcome::Failed
            }
        }
    }

    pub async fn refresh_unread_count(&self) -> FetchOutcome {
        let token = self.lock().count_gen.issue();
        let result = self.service.get_unread_count().await;

        let mut state = self.lock();
        if !state.count_gen.try_apply(token) {
            return FetchOutcome::Stale;
        }
        match result {
            Ok(count) => {
                state.unread_count = count.unread_count;
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch unread count, keeping previous value");
                FetchOutcome::Failed
            }
        }
    }

    /// Re-reads the current page and the unread counter.
    pub async fn refresh(&self) -> (FetchOutcome, FetchOutcome) {
        tokio::join!(self.refresh_list(), self.refresh_unread_count())
    }

    /// The service call is unconditional; repeating it on a read record is harmless.
    pub async fn mark_as_read(&self, id: i64) -> Result<(), CenterError> {
        if let Err(e) = self.service.mark_as_read(id).await {
            warn!(id, error = %e, "mark as read failed");
            return Err(e.into());
        }
        info!(id, "notification marked read");
        self.refresh().await;
        Ok(())
    }

    /// Not offered once the displayed copy is archived.
    pub async fn mark_as_archived(&self, id: i64) -> Result<(), CenterError> {
        let archived = self
            .lock()
            .notifications
            .iter()
            .any(|n| n.id == id && !n.can_archive());
        if archived {
            return Err(CenterError::ActionUnavailable { id });
        }
        if let Err(e) = self.service.mark_as_archived(id).await {
            warn!(id, error = %e, "archive failed");
            return Err(e.into());
        }
        info!(id, "notification archived");
        self.refresh().await;
        Ok(())
    }

    /// Submits the console's own creation form on behalf of `by`.
    pub async fn submit_form(&self, by: &AdminUser) -> Result<Notification, CenterError> {
        self.submit(self.form(), by).await
    }

    /// Creates `form` on behalf of `by`. The shared form is cleared only if it
    /// still holds what was submitted; on failure it is left as it was.
    pub async fn submit(&self, form: CreateForm, by: &AdminUser) -> Result<Notification, CenterError> {
        form.validate()?;

        let created = match self.service.create_notification(&form.to_create(by)).await {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, "create notification failed, form kept for retry");
                return Err(e.into());
            }
        };
        info!(id = created.id, kind = created.notification_type.as_str(), "notification created");
        {
            let mut state = self.lock();
            if state.form == form {
                state.form = CreateForm::default();
            }
        }
        self.refresh().await;
        Ok(created)
    }

    /// Polls the service on `every` until the returned handle is aborted.
    /// The first tick fires immediately and doubles as the initial load.
    pub fn spawn_poller(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let center = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                center.refresh().await;
            }
        })
    }
}
