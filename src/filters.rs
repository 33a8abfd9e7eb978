use serde::{Deserialize, Serialize};

use crate::models::{NotificationStatus, NotificationType, Priority};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The slice of notifications currently requested. Unset fields mean "no constraint".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilters {
    pub status: Option<NotificationStatus>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for NotificationFilters {
    fn default() -> Self {
        Self::with_limit(DEFAULT_PAGE_SIZE)
    }
}

/// One field edit of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum FilterChange {
    Status(Option<NotificationStatus>),
    Type(Option<NotificationType>),
    Priority(Option<Priority>),
    Limit(u32),
    Skip(u32),
}

impl NotificationFilters {
    pub fn with_limit(limit: u32) -> Self {
        Self { status: None, notification_type: None, priority: None, skip: 0, limit: limit.max(1) }
    }

    /// Applies `change`. Anything other than an offset move starts over at the first page.
    pub fn apply(&mut self, change: FilterChange) {
        match change {
            FilterChange::Skip(skip) => {
                self.skip = skip;
                return;
            }
            FilterChange::Status(v) => self.status = v,
            FilterChange::Type(v) => self.notification_type = v,
            FilterChange::Priority(v) => self.priority = v,
            FilterChange::Limit(v) => self.limit = v.max(1),
        }
        self.skip = 0;
    }

    pub fn next_page(&self) -> FilterChange {
        FilterChange::Skip(self.skip.saturating_add(self.limit))
    }

    pub fn previous_page(&self) -> FilterChange {
        FilterChange::Skip(self.skip.saturating_sub(self.limit))
    }

    pub fn has_previous(&self) -> bool {
        self.skip > 0
    }

    /// A full page suggests there may be more; a short one is the last.
    pub fn has_next(&self, page_len: usize) -> bool {
        page_len as u64 == u64::from(self.limit)
    }

    /// Query pairs for the list endpoint, unset filters omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(kind) = self.notification_type {
            pairs.push(("type", kind.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        pairs.push(("skip", self.skip.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// Monotonic request token. A response is applied only when its token is
/// newer than the last one applied, so results land in issue order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Generation {
    issued: u64,
    applied: u64,
}

impl Generation {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn try_apply(&mut self, token: u64) -> bool {
        if token > self.applied {
            self.applied = token;
            true
        } else {
            false
        }
    }

    pub fn latest(&self) -> u64 {
        self.issued
    }
}
