//! Logical notification payloads.
//!
//! The engine emits one payload per point append and per manual
//! intervention. Delivery belongs to an external dispatcher.

use crate::model::point::PointKind;
use crate::model::subject::SubjectId;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Merit,
    Demerit,
    LevelChange,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merit => "merit",
            Self::Demerit => "demerit",
            Self::LevelChange => "level_change",
        }
    }
}

impl From<PointKind> for NotificationKind {
    fn from(value: PointKind) -> Self {
        match value {
            PointKind::Merit => Self::Merit,
            PointKind::Demerit => Self::Demerit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject_id: SubjectId,
    pub kind: NotificationKind,
    pub description: String,
}

/// Receives notification payloads after the triggering write committed.
pub trait NotificationSink {
    fn notify(&self, notification: &Notification);
}

impl<N: NotificationSink + ?Sized> NotificationSink for &N {
    fn notify(&self, notification: &Notification) {
        (**self).notify(notification);
    }
}

/// Default sink: records that a payload was emitted, without its text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: &Notification) {
        info!(
            "event=notification_emit module=notify status=ok kind={} subject={} description_len={}",
            notification.kind.as_str(),
            notification.subject_id,
            notification.description.chars().count()
        );
    }
}

/// Collects payloads in memory for embedders that forward them in bulk.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything collected so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn notify(&self, notification: &Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
    }
}
