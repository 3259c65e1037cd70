//! When an incoming message deserves an audible notification.

use crate::types::NewMessageEvent;
use serde::{Deserialize, Serialize};

/// What the user is currently looking at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewContext {
    /// Chat open in the foreground, if any
    pub active_chat_id: Option<String>,
    pub page_visible: bool,
}

impl ViewContext {
    pub fn new(active_chat_id: Option<impl Into<String>>, page_visible: bool) -> Self {
        Self {
            active_chat_id: active_chat_id.map(Into::into),
            page_visible,
        }
    }

    pub fn is_viewing(&self, chat_id: &str) -> bool {
        self.active_chat_id.as_deref() == Some(chat_id)
    }
}

/// Why a notification should be played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    DifferentChat,
    PageHidden,
}

impl NotifyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DifferentChat => "different chat",
            Self::PageHidden => "page not visible",
        }
    }
}

/// Notify unless the user is looking at that chat with the page visible.
/// Being in a different chat takes precedence as the reported reason.
pub fn should_notify(event: &NewMessageEvent, view: &ViewContext) -> Option<NotifyReason> {
    if !view.is_viewing(&event.chat_id) {
        Some(NotifyReason::DifferentChat)
    } else if !view.page_visible {
        Some(NotifyReason::PageHidden)
    } else {
        tracing::debug!(
            "Notification skipped - chat {} is active and visible",
            event.chat_id
        );
        None
    }
}
