//! Notification records and follower fan-out.
//!
//! All writes go through the store's keyed upsert, so at most one live
//! notification exists per (type, sender, recipient, target).

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::page_window;
use crate::domain::{ContentRef, Notification, NotificationKey, NotificationType, Principal};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::NOTIFICATION_FANOUT_TOTAL;
use crate::repository::{ContentStore, NotificationFilter};

pub const DEFAULT_INBOX_LIMIT: u64 = 16;
pub const MAX_INBOX_LIMIT: u64 = 100;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn ContentStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Creates the notification unless it would be addressed to its sender or
    /// an identical one is already live. Returns whether a record was written.
    pub async fn notify(
        &self,
        kind: NotificationType,
        sender_id: Uuid,
        recipient_id: Uuid,
        target: Option<ContentRef>,
    ) -> ServiceResult<bool> {
        if sender_id == recipient_id {
            return Ok(false);
        }

        let notification = Notification::new(kind, sender_id, recipient_id, target);
        let created = self.store.insert_notification_if_absent(&notification).await?;
        if created {
            debug!(
                kind = kind.as_str(),
                sender_id = %sender_id,
                recipient_id = %recipient_id,
                "Notification created"
            );
        }
        Ok(created)
    }

    pub async fn retract(
        &self,
        kind: NotificationType,
        sender_id: Uuid,
        recipient_id: Uuid,
        target_id: Option<Uuid>,
    ) -> ServiceResult<bool> {
        let key = NotificationKey {
            kind,
            sender_id,
            recipient_id,
            target_id,
        };
        Ok(self.store.delete_notification_by_key(&key).await?)
    }

    /// Drops every notification that points at `target_id`.
    pub async fn retract_for_target(&self, target_id: Uuid) -> ServiceResult<u64> {
        let filter = NotificationFilter {
            target_id: Some(target_id),
            ..Default::default()
        };
        Ok(self.store.delete_notifications(&filter).await?)
    }

    /// Drops every notification matching `filter`; unset fields match anything.
    pub async fn retract_matching(&self, filter: &NotificationFilter) -> ServiceResult<u64> {
        Ok(self.store.delete_notifications(filter).await?)
    }

    /// Recipient inbox, newest first. Notifications from deleted senders are
    /// left out of the page.
    pub async fn list(
        &self,
        principal: &Principal,
        page: u64,
        limit: u64,
    ) -> ServiceResult<Vec<Notification>> {
        let (skip, limit) = page_window(page, limit, MAX_INBOX_LIMIT)?;
        let notifications = self
            .store
            .find_notifications(principal.id, skip, limit)
            .await?;

        let senders: BTreeSet<Uuid> = notifications.iter().map(|n| n.sender_id).collect();
        let lookups = senders.into_iter().map(|id| {
            let store = self.store.clone();
            async move { store.find_user(id).await.map(|user| (id, user.is_some())) }
        });
        let live: HashSet<Uuid> = try_join_all(lookups)
            .await?
            .into_iter()
            .filter_map(|(id, exists)| exists.then_some(id))
            .collect();

        Ok(notifications
            .into_iter()
            .filter(|n| live.contains(&n.sender_id))
            .collect())
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        let notification = self
            .store
            .find_notification(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Notification not found"))?;

        if notification.recipient_id != principal.id {
            return Err(ServiceError::forbidden(
                "You can only delete your own notifications",
            ));
        }

        self.store.delete_notification(id).await?;
        Ok(())
    }

    pub async fn delete_all(&self, principal: &Principal) -> ServiceResult<u64> {
        let filter = NotificationFilter {
            recipient_id: Some(principal.id),
            ..Default::default()
        };
        let removed = self.store.delete_notifications(&filter).await?;
        info!(user_id = %principal.id, removed, "Cleared notification inbox");
        Ok(removed)
    }
}

/// One new post to announce to the author's followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerFanout {
    pub author_id: Uuid,
    pub post: ContentRef,
    pub followers: Vec<Uuid>,
}

async fn deliver(notifications: &NotificationService, job: FollowerFanout) {
    for follower in job.followers {
        let result = notifications
            .notify(
                NotificationType::FollowingPost,
                job.author_id,
                follower,
                Some(job.post),
            )
            .await;

        let label = match result {
            Ok(true) => "created",
            Ok(false) => "duplicate",
            Err(err) => {
                warn!(
                    error = %err,
                    follower_id = %follower,
                    post_id = %job.post.id,
                    "FOLLOWING_POST delivery failed"
                );
                "error"
            }
        };
        NOTIFICATION_FANOUT_TOTAL.with_label_values(&[label]).inc();
    }
}

enum Mode {
    Inline,
    Queued(Mutex<Option<mpsc::Sender<FollowerFanout>>>),
}

/// Hands FOLLOWING_POST fan-out to a bounded queue drained by a background
/// worker, or delivers on the calling task in inline mode.
pub struct FanoutDispatcher {
    notifications: NotificationService,
    mode: Mode,
}

impl FanoutDispatcher {
    pub fn inline(notifications: NotificationService) -> Self {
        Self {
            notifications,
            mode: Mode::Inline,
        }
    }

    /// Spawns the worker. The returned handle finishes once [`Self::close`]
    /// has been called and the queue is drained.
    pub fn spawn(notifications: NotificationService, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<FollowerFanout>(capacity.max(1));
        let worker_notifications = notifications.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                deliver(&worker_notifications, job).await;
            }
            info!("Fan-out worker drained and stopped");
        });

        let dispatcher = Self {
            notifications,
            mode: Mode::Queued(Mutex::new(Some(tx))),
        };
        (dispatcher, handle)
    }

    pub async fn dispatch(&self, job: FollowerFanout) {
        if job.followers.is_empty() {
            return;
        }

        let sender = match &self.mode {
            Mode::Inline => None,
            Mode::Queued(slot) => slot.lock().ok().and_then(|guard| guard.clone()),
        };

        match sender {
            Some(tx) => {
                if let Err(mpsc::error::SendError(job)) = tx.send(job).await {
                    warn!("Fan-out queue closed, delivering inline");
                    deliver(&self.notifications, job).await;
                }
            }
            None => deliver(&self.notifications, job).await,
        }
    }

    /// Stops accepting queued work. Later dispatches are delivered inline.
    pub fn close(&self) {
        if let Mode::Queued(slot) = &self.mode {
            if let Ok(mut guard) = slot.lock() {
                guard.take();
            }
        }
    }
}
