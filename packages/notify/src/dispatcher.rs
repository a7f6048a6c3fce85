// ABOUTME: Fans committed transitions out to the affected users
// ABOUTME: Durable row per recipient first, live push second, never back into the engine

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use leadflow_core::UserRole;
use leadflow_pipeline::storage::{StorageResult, UserStorage};
use leadflow_pipeline::workflow::{TransitionEvent, TransitionOp};

use crate::registry::ConnectionRegistry;
use crate::storage::NotificationStorage;
use crate::types::{MentionEvent, NotificationKind};

/// Turns engine events into per-recipient notifications. Persistence
/// failures are logged and skipped; a notification never fails a
/// transition that already committed.
pub struct Dispatcher {
    users: Arc<UserStorage>,
    notifications: Arc<NotificationStorage>,
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(
        users: Arc<UserStorage>,
        notifications: Arc<NotificationStorage>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            users,
            notifications,
            registry,
        }
    }

    /// Consume the engine's event channel until it closes.
    pub fn spawn(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransitionEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.dispatch_transition(&event).await;
            }
            info!("Transition event channel closed, dispatcher stopping");
        })
    }

    /// Fan one committed transition out. One durable row per recipient,
    /// then a best-effort push to whoever is connected.
    pub async fn dispatch_transition(&self, event: &TransitionEvent) {
        let recipients = match self.recipients_for(event).await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(
                    "Failed to resolve recipients for '{}' on request {}: {}",
                    event.op, event.request_id, e
                );
                return;
            }
        };

        let message = format!(
            "{} moved request '{}' from {} to {}",
            event.actor_name, event.request_title, event.from, event.to
        );

        for recipient in recipients {
            let notification = match self
                .notifications
                .create_notification(
                    &recipient,
                    NotificationKind::StatusChange,
                    "request",
                    &event.request_id,
                    &message,
                )
                .await
            {
                Ok(notification) => notification,
                Err(e) => {
                    error!(
                        "Failed to persist notification for user {}: {}",
                        recipient, e
                    );
                    continue;
                }
            };

            let pushed = self.registry.send(&recipient, notification);
            debug!(
                "Notified {} about '{}' on request {} (live: {})",
                recipient, event.op, event.request_id, pushed
            );
        }
    }

    /// Persist and push a mention. Mentioned users get a mention row;
    /// participants who were not mentioned get a comment row. The actor
    /// never hears about their own words.
    pub async fn dispatch_mention(&self, event: &MentionEvent) {
        let mentioned: BTreeSet<&str> = event
            .mentioned
            .iter()
            .map(String::as_str)
            .filter(|id| *id != event.actor_id)
            .collect();
        let commented: BTreeSet<&str> = event
            .participants
            .iter()
            .map(String::as_str)
            .filter(|id| *id != event.actor_id && !mentioned.contains(id))
            .collect();

        for (recipient, kind) in mentioned
            .iter()
            .map(|id| (*id, NotificationKind::Mention))
            .chain(commented.iter().map(|id| (*id, NotificationKind::Comment)))
        {
            match self
                .notifications
                .create_notification(
                    recipient,
                    kind,
                    &event.entity_type,
                    &event.entity_id,
                    &event.message,
                )
                .await
            {
                Ok(notification) => {
                    self.registry.send(recipient, notification);
                }
                Err(e) => {
                    error!("Failed to persist mention for user {}: {}", recipient, e);
                }
            }
        }
    }

    /// Who should hear about this transition. The actor never notifies
    /// themselves; duplicates collapse.
    async fn recipients_for(&self, event: &TransitionEvent) -> StorageResult<Vec<String>> {
        let mut recipients: BTreeSet<String> = match event.op {
            TransitionOp::SendToReview => self.role_ids(UserRole::PreSale).await?,
            TransitionOp::SendToEstimation => self.role_ids(UserRole::TechLead).await?,
            TransitionOp::StartReview
            | TransitionOp::PresaleApprove
            | TransitionOp::PresaleReject => {
                BTreeSet::from([event.created_by.clone()])
            }
            TransitionOp::ApproveEstimation
            | TransitionOp::SaleAccept
            | TransitionOp::SaleRequestEdit
            | TransitionOp::SaleReject => match &event.assigned_presale {
                Some(presale) => BTreeSet::from([presale.clone()]),
                None => self.role_ids(UserRole::PreSale).await?,
            },
            TransitionOp::PresaleRejectEstimate => match &event.assigned_techlead {
                Some(techlead) => BTreeSet::from([techlead.clone()]),
                None => self.role_ids(UserRole::TechLead).await?,
            },
            // Everyone who touched the request hears about its end states.
            TransitionOp::Contract | TransitionOp::Reject => {
                let mut participants = BTreeSet::from([event.created_by.clone()]);
                participants.extend(event.assigned_presale.iter().cloned());
                participants.extend(event.assigned_techlead.iter().cloned());
                participants
            }
        };

        recipients.remove(&event.actor_id);
        Ok(recipients.into_iter().collect())
    }

    async fn role_ids(&self, role: UserRole) -> StorageResult<BTreeSet<String>> {
        Ok(self
            .users
            .list_users_by_role(role)
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadflow_pipeline::test_utils::{seed_user, test_pool};
    use leadflow_pipeline::types::RequestStatus;

    fn event(
        op: TransitionOp,
        from: RequestStatus,
        to: RequestStatus,
        actor_id: &str,
        created_by: &str,
        assigned_presale: Option<&str>,
        assigned_techlead: Option<&str>,
    ) -> TransitionEvent {
        TransitionEvent {
            request_id: "r1".to_string(),
            request_title: "CRM rebuild".to_string(),
            lead_id: "l1".to_string(),
            op,
            from,
            to,
            actor_id: actor_id.to_string(),
            actor_name: "Actor".to_string(),
            actor_role: op.role(),
            created_by: created_by.to_string(),
            assigned_presale: assigned_presale.map(str::to_string),
            assigned_techlead: assigned_techlead.map(str::to_string),
            occurred_at: Utc::now(),
        }
    }

    async fn dispatcher(pool: &sqlx::SqlitePool) -> (Dispatcher, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(
            Arc::new(UserStorage::new(pool.clone())),
            Arc::new(NotificationStorage::new(pool.clone())),
            registry.clone(),
        );
        (dispatcher, registry)
    }

    #[tokio::test]
    async fn send_to_estimation_fans_out_to_every_techlead() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let tl1 = seed_user(&pool, "Tara Techlead", UserRole::TechLead).await;
        let tl2 = seed_user(&pool, "Tom Techlead", UserRole::TechLead).await;

        let (dispatcher, registry) = dispatcher(&pool).await;
        let (_guard, mut rx) = registry.register(&tl1.id);

        dispatcher
            .dispatch_transition(&event(
                TransitionOp::SendToEstimation,
                RequestStatus::Reviewing,
                RequestStatus::PendingEstimation,
                &presale.id,
                &sale.id,
                Some(&presale.id),
                None,
            ))
            .await;

        let storage = NotificationStorage::new(pool.clone());
        assert_eq!(storage.list_for_user(&tl1.id, true).await.unwrap().len(), 1);
        assert_eq!(storage.list_for_user(&tl2.id, true).await.unwrap().len(), 1);
        assert!(storage.list_for_user(&sale.id, true).await.unwrap().is_empty());
        assert!(storage.list_for_user(&presale.id, true).await.unwrap().is_empty());

        // The connected techlead also got a live push.
        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.entity_id, "r1");
        assert_eq!(pushed.kind, NotificationKind::StatusChange);
    }

    #[tokio::test]
    async fn approve_estimation_targets_the_assigned_presale_only() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let other_presale = seed_user(&pool, "Paula Presale", UserRole::PreSale).await;
        let techlead = seed_user(&pool, "Tara Techlead", UserRole::TechLead).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;
        dispatcher
            .dispatch_transition(&event(
                TransitionOp::ApproveEstimation,
                RequestStatus::PendingEstimation,
                RequestStatus::PreSaleReview,
                &techlead.id,
                &sale.id,
                Some(&presale.id),
                Some(&techlead.id),
            ))
            .await;

        let storage = NotificationStorage::new(pool.clone());
        assert_eq!(
            storage.list_for_user(&presale.id, true).await.unwrap().len(),
            1
        );
        assert!(storage
            .list_for_user(&other_presale.id, true)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn estimate_sent_back_targets_the_assigned_techlead_not_the_pool() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let tl1 = seed_user(&pool, "Tara Techlead", UserRole::TechLead).await;
        let tl2 = seed_user(&pool, "Tom Techlead", UserRole::TechLead).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;

        // The techlead who produced the estimate gets it back alone.
        dispatcher
            .dispatch_transition(&event(
                TransitionOp::PresaleRejectEstimate,
                RequestStatus::PreSaleReview,
                RequestStatus::PendingEstimation,
                &presale.id,
                &sale.id,
                Some(&presale.id),
                Some(&tl1.id),
            ))
            .await;

        let storage = NotificationStorage::new(pool.clone());
        assert_eq!(storage.count_unread(&tl1.id).await.unwrap(), 1);
        assert_eq!(storage.count_unread(&tl2.id).await.unwrap(), 0);

        // Without an assignee the whole techlead pool hears, as for a
        // first send-to-estimation.
        dispatcher
            .dispatch_transition(&event(
                TransitionOp::PresaleRejectEstimate,
                RequestStatus::PreSaleReview,
                RequestStatus::PendingEstimation,
                &presale.id,
                &sale.id,
                Some(&presale.id),
                None,
            ))
            .await;

        assert_eq!(storage.count_unread(&tl1.id).await.unwrap(), 2);
        assert_eq!(storage.count_unread(&tl2.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn broad_reject_notifies_participants_except_the_actor() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let techlead = seed_user(&pool, "Tara Techlead", UserRole::TechLead).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;
        dispatcher
            .dispatch_transition(&event(
                TransitionOp::Reject,
                RequestStatus::PendingEstimation,
                RequestStatus::Rejected,
                &sale.id,
                &sale.id,
                Some(&presale.id),
                Some(&techlead.id),
            ))
            .await;

        let storage = NotificationStorage::new(pool.clone());
        assert!(storage.list_for_user(&sale.id, true).await.unwrap().is_empty());
        assert_eq!(
            storage.list_for_user(&presale.id, true).await.unwrap().len(),
            1
        );
        assert_eq!(
            storage.list_for_user(&techlead.id, true).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn presale_reject_goes_back_to_the_creator() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;
        dispatcher
            .dispatch_transition(&event(
                TransitionOp::PresaleReject,
                RequestStatus::Reviewing,
                RequestStatus::Rejected,
                &presale.id,
                &sale.id,
                Some(&presale.id),
                None,
            ))
            .await;

        let storage = NotificationStorage::new(pool.clone());
        let for_sale = storage.list_for_user(&sale.id, true).await.unwrap();
        assert_eq!(for_sale.len(), 1);
        assert!(for_sale[0].message.contains("rejected"));
    }

    #[tokio::test]
    async fn mention_fans_out_mentions_and_comments_but_never_to_the_actor() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let techlead = seed_user(&pool, "Tara Techlead", UserRole::TechLead).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;
        dispatcher
            .dispatch_mention(&MentionEvent {
                mentioned: vec![techlead.id.clone(), presale.id.clone()],
                participants: vec![sale.id.clone(), presale.id.clone(), techlead.id.clone()],
                actor_id: presale.id.clone(),
                entity_type: "estimate".to_string(),
                entity_id: "e1".to_string(),
                message: "please double-check the integration phase".to_string(),
            })
            .await;

        let storage = NotificationStorage::new(pool.clone());
        let for_techlead = storage.list_for_user(&techlead.id, true).await.unwrap();
        assert_eq!(for_techlead.len(), 1);
        assert_eq!(for_techlead[0].kind, NotificationKind::Mention);

        let for_sale = storage.list_for_user(&sale.id, true).await.unwrap();
        assert_eq!(for_sale.len(), 1);
        assert_eq!(for_sale[0].kind, NotificationKind::Comment);

        // The actor mentioned themselves among others; they get nothing.
        assert!(storage.list_for_user(&presale.id, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawned_dispatcher_drains_the_channel() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;

        let (dispatcher, _registry) = dispatcher(&pool).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(dispatcher).spawn(rx);

        tx.send(event(
            TransitionOp::SendToReview,
            RequestStatus::New,
            RequestStatus::PendingReview,
            &sale.id,
            &sale.id,
            None,
            None,
        ))
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let storage = NotificationStorage::new(pool.clone());
        assert_eq!(
            storage.list_for_user(&presale.id, true).await.unwrap().len(),
            1
        );
    }
}
