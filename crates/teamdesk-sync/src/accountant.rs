//! Unread counters and notification decisions.
//!
//! The [`Accountant`] exclusively owns the sidebar summaries and their unread
//! counters. It is fed from two directions:
//!
//! - Event Intake hands it every push event for a conversation that is not
//!   open ([`Accountant::record_foreign_event`]).
//! - The background poll hands it fresh summaries
//!   ([`Accountant::apply_summaries`]), which are compared against the
//!   previous ones to catch events the push channel missed.
//!
//! The open conversation never accrues unread messages and never notifies.

use std::{collections::BTreeMap, time::Duration};

use teamdesk_core::{ConversationKind, ConversationRef, ConversationSummary, LocalUser, Message};

use crate::{Notification, ledger::NotificationLedger};

/// Body used when a message has attachments but no text.
const ATTACHMENT_BODY: &str = "sent an attachment";

/// Body used when a message has neither text nor attachments.
const FALLBACK_BODY: &str = "new activity";

/// Maximum preview length, in characters.
const PREVIEW_CHARS: usize = 80;

/// Unread/notification accountant.
#[derive(Debug, Clone)]
pub struct Accountant<I> {
    local_user: LocalUser,
    summaries: BTreeMap<ConversationRef, ConversationSummary>,
    open: Option<ConversationRef>,
    ledger: NotificationLedger<I>,
}

impl<I> Accountant<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Create an accountant with no summaries.
    ///
    /// Notifications raised from push events are remembered for
    /// `dedup_ttl` so the background pass does not repeat them.
    pub fn new(local_user: LocalUser, dedup_ttl: Duration) -> Self {
        Self {
            local_user,
            summaries: BTreeMap::new(),
            open: None,
            ledger: NotificationLedger::new(dedup_ttl),
        }
    }

    /// Count a push event for a conversation that is not open.
    ///
    /// Returns the notification to raise, or `None` when the event is
    /// self-authored, its conversation is open, or it was already counted
    /// within the ledger TTL.
    pub fn record_foreign_event(&mut self, message: &Message, now: I) -> Option<Notification> {
        if message.is_authored_by(&self.local_user.id) {
            self.record_own_activity(message);
            return None;
        }
        if self.open.as_ref() == Some(&message.conversation) {
            return None;
        }
        if self.ledger.contains(&message.conversation, &message.id, now) {
            tracing::debug!(id = %message.id, "push event redelivered, already counted");
            return None;
        }

        let summary = self
            .summaries
            .entry(message.conversation.clone())
            .or_insert_with(|| provisional_summary(message));
        summary.unread_count = summary.unread_count.saturating_add(1);
        summary.last_message_preview = Some(preview(message));
        summary.last_seen = Some(message.id.clone());

        let notification = Notification {
            conversation: message.conversation.clone(),
            title: event_title(message, &summary.display_name),
            body: event_body(message),
            deep_link: message.conversation.deep_link(),
        };

        self.ledger.record(message.conversation.clone(), message.id.clone(), now);
        Some(notification)
    }

    /// Own messages never count as unread and never notify.
    pub fn record_own_activity(&mut self, message: &Message) {
        tracing::trace!(id = %message.id, conversation = %message.conversation, "own activity");
    }

    /// `conversation` became the open conversation.
    ///
    /// Returns `true` if its unread count changed.
    pub fn reset_on_open(&mut self, conversation: &ConversationRef) -> bool {
        self.open = Some(conversation.clone());
        match self.summaries.get_mut(conversation) {
            Some(summary) if summary.unread_count > 0 => {
                summary.unread_count = 0;
                true
            },
            _ => false,
        }
    }

    /// No conversation is open any more.
    pub fn clear_open(&mut self) {
        self.open = None;
    }

    /// Replace the summaries wholesale with a fresh fetch.
    ///
    /// For every conversation that is not open and whose fresh unread count
    /// is strictly greater than the previously observed one, one summarizing
    /// notification is returned, unless the latest message was already
    /// notified from a push event. Conversations seen for the first time
    /// have no baseline and never notify.
    pub fn apply_summaries(
        &mut self,
        fresh: Vec<ConversationSummary>,
        now: I,
    ) -> Vec<Notification> {
        self.ledger.prune(now);
        let mut notifications = Vec::new();
        let mut next = BTreeMap::new();

        for mut summary in fresh {
            let conversation = summary.conversation.clone();
            let previous = self.summaries.get(&conversation).map(|s| s.unread_count);

            if self.open.as_ref() == Some(&conversation) {
                summary.unread_count = 0;
            } else if let Some(previous) = previous.filter(|prev| summary.unread_count > *prev) {
                let delta = summary.unread_count - previous;
                let already_notified = summary
                    .last_seen
                    .as_ref()
                    .is_some_and(|id| self.ledger.contains(&conversation, id, now));

                if already_notified {
                    tracing::debug!(%conversation, delta, "delta already notified from push");
                } else {
                    notifications.push(delta_notification(&summary, delta));
                }
            }

            next.insert(conversation, summary);
        }

        self.summaries = next;
        notifications
    }

    /// Forget all summaries and notification history (sign-out).
    pub fn reset(&mut self) {
        self.summaries.clear();
        self.open = None;
        self.ledger.clear();
    }

    /// Unread count of `conversation` (0 if unknown).
    pub fn unread_count(&self, conversation: &ConversationRef) -> u32 {
        self.summaries.get(conversation).map_or(0, |summary| summary.unread_count)
    }

    /// Sum of all unread counts.
    pub fn total_unread(&self) -> u32 {
        self.summaries.values().fold(0u32, |sum, summary| sum.saturating_add(summary.unread_count))
    }

    /// Summary of `conversation`, if listed.
    pub fn summary(&self, conversation: &ConversationRef) -> Option<&ConversationSummary> {
        self.summaries.get(conversation)
    }

    /// All summaries, ordered by kind then id.
    pub fn summaries(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.summaries.values()
    }

    /// Conversation currently open, as seen by the accountant.
    pub fn open_conversation(&self) -> Option<&ConversationRef> {
        self.open.as_ref()
    }
}

fn provisional_summary(message: &Message) -> ConversationSummary {
    let display_name = match message.conversation.kind {
        ConversationKind::Dm => message.sender_name.clone(),
        ConversationKind::Channel | ConversationKind::Group => message.conversation.id.clone(),
    };
    ConversationSummary::new(message.conversation.clone(), display_name)
}

fn event_title(message: &Message, conversation_name: &str) -> String {
    match message.conversation.kind {
        ConversationKind::Channel => format!("{} in #{conversation_name}", message.sender_name),
        ConversationKind::Group => format!("{} in {conversation_name}", message.sender_name),
        ConversationKind::Dm => message.sender_name.clone(),
    }
}

fn event_body(message: &Message) -> String {
    match message.content.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ if !message.attachments.is_empty() => ATTACHMENT_BODY.to_string(),
        _ => FALLBACK_BODY.to_string(),
    }
}

fn preview(message: &Message) -> String {
    event_body(message).chars().take(PREVIEW_CHARS).collect()
}

fn delta_notification(summary: &ConversationSummary, delta: u32) -> Notification {
    let body = if delta == 1 {
        "1 new message".to_string()
    } else {
        format!("{delta} new messages")
    };
    Notification {
        conversation: summary.conversation.clone(),
        title: summary.display_name.clone(),
        body,
        deep_link: summary.conversation.deep_link(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use teamdesk_core::{Attachment, MessageId, UserId};

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn accountant() -> Accountant<Duration> {
        Accountant::new(LocalUser::new("me", "Grace"), TTL)
    }

    fn event(conversation: ConversationRef, id: &str, sender: &str, content: Option<&str>) -> Message {
        Message {
            id: MessageId::from(id),
            conversation,
            sender_id: UserId::from(sender),
            sender_name: "Ada".into(),
            content: content.map(str::to_string),
            attachments: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            edited_at: None,
            deleted: false,
            reply_to: None,
            read_by: Default::default(),
        }
    }

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn foreign_event_increments_and_notifies() {
        let mut accountant = accountant();
        let general = ConversationRef::channel("general");
        accountant.apply_summaries(vec![ConversationSummary::new(general.clone(), "general")], at(0));

        let notification = accountant
            .record_foreign_event(&event(general.clone(), "m1", "u2", Some("lunch?")), at(1))
            .unwrap();

        assert_eq!(accountant.unread_count(&general), 1);
        assert_eq!(notification.title, "Ada in #general");
        assert_eq!(notification.body, "lunch?");
        assert_eq!(notification.deep_link, "type=channel&id=general");
    }

    #[test]
    fn redelivered_push_counts_once() {
        let mut accountant = accountant();
        let dm = ConversationRef::dm("d1");
        let message = event(dm.clone(), "m1", "ada", Some("hi"));

        assert!(accountant.record_foreign_event(&message, at(1)).is_some());
        assert!(accountant.record_foreign_event(&message, at(2)).is_none());
        assert_eq!(accountant.unread_count(&dm), 1);
    }

    #[test]
    fn own_messages_are_silent() {
        let mut accountant = accountant();
        let general = ConversationRef::channel("general");

        let notification =
            accountant.record_foreign_event(&event(general.clone(), "m1", "me", Some("hi")), at(1));

        assert_eq!(notification, None);
        assert_eq!(accountant.total_unread(), 0);
    }

    #[test]
    fn open_conversation_is_silent_and_reset_on_open() {
        let mut accountant = accountant();
        let a = ConversationRef::group("a");
        let b = ConversationRef::group("b");

        accountant.record_foreign_event(&event(a.clone(), "m1", "u2", Some("x")), at(1));
        accountant.reset_on_open(&b);
        assert_eq!(accountant.record_foreign_event(&event(b.clone(), "m2", "u2", None), at(2)), None);
        accountant.record_foreign_event(&event(a.clone(), "m3", "u2", Some("y")), at(3));

        assert_eq!(accountant.unread_count(&a), 2);
        assert_eq!(accountant.unread_count(&b), 0);

        assert!(accountant.reset_on_open(&a));
        assert_eq!(accountant.unread_count(&a), 0);
        assert!(!accountant.reset_on_open(&a));
    }

    #[test]
    fn bodies_fall_back_for_attachments_and_empty_messages() {
        let mut accountant = accountant();
        let dm = ConversationRef::dm("d1");
        let mut with_file = event(dm.clone(), "m1", "u2", Some("  "));
        with_file.attachments.push(Attachment {
            name: "plan.pdf".into(),
            url: "https://files.example/plan.pdf".into(),
            mime: None,
        });

        let first = accountant.record_foreign_event(&with_file, at(1)).unwrap();
        let second = accountant.record_foreign_event(&event(dm, "m2", "u2", None), at(2)).unwrap();

        assert_eq!(first.title, "Ada");
        assert_eq!(first.body, "sent an attachment");
        assert_eq!(second.body, "new activity");
    }

    #[test]
    fn delta_pass_notifies_once_for_missed_events() {
        let mut accountant = accountant();
        let group = ConversationRef::group("ops");
        let base = ConversationSummary::new(group.clone(), "Ops").with_unread(1);
        assert!(accountant.apply_summaries(vec![base.clone()], at(0)).is_empty());

        let grown = base.clone().with_unread(4).with_last_seen(MessageId::from("m9"));
        let notifications = accountant.apply_summaries(vec![grown.clone()], at(30));

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Ops");
        assert_eq!(notifications[0].body, "3 new messages");
        assert_eq!(accountant.unread_count(&group), 4);

        // Same counts again: nothing new.
        assert!(accountant.apply_summaries(vec![grown], at(60)).is_empty());
    }

    #[test]
    fn delta_pass_skips_messages_already_notified_by_push() {
        let mut accountant = accountant();
        let group = ConversationRef::group("ops");
        accountant.apply_summaries(vec![ConversationSummary::new(group.clone(), "Ops")], at(0));
        accountant.record_foreign_event(&event(group.clone(), "m1", "u2", Some("hi")), at(5));

        let fresh = ConversationSummary::new(group.clone(), "Ops")
            .with_unread(2)
            .with_last_seen(MessageId::from("m1"));
        // Local count is 1 after the push; fresh 2 is a delta but m1 was notified.
        assert!(accountant.apply_summaries(vec![fresh.clone()], at(10)).is_empty());

        // Once the ledger entry expires the delta pass speaks up again.
        let later = fresh.with_unread(3);
        assert_eq!(accountant.apply_summaries(vec![later], at(100)).len(), 1);
    }

    #[test]
    fn first_listing_and_open_conversation_never_notify() {
        let mut accountant = accountant();
        let open = ConversationRef::channel("general");
        accountant.reset_on_open(&open);

        let fresh = vec![
            ConversationSummary::new(ConversationRef::dm("d1"), "Ada").with_unread(7),
            ConversationSummary::new(open.clone(), "general").with_unread(2),
        ];
        assert!(accountant.apply_summaries(fresh.clone(), at(0)).is_empty());
        assert!(accountant.apply_summaries(fresh, at(1)).is_empty());
        assert_eq!(accountant.unread_count(&open), 0);
        assert_eq!(accountant.total_unread(), 7);
    }

    #[test]
    fn replacement_is_wholesale() {
        let mut accountant = accountant();
        accountant.record_foreign_event(
            &event(ConversationRef::dm("ghost"), "m1", "u2", Some("boo")),
            at(0),
        );
        accountant.apply_summaries(
            vec![ConversationSummary::new(ConversationRef::channel("general"), "general")],
            at(1),
        );

        let listed: Vec<_> = accountant.summaries().map(|s| s.conversation.id.as_str()).collect();
        assert_eq!(listed, ["general"]);
    }
}
