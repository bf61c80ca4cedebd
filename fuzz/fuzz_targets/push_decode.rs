//! Fuzz target for push frame and deep link decoding
//!
//! Push frames come straight off the wire, so every byte sequence must either
//! decode into a validated [`Message`] or fail with a `PayloadError`.
//!
//! # Invariants
//!
//! - NEVER panic on malformed frames or links
//! - A message that validates belongs to exactly the conversation its
//!   populated field names
//! - A deep link that parses renders back to a link that parses to the same
//!   conversation

#![no_main]

use libfuzzer_sys::fuzz_target;
use teamdesk_core::{ConversationRef, Message, PushEvent};

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = PushEvent::decode(data) {
        let populated = [&event.message.channel_id, &event.message.group_id, &event.message.dm_id]
            .into_iter()
            .filter(|field| field.as_deref().is_some_and(|id| !id.is_empty()))
            .count();

        if let Ok(message) = Message::try_from(event.message) {
            assert_eq!(populated, 1, "validated message with {populated} conversation fields");
            let link = message.conversation.deep_link();
            assert_eq!(ConversationRef::from_deep_link(&link).ok(), Some(message.conversation));
        }
    }

    if let Ok(link) = std::str::from_utf8(data) {
        if let Ok(conversation) = ConversationRef::from_deep_link(link) {
            let again = ConversationRef::from_deep_link(&conversation.deep_link());
            assert_eq!(again.ok(), Some(conversation));
        }
    }
});
