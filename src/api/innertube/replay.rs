//! Response types for `youtubei/v1/live_chat/get_live_chat_replay`.
//!
//! Only the fields needed to build [`ChatEvent`]s are modelled; everything
//! else in the payload is ignored, and unknown chat items decode to
//! [`ChatItem::Unknown`].

use crate::api::youtube::Continuation;
use crate::models::ChatEvent;
use serde::Deserialize;

/// Response from the live chat replay endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetLiveChatReplayResponse {
    #[serde(rename = "continuationContents", default)]
    pub continuation_contents: Option<ContinuationContents>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContinuationContents {
    #[serde(rename = "liveChatContinuation", default)]
    pub live_chat_continuation: LiveChatContinuation,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveChatContinuation {
    #[serde(default)]
    pub actions: Vec<ReplayAction>,
    /// Continuation data for the next page
    #[serde(default)]
    pub continuations: Vec<serde_json::Value>,
}

/// One entry of the replay `actions` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayAction {
    #[serde(rename = "replayChatItemAction", default)]
    pub replay_chat_item_action: Option<ReplayChatItemAction>,
}

/// Chat actions replayed at a given offset into the video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayChatItemAction {
    #[serde(default)]
    pub actions: Vec<ChatItemAction>,
    /// Milliseconds from the start of the video, sent as a string
    #[serde(rename = "videoOffsetTimeMsec", default)]
    pub video_offset_time_msec: Option<String>,
}

impl ReplayChatItemAction {
    pub fn offset_seconds(&self) -> Option<f64> {
        self.video_offset_time_msec
            .as_deref()
            .and_then(|ms| ms.trim().parse::<f64>().ok())
            .map(|ms| ms / 1000.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatItemAction {
    #[serde(rename = "addChatItemAction", default)]
    pub add_chat_item_action: Option<AddChatItemAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddChatItemAction {
    pub item: ChatItem,
}

/// Chat item kinds that carry a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatItem {
    /// Regular text message
    TextMessage {
        #[serde(rename = "liveChatTextMessageRenderer")]
        renderer: MessageRenderer,
    },
    /// Super Chat
    PaidMessage {
        #[serde(rename = "liveChatPaidMessageRenderer")]
        renderer: MessageRenderer,
    },
    /// Anything else (memberships, stickers, engagement messages ...)
    Unknown(serde_json::Value),
}

impl ChatItem {
    pub fn renderer(&self) -> Option<&MessageRenderer> {
        match self {
            ChatItem::TextMessage { renderer } | ChatItem::PaidMessage { renderer } => {
                Some(renderer)
            }
            ChatItem::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageRenderer {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(rename = "authorBadges", default)]
    pub author_badges: Vec<serde_json::Value>,
}

impl MessageRenderer {
    pub fn text(&self) -> String {
        self.message
            .as_ref()
            .map(|message| message.runs.iter().map(MessageRun::render).collect())
            .unwrap_or_default()
    }

    /// Members, moderators and verified authors all carry at least one badge.
    pub fn has_badge(&self) -> bool {
        !self.author_badges.is_empty()
    }
}

/// A message made of text and emoji runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub runs: Vec<MessageRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageRun {
    pub text: Option<String>,
    pub emoji: Option<Emoji>,
}

impl MessageRun {
    /// Text as-is; emoji as their first shortcut, else their id.
    pub fn render(&self) -> &str {
        if let Some(text) = self.text.as_deref() {
            return text;
        }
        match &self.emoji {
            Some(emoji) => emoji
                .shortcuts
                .first()
                .map(String::as_str)
                .unwrap_or(emoji.emoji_id.as_str()),
            None => "",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Emoji {
    #[serde(rename = "emojiId", default)]
    pub emoji_id: String,
    #[serde(default)]
    pub shortcuts: Vec<String>,
}

impl GetLiveChatReplayResponse {
    fn continuation(&self) -> Option<&LiveChatContinuation> {
        self.continuation_contents
            .as_ref()
            .map(|contents| &contents.live_chat_continuation)
    }

    /// Chat events of this page in payload order.
    ///
    /// Actions without an offset are skipped.
    pub fn events(&self) -> Vec<ChatEvent> {
        let Some(continuation) = self.continuation() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for replay in continuation
            .actions
            .iter()
            .filter_map(|action| action.replay_chat_item_action.as_ref())
        {
            let Some(offset) = replay.offset_seconds() else {
                continue;
            };
            for renderer in replay
                .actions
                .iter()
                .filter_map(|action| action.add_chat_item_action.as_ref())
                .filter_map(|add| add.item.renderer())
            {
                events.push(ChatEvent::new(offset, renderer.text(), renderer.has_badge()));
            }
        }
        events
    }

    /// Token for the next replay page.
    ///
    /// `playerSeekContinuationData` marks the end of the replay and yields
    /// `None`.
    pub fn next_continuation(&self) -> Option<Continuation> {
        self.continuation()?
            .continuations
            .first()
            .and_then(|v| v.get("liveChatReplayContinuationData"))
            .and_then(|v| v.get("continuation"))
            .and_then(|v| v.as_str())
            .map(|s| Continuation(s.to_string()))
    }
}
