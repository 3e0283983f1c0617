/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Verdict for a single link. Upstream vocabulary never leaks past this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Valid,
    Invalid,
    Unknown,
}

impl LinkStatus {
    /// Display rank: valid first, then invalid, then unknown.
    pub fn rank(self) -> u8 {
        match self {
            LinkStatus::Valid => 0,
            LinkStatus::Invalid => 1,
            LinkStatus::Unknown => 2,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            LinkStatus::Valid => "✅",
            LinkStatus::Invalid => "❌",
            LinkStatus::Unknown => "❔",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Valid => "valid",
            LinkStatus::Invalid => "invalid",
            LinkStatus::Unknown => "unknown",
        }
    }
}

/// Canonical per-link outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkResult {
    pub link: String,
    pub status: LinkStatus,
    pub reason: Option<String>,
}

impl LinkResult {
    pub fn unknown(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            status: LinkStatus::Unknown,
            reason: Some(reason.into()),
        }
    }
}
