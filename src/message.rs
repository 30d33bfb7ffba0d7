use chrono::{DateTime, Local};
use std::collections::VecDeque;

const MAX_MESSAGES: usize = 50;
const MAX_MESSAGE_LEN: usize = 180;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
    pub at: DateTime<Local>,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Error, text)
    }

    fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: normalize_message_text(text.into()),
            at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: VecDeque<Message>,
}

impl MessageLog {
    pub fn push(&mut self, message: Message) {
        if self.entries.len() == MAX_MESSAGES {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn latest(&self) -> Option<&Message> {
        self.entries.back()
    }
}

fn single_line(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        "unknown error".to_string()
    } else {
        joined
    }
}

fn normalize_message_text(text: String) -> String {
    let line = if text.contains('\n') {
        single_line(&text)
    } else {
        text
    };
    if line.chars().count() <= MAX_MESSAGE_LEN {
        return line;
    }

    let mut shortened = line
        .chars()
        .take(MAX_MESSAGE_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{MAX_MESSAGES, Message, MessageLevel, MessageLog};

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let message = Message::info("x".repeat(400));
        assert_eq!(message.text.chars().count(), 180);
        assert!(message.text.ends_with('…'));
    }

    #[test]
    fn multiline_errors_fold_into_one_line() {
        let message = Message::error("\n  delete failed: forbidden\ncaused by: rbac");
        assert_eq!(message.level, MessageLevel::Error);
        assert_eq!(message.text, "delete failed: forbidden; caused by: rbac");
    }

    #[test]
    fn log_keeps_newest_entries() {
        let mut log = MessageLog::default();
        for index in 0..(MAX_MESSAGES + 5) {
            log.push(Message::info(format!("m{index}")));
        }

        assert_eq!(log.entries.len(), MAX_MESSAGES);
        assert_eq!(log.latest().map(|m| m.text.as_str()), Some("m54"));
        assert_eq!(log.entries.front().map(|m| m.text.as_str()), Some("m5"));
    }
}
