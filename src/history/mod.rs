//! Bounded log of recent chat messages replayed to late joiners.

use crate::protocol::ChatMessage;
use std::collections::VecDeque;

/// Number of messages kept when no capacity is configured
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// FIFO buffer of the most recent messages, oldest first
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends `message`, evicting the oldest entries beyond capacity
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Owned copy of the current contents in insertion order
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Color;

    fn message(n: usize) -> ChatMessage {
        ChatMessage {
            time: n as i64,
            text: format!("message {n}"),
            author: "tester".to_string(),
            color: Color::from("red"),
        }
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut history = HistoryBuffer::default();
        for n in 0..3 {
            history.append(message(n));
        }
        let texts: Vec<_> = history.snapshot().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["message 0", "message 1", "message 2"]);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut history = HistoryBuffer::default();
        for n in 0..101 {
            history.append(message(n));
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(snapshot.first().unwrap().text, "message 1");
        assert_eq!(snapshot.last().unwrap().text, "message 100");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut history = HistoryBuffer::new(2);
        history.append(message(0));
        let snapshot = history.snapshot();
        history.append(message(1));
        history.append(message(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "message 0");
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut history = HistoryBuffer::new(0);
        history.append(message(0));
        assert!(history.is_empty());
    }
}
