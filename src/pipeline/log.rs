// ABOUTME: Build output stream: live broadcast to subscribers plus a bounded retained tail.
// ABOUTME: Late subscribers see only new lines; the tail is what status reports show.

use crate::runtime::LogSink;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::broadcast;

/// Lines a slow subscriber may fall behind before it starts missing output.
const CHANNEL_CAPACITY: usize = 256;

pub struct BuildLog {
    sender: broadcast::Sender<String>,
    tail: Mutex<VecDeque<String>>,
    tail_lines: usize,
}

impl BuildLog {
    pub fn new(tail_lines: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            tail: Mutex::new(VecDeque::with_capacity(tail_lines)),
            tail_lines: tail_lines.max(1),
        }
    }

    pub fn append(&self, line: &str) {
        {
            let mut tail = self.tail.lock();
            if tail.len() == self.tail_lines {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
        // No subscribers is fine.
        let _ = self.sender.send(line.to_string());
    }

    /// Receive every line appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// The most recent lines, oldest first.
    pub fn tail(&self) -> Vec<String> {
        self.tail.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.tail.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl LogSink for BuildLog {
    fn write_line(&self, line: &str) {
        self.append(line);
    }
}
