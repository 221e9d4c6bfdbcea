use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Ordered build log sink
///
/// Every line is accumulated and, when a channel is attached, forwarded to
/// it. Forwarding never blocks; a dropped receiver only stops forwarding.
#[derive(Debug, Clone, Default)]
pub struct LogStream {
    sender: Option<mpsc::UnboundedSender<String>>,
    buffer: Arc<Mutex<Vec<String>>>,
}

impl LogStream {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            sender: Some(sender),
            buffer: Arc::default(),
        }
    }

    /// Stream plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Stream that only accumulates
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn send(&self, line: impl Into<String>) {
        let line = line.into();
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(line.clone());
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// All lines so far, newline separated
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }

    /// The last `n` lines, newline separated
    pub fn tail(&self, n: usize) -> String {
        let lines = self.lines();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}
