//! Scripted [`Transport`] for exercising the protocol engine without a
//! sensor attached.
//!
//! Replies are queued ahead of time and handed out one per
//! [`Transport::receive_line`] call, regardless of what was sent. Every
//! `send` is recorded so tests can check the exact wire bytes.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::Transport;
use crate::protocol::{Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Line(String),
    // arrived before the next send, so that send throws it away
    Stale(String),
    Timeout,
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{}\r\n", line)
    }
}

#[derive(Debug, Default)]
pub struct MockTransport {
    replies: VecDeque<Reply>,
    sent: Vec<String>,
    fail_sends: usize,
    lines_read: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply line; a missing CRLF terminator is added.
    pub fn push_line(&mut self, line: &str) -> &mut Self {
        self.replies.push_back(Reply::Line(terminated(line)));
        self
    }

    /// Queues a line that is already waiting in the input buffer when the
    /// next command goes out, like a reply that came in after a timeout.
    pub fn push_stale_line(&mut self, line: &str) -> &mut Self {
        self.replies.push_back(Reply::Stale(terminated(line)));
        self
    }

    /// Queues a `receive_line` call that runs into its deadline.
    pub fn push_timeout(&mut self) -> &mut Self {
        self.replies.push_back(Reply::Timeout);
        self
    }

    /// Makes the next `count` sends fail with a transport error.
    pub fn fail_sends(&mut self, count: usize) -> &mut Self {
        self.fail_sends = count;
        self
    }

    /// Everything successfully sent so far, one entry per `send`.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.sent.last().map(String::as_str)
    }

    /// Number of `receive_line` calls served so far, timeouts included.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    pub fn reset_counters(&mut self) {
        self.sent.clear();
        self.lines_read = 0;
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock send failure",
            )));
        }

        while let Some(Reply::Stale(_)) = self.replies.front() {
            self.replies.pop_front();
        }

        self.sent.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn receive_line(&mut self, _timeout: Duration) -> Result<String> {
        self.lines_read += 1;
        match self.replies.pop_front() {
            Some(Reply::Line(line)) | Some(Reply::Stale(line)) => Ok(line),
            Some(Reply::Timeout) | None => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_in_order() {
        let mut mock = MockTransport::new();
        mock.push_line("T 01257").push_timeout().push_line("H 00627\r\n");

        mock.send(b"T\r\n").unwrap();
        assert_eq!(mock.receive_line(Duration::ZERO).unwrap(), "T 01257\r\n");
        assert!(matches!(mock.receive_line(Duration::ZERO), Err(Error::Timeout)));
        assert_eq!(mock.receive_line(Duration::ZERO).unwrap(), "H 00627\r\n");
        assert!(matches!(mock.receive_line(Duration::ZERO), Err(Error::Timeout)));

        assert_eq!(mock.sent(), &["T\r\n".to_string()]);
        assert_eq!(mock.lines_read(), 4);
    }

    #[test]
    fn send_drops_stale_lines() {
        let mut mock = MockTransport::new();
        mock.push_stale_line("K 0")
            .push_stale_line("Z 00432")
            .push_line("T 01257");

        mock.send(b"T\r\n").unwrap();
        assert_eq!(mock.remaining(), 1);
        assert_eq!(mock.receive_line(Duration::ZERO).unwrap(), "T 01257\r\n");
    }

    #[test]
    fn stale_lines_are_readable_before_send() {
        let mut mock = MockTransport::new();
        mock.push_stale_line(" Z 00432");
        assert_eq!(mock.receive_line(Duration::ZERO).unwrap(), " Z 00432\r\n");
    }

    #[test]
    fn send_failure() {
        let mut mock = MockTransport::new();
        mock.fail_sends(1);

        assert!(matches!(mock.send(b"Y\r\n"), Err(Error::Transport(_))));
        assert!(mock.send(b"Y\r\n").is_ok());
        assert_eq!(mock.sent().len(), 1);
    }
}
