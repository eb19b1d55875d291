//! Channel-backed progress handler
//!
//! Lets a caller observe a run step by step from another task.

use super::{ProgressEvent, ProgressHandler};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressHandler for ChannelHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.sender.send(event.clone());
    }
}
