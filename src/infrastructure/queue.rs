use std::collections::VecDeque;

/// Frames written while the connection was down, flushed FIFO on the next open
#[derive(Debug)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
        }
    }

    /// Appends a frame; when full the oldest frame is discarded
    pub fn push(&mut self, frame: String) {
        if self.capacity == 0 {
            tracing::warn!("Outbound queue disabled, dropping frame");
            return;
        }
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
            tracing::warn!(
                "Outbound queue full ({} frames), dropped the oldest frame",
                self.capacity
            );
        }
        self.frames.push_back(frame);
    }

    /// Hands frames to `transmit` head-to-tail until it refuses one.
    ///
    /// A refused frame and everything behind it stay queued. Returns the
    /// number of frames transmitted.
    pub fn drain_with<F>(&mut self, mut transmit: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut sent = 0;
        while let Some(frame) = self.frames.front() {
            if !transmit(frame) {
                break;
            }
            self.frames.pop_front();
            sent += 1;
        }
        sent
    }

    /// Puts frames a dead transport never wrote back at the head, in order.
    /// Over capacity, the oldest frames go first.
    pub fn requeue_front(&mut self, frames: Vec<String>) {
        for frame in frames.into_iter().rev() {
            self.frames.push_front(frame);
        }
        let overflow = self.frames.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.frames.drain(..overflow);
            tracing::warn!(
                "Outbound queue full ({} frames), dropped {} oldest frame(s)",
                self.capacity,
                overflow
            );
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(crate::types::MAX_OUTBOUND_QUEUE_SIZE)
    }
}
