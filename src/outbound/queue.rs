use super::OutboundEnvelope;
use crate::types::{MAX_QUEUE_SIZE, RealtimeError, Result};
use std::collections::VecDeque;

/// Bounded FIFO of envelopes waiting for a connection.
///
/// A full queue rejects new entries instead of evicting old ones.
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<OutboundEnvelope>,
    max_size: usize,
    next_seq: u64,
}

impl OutboundQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, mut envelope: OutboundEnvelope) -> Result<()> {
        if self.entries.len() >= self.max_size {
            return Err(RealtimeError::QueueFull(self.max_size));
        }
        self.next_seq += 1;
        envelope.seq = self.next_seq;
        self.entries.push_back(envelope);
        Ok(())
    }

    /// Head of the queue, left in place until it is confirmed written
    pub fn front(&self) -> Option<&OutboundEnvelope> {
        self.entries.front()
    }

    /// Remove the head, but only if it is still the envelope with `seq`
    pub fn remove_front(&mut self, seq: u64) -> Option<OutboundEnvelope> {
        match self.entries.front() {
            Some(head) if head.seq == seq => self.entries.pop_front(),
            _ => None,
        }
    }

    /// Drop everything, returning how many envelopes were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(MAX_QUEUE_SIZE)
    }
}
