//! In-memory accumulation of accepted samples between flushes.

use crate::db::models::LightSample;

/// Append-only buffer; insertion order is acceptance order. Unbounded;
/// the flush period governs growth.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    items: Vec<LightSample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: LightSample) {
        self.items.push(sample);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Atomically empty the buffer, returning its prior contents.
    pub fn drain(&mut self) -> Vec<LightSample> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64) -> LightSample {
        LightSample {
            id: None,
            device_id: "test-device".into(),
            label: String::new(),
            timestamp,
            event_timestamp: timestamp * 1_000_000,
            light: 1.0,
            accuracy: -1,
        }
    }

    #[test]
    fn drain_returns_samples_in_append_order_and_empties() {
        let mut buffer = SampleBuffer::new();
        buffer.push(sample(1));
        buffer.push(sample(2));
        buffer.push(sample(3));

        let drained = buffer.drain();
        let timestamps: Vec<i64> = drained.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_only_returns_samples_since_the_last_drain() {
        let mut buffer = SampleBuffer::new();
        buffer.push(sample(1));
        let _ = buffer.drain();

        buffer.push(sample(2));
        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].timestamp, 2);
    }

    #[test]
    fn drain_on_empty_buffer_yields_nothing() {
        let mut buffer = SampleBuffer::new();
        assert!(buffer.drain().is_empty());
    }
}
