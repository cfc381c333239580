use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Snapshot of index build progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    /// Chunks processed so far
    pub processed: usize,
    /// Chunks to process in total
    pub total: usize,
    /// Time since the build started
    pub elapsed: Duration,
    /// Estimated time until the build finishes, never negative
    pub estimated_remaining: Duration,
}

impl ProgressState {
    /// Estimate the remaining time from the average time per processed chunk
    pub fn compute(processed: usize, total: usize, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let time_per_item = elapsed_secs / processed.max(1) as f64;
        let remaining = (time_per_item * total as f64 - elapsed_secs).max(0.0);

        Self {
            processed,
            total,
            elapsed,
            estimated_remaining: Duration::from_secs_f64(remaining),
        }
    }

    /// Completed share of the build, 0.0 to 1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} chunks, {:.2}s remaining",
            self.processed,
            self.total,
            self.estimated_remaining.as_secs_f64()
        )
    }
}

/// Tracks chunk processing during a build and publishes a [`ProgressState`]
/// after every chunk
pub struct ProgressReporter {
    started: Instant,
    processed: usize,
    total: usize,
    sender: Option<UnboundedSender<ProgressState>>,
}

impl ProgressReporter {
    pub fn new(total: usize, sender: Option<UnboundedSender<ProgressState>>) -> Self {
        Self {
            started: Instant::now(),
            processed: 0,
            total,
            sender,
        }
    }

    /// Record one processed chunk
    pub fn chunk_done(&mut self) -> ProgressState {
        self.processed += 1;
        let state = ProgressState::compute(self.processed, self.total, self.started.elapsed());

        tracing::debug!("Index build progress: {}", state);

        if let Some(sender) = &self.sender {
            // The receiver may have been dropped; the build carries on regardless
            let _ = sender.send(state);
        }

        state
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_estimate_halfway() {
        let state = ProgressState::compute(5, 10, Duration::from_secs(10));
        assert_eq!(state.estimated_remaining, Duration::from_secs(10));
        assert_eq!(state.fraction(), 0.5);
        assert!(!state.is_complete());
    }

    #[test]
    fn test_estimate_complete_is_zero() {
        let state = ProgressState::compute(10, 10, Duration::from_secs(7));
        assert_eq!(state.estimated_remaining, Duration::ZERO);
        assert!(state.is_complete());
    }

    #[test]
    fn test_estimate_never_negative() {
        // More processed than expected must clamp rather than go negative
        let state = ProgressState::compute(12, 10, Duration::from_secs(6));
        assert_eq!(state.estimated_remaining, Duration::ZERO);
        assert_eq!(state.fraction(), 1.0);
    }

    #[test]
    fn test_estimate_nothing_processed() {
        let state = ProgressState::compute(0, 10, Duration::from_secs(2));
        assert_eq!(state.estimated_remaining, Duration::from_secs(18));
    }

    #[test]
    fn test_empty_build_fraction() {
        let state = ProgressState::compute(0, 0, Duration::ZERO);
        assert_eq!(state.fraction(), 1.0);
    }

    #[test]
    fn test_display() {
        let state = ProgressState::compute(5, 10, Duration::from_secs(10));
        assert_eq!(state.to_string(), "5/10 chunks, 10.00s remaining");
    }

    #[test]
    fn test_reporter_publishes_every_chunk() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reporter = ProgressReporter::new(3, Some(tx));

        for _ in 0..3 {
            reporter.chunk_done();
        }
        drop(reporter);

        let mut seen = Vec::new();
        while let Ok(state) = rx.try_recv() {
            seen.push(state.processed);
            assert_eq!(state.total, 3);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_reporter_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut reporter = ProgressReporter::new(1, Some(tx));
        assert_eq!(reporter.chunk_done().processed, 1);
        assert_eq!(reporter.processed(), 1);
    }
}
