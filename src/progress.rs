use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub message: String,
}

/// Progress of a single ingestion run. Events go to an optional channel and
/// to the log; percentages never move backwards. The default reporter only
/// logs.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<Progress>>,
    last: u8,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<Progress>) -> Self {
        Self { tx: Some(tx), last: 0 }
    }

    pub fn channel() -> (Self, UnboundedReceiver<Progress>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn report(&mut self, percent: u8, message: impl Into<String>) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        let message = message.into();
        tracing::debug!("[{percent}%] {message}");
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(Progress { percent, message });
        }
    }
}

/// Linear position of `done` out of `total` within `[from, to]`.
pub fn scale(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = (to.saturating_sub(from)) as usize;
    from + (span * done.min(total) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_is_monotonic() {
        let (mut reporter, mut rx) = ProgressReporter::channel();
        reporter.report(10, "a");
        reporter.report(5, "b");
        reporter.report(150, "c");
        let got: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok()).map(|p| p.percent).collect();
        assert_eq!(got, vec![10, 10, 100]);
        assert_eq!(reporter.last, 100);
    }

    #[test]
    fn test_reporter_survives_dropped_receiver() {
        let (mut reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.report(50, "nobody listening");
        assert_eq!(reporter.last, 50);
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale(5, 30, 0, 4), 5);
        assert_eq!(scale(5, 30, 2, 4), 17);
        assert_eq!(scale(5, 30, 4, 4), 30);
        assert_eq!(scale(80, 95, 1, 0), 95);
    }
}
