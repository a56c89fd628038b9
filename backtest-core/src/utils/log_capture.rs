//! Per-scenario log capture (spec §6 `ProcessResult.log_buffer`).
//!
//! Grounded on the same `tracing`/`tracing-subscriber` stack
//! [`super::logger`] installs process-wide; this adds a second,
//! scenario-scoped subscriber the orchestrator activates with
//! `tracing::subscriber::with_default` around one scenario's run, so it
//! composes cleanly whether that scenario runs on the calling thread
//! (`run_sequential`) or inside a `crossbeam::thread::scope` worker
//! (`run_parallel`) — each thread installs and tears down its own
//! capture independently, no shared state between scenarios.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// A `tracing_subscriber::Layer` that formats every event it sees into
/// one line and appends it to a shared buffer.
pub struct CapturingLayer {
    buffer: Arc<Mutex<Vec<String>>>,
}

impl CapturingLayer {
    pub fn new(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for CapturingLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut line = format!("{} {}: {}", event.metadata().level(), event.metadata().target(), visitor.message);
        for field in &visitor.fields {
            line.push(' ');
            line.push_str(field);
        }
        self.buffer.lock().unwrap().push(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Runs `f` with a fresh `CapturingLayer` installed as this thread's
/// default subscriber, returning `f`'s result alongside every line the
/// layer captured during the call.
pub fn capture<F, T>(f: F) -> (T, Vec<String>)
where
    F: FnOnce() -> T,
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let layer = CapturingLayer::new(buffer.clone());
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    let lines = std::mem::take(&mut *buffer.lock().unwrap());
    (result, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_events_emitted_during_the_call() {
        let (value, lines) = capture(|| {
            tracing::info!(scenario = "s1", "scenario completed");
            42
        });
        assert_eq!(value, 42);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("scenario completed"));
        assert!(lines[0].contains("s1"));
    }

    #[test]
    fn capture_on_one_thread_does_not_see_another_threads_events() {
        let (_, lines) = capture(|| {
            tracing::info!("inside capture");
        });
        assert_eq!(lines.len(), 1);
    }
}
