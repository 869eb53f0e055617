//! C12: Progress / Event Bus (spec §4.12). Synchronous in-process pub/sub;
//! handler panics are caught, counted, and never propagated to the
//! publisher.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use webchunk_common::types::{CrawlResult, ExtractedContent, ProcessingProgress, WebContentChunk};

#[derive(Clone, Debug)]
pub enum ProcessingEvent {
    CrawlStarted { job_id: String, start_url: String },
    PageFetched { job_id: String, result: Box<CrawlResult> },
    ExtractionCompleted { job_id: String, content: Box<ExtractedContent> },
    ChunkingCompleted { job_id: String, source_url: String, chunk_count: usize },
    ProcessingProgress { job_id: String, progress: Box<ProcessingProgress> },
    ProcessingError { job_id: String, source_url: Option<String>, message: String },
    ProcessingCompleted { job_id: String, total_chunks: usize },
}

type Handler = Box<dyn Fn(&ProcessingEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

/// An unsubscribe token; dropping it does NOT unsubscribe (spec calls for
/// an explicit handle), call [`EventBus::unsubscribe`] with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    handler_failures: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ProcessingEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().push(Subscriber { id, handler: Box::new(handler) });
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.lock().unwrap().retain(|s| s.id != handle.0);
    }

    pub fn publish(&self, event: ProcessingEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(&event)));
            if result.is_err() {
                self.handler_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(subscriber_id = subscriber.id, "event handler panicked");
            }
        }
    }

    pub fn handler_failure_count(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn publish_invokes_all_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        bus.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(ProcessingEvent::CrawlStarted { job_id: "j1".to_string(), start_url: "https://x".to_string() });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(handle);
        bus.publish(ProcessingEvent::CrawlStarted { job_id: "j1".to_string(), start_url: "https://x".to_string() });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_is_caught_and_counted() {
        let bus = EventBus::new();
        bus.subscribe(|_| panic!("boom"));
        bus.publish(ProcessingEvent::CrawlStarted { job_id: "j1".to_string(), start_url: "https://x".to_string() });
        assert_eq!(bus.handler_failure_count(), 1);
    }
}
