//! Spans and events emitted with the `tracing` feature.

#![cfg(feature = "tracing")]

use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use stm_gc::tracing::internal::next_gc_id;
use stm_gc::{GcConfig, ObjRef, ObjectLayout, StmGc, ThreadGc, ThreadRole, TypeRegistry};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

#[derive(Clone, Copy, ObjectLayout)]
#[repr(C)]
struct Node {
    value: u64,
    #[gc(strong)]
    next: Option<ObjRef>,
}

/// Records span names and event fields as flat strings.
#[derive(Clone, Default)]
struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
}

struct Fields(String);

impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, " {}={value:?}", field.name());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        let _ = write!(self.0, " {}={value}", field.name());
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut fields = Fields(format!("span {}", attrs.metadata().name()));
        attrs.record(&mut fields);
        self.lines.lock().unwrap().push(fields.0);
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields("event".to_owned());
        event.record(&mut fields);
        self.lines.lock().unwrap().push(fields.0);
    }
}

impl Recorder {
    fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

fn run_transaction() {
    let mut types = TypeRegistry::new();
    types.register::<Node>();
    let gc = StmGc::new(GcConfig::default().with_nursery_size(16 * 1024), types).unwrap();
    let mut thread = ThreadGc::new(gc, ThreadRole::Worker).unwrap();
    thread.start_transaction();
    let node = thread.alloc(Node { value: 1, next: None });
    thread.root(node);
    thread.collect();
    thread.stop_transaction();
}

#[test]
fn test_collection_span_and_summary() {
    let recorder = Recorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    tracing::subscriber::with_default(subscriber, run_transaction);

    assert!(recorder.contains("span gc-local kind=Explicit"));
    assert!(recorder.contains("span gc-local kind=EndOfTransaction"));
    assert!(recorder.contains("objects_copied=1"));
    assert!(recorder.contains("message=collection_end"));
    assert!(recorder.contains("phase=Weakrefs"));
}

#[test]
fn test_transaction_events() {
    let recorder = Recorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    tracing::subscriber::with_default(subscriber, run_transaction);

    for event in ["start", "stop", "teardown"] {
        assert!(recorder.contains(&format!("event={event}")), "{event}");
    }
    assert!(recorder.contains("message=promote_locals_to_globals"));
}

#[test]
fn test_fatal_errors_are_logged() {
    let recorder = Recorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        tracing::subscriber::with_default(subscriber, || {
            let gc = StmGc::new(GcConfig::default(), TypeRegistry::new()).unwrap();
            let mut thread = ThreadGc::new(gc, ThreadRole::Worker).unwrap();
            thread.collect();
        });
    }));

    assert!(result.is_err());
    assert!(recorder.contains("local collection while gc not running"));
}

#[test]
fn test_gc_ids_increase() {
    let first = next_gc_id();
    let second = next_gc_id();
    assert!(second.0 > first.0);
}
