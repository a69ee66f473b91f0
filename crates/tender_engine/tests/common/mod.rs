#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use tender_engine::{EngineEvent, EventSink};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pipeline_logging::initialize_for_tests);
}

#[derive(Default)]
pub struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
