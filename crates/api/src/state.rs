use chrono::FixedOffset;
use dairy_core::ingest::RecordSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn RecordSource>,
    /// Farm calendar offset used when turning timestamps into dates.
    pub offset: FixedOffset,
}

impl AppState {
    pub fn new(source: Arc<dyn RecordSource>, offset: FixedOffset) -> Self {
        Self { source, offset }
    }
}
