use async_trait::async_trait;
use receipt_scanner::{Error, Result, llm::ReceiptExtractor, storage::ItemSink, table::ItemRow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock inference client: answers per image, or with one fixed output.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    pub outputs: HashMap<String, String>,
    pub default_output: Option<String>,
    pub error: Option<String>,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.default_output = Some(output.into());
        self
    }

    /// Answers `output` when the base64 payload equals `image_base64`.
    pub fn with_output_for(
        mut self,
        image_base64: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.outputs.insert(image_base64.into(), output.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptExtractor for MockExtractor {
    async fn extract(&self, image_base64: &str) -> Result<String> {
        self.calls.lock().unwrap().push(image_base64.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref error) = self.error {
            return Err(Error::upstream(error.clone()));
        }

        self.outputs
            .get(image_base64)
            .or(self.default_output.as_ref())
            .cloned()
            .ok_or_else(|| Error::upstream("No mock output for this image"))
    }
}

/// Sink that keeps every appended batch in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<Vec<ItemRow>>>>,
    pub error: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<ItemRow>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn rows(&self) -> Vec<ItemRow> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl ItemSink for RecordingSink {
    async fn append(&self, rows: &[ItemRow]) -> Result<()> {
        if let Some(ref error) = self.error {
            return Err(Error::storage(error.clone()));
        }

        self.batches.lock().unwrap().push(rows.to_vec());
        Ok(())
    }
}
