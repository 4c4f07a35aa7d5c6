use super::fsm::{ReceiptEvent, ReceiptStateMachine};
use crate::{
    Error, Result,
    llm::ReceiptExtractor,
    storage::ItemSink,
    table::{self, ItemRow, SAMPLE_OUTPUT},
};
use base64::{Engine as _, engine::general_purpose};
use std::{fmt::Display, future::Future, sync::Arc};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

pub const IMAGE_MEDIA_PREFIX: &str = "image/";

/// Outcome of a successfully processed receipt.
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    pub receipt_id: Uuid,
    pub rows: Vec<ItemRow>,
}

/// Runs one upload through validation, encoding, extraction, parsing and
/// persistence. Holds no per-request state, so one instance serves all
/// requests concurrently.
pub struct ReceiptProcessor {
    extractor: Arc<dyn ReceiptExtractor>,
    sink: Arc<dyn ItemSink>,
    test_mode: bool,
}

impl ReceiptProcessor {
    pub fn new(
        extractor: Arc<dyn ReceiptExtractor>,
        sink: Arc<dyn ItemSink>,
        test_mode: bool,
    ) -> Self {
        Self {
            extractor,
            sink,
            test_mode,
        }
    }

    /// Processes one upload. `read` yields the image bytes and is only
    /// awaited once the declared content type has been accepted.
    pub async fn process<F, B, E>(
        &self,
        content_type: Option<&str>,
        read: F,
    ) -> Result<ProcessedReceipt>
    where
        F: Future<Output = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let receipt_id = Uuid::new_v4();
        let span = info_span!("receipt", receipt_id = %receipt_id);

        self.process_receipt(ReceiptStateMachine::new(receipt_id), content_type, read)
            .instrument(span)
            .await
    }

    async fn process_receipt<F, B, E>(
        &self,
        mut fsm: ReceiptStateMachine,
        content_type: Option<&str>,
        read: F,
    ) -> Result<ProcessedReceipt>
    where
        F: Future<Output = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        match self.run(&mut fsm, content_type, read).await {
            Ok(rows) => {
                fsm.transition(ReceiptEvent::ResponseSent)?;
                info!("Receipt processed successfully with {} items", rows.len());
                Ok(ProcessedReceipt {
                    receipt_id: fsm.receipt_id(),
                    rows,
                })
            }
            Err(e) => Err(fsm.fail(e)),
        }
    }

    async fn run<F, B, E>(
        &self,
        fsm: &mut ReceiptStateMachine,
        content_type: Option<&str>,
        read: F,
    ) -> Result<Vec<ItemRow>>
    where
        F: Future<Output = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        validate_content_type(content_type)?;
        fsm.transition(ReceiptEvent::ImageAccepted)?;

        let image = read.await.map_err(|e| {
            error!("Error processing image: {}", e);
            Error::invalid_input(format!("Error processing image: {e}"))
        })?;
        if image.as_ref().is_empty() {
            return Err(Error::invalid_input("Uploaded image is empty"));
        }
        let image_base64 = general_purpose::STANDARD.encode(image.as_ref());
        fsm.transition(ReceiptEvent::ImageEncoded)?;

        debug!("Is test? {}", self.test_mode);
        let output = if self.test_mode {
            SAMPLE_OUTPUT.to_string()
        } else {
            self.extractor.extract(&image_base64).await?
        };
        fsm.transition(ReceiptEvent::OutputReceived)?;
        debug!("LLM Output:\n{}", output);

        let rows = table::parse(&output).inspect_err(|e| {
            error!("Error parsing extraction output: {}", e);
            debug!("LLM Output:\n{}", output);
        })?;
        fsm.transition(ReceiptEvent::TableParsed)?;

        if let Err(e) = self.sink.append(&rows).await {
            let rendered = table::to_csv(&rows).unwrap_or_else(|_| format!("{rows:?}"));
            error!("Error writing items to DB, unsaved rows:\n{}", rendered);
            return Err(e);
        }
        fsm.transition(ReceiptEvent::RowsPersisted)?;

        Ok(rows)
    }
}

fn validate_content_type(content_type: Option<&str>) -> Result<()> {
    let is_image = content_type.is_some_and(|value| {
        value
            .trim_start()
            .to_ascii_lowercase()
            .starts_with(IMAGE_MEDIA_PREFIX)
    });

    if is_image {
        Ok(())
    } else {
        debug!("Rejected upload with content type {:?}", content_type);
        Err(Error::invalid_input(
            "Invalid file type. Please upload an image.",
        ))
    }
}
