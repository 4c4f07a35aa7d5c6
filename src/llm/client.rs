use crate::{Error, Result, config::LlmConfig};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Media type announced in the data URI sent to the model.
pub const IMAGE_DATA_URI_PREFIX: &str = "data:image/jpg;base64,";

/// Sampling temperature; zero keeps extraction reproducible.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Share of the inference timeout spent retrying 429/5xx answers, so the last
/// upstream error surfaces before the timeout does.
const RETRY_WINDOW_DIVISOR: u32 = 4;

/// Turns a base64-encoded receipt image into the model's raw CSV text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, image_base64: &str) -> Result<String>;
}

pub struct OpenAiExtractor {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
    user_prompt: String,
    timeout: Duration,
}

impl OpenAiExtractor {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key);

        if !config.base_url.is_empty() {
            openai_config = openai_config.with_api_base(config.base_url);
        }
        if let Some(organization) = config.organization {
            openai_config = openai_config.with_org_id(organization);
        }
        if let Some(project) = config.project {
            openai_config = openai_config.with_project_id(project);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(retry_window(config.timeout)))
            .build();

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            model: config.model,
            system_prompt: config.system_prompt,
            user_prompt: config.user_prompt,
            timeout: config.timeout,
        })
    }

    fn build_request(&self, image_base64: &str) -> Result<CreateChatCompletionRequest> {
        let system: ChatCompletionRequestMessage = ChatCompletionRequestSystemMessageArgs::default()
            .content(ChatCompletionRequestSystemMessageContent::Text(
                self.system_prompt.clone(),
            ))
            .build()?
            .into();

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(self.user_prompt.clone())
            .build()?;

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(format!("{IMAGE_DATA_URI_PREFIX}{image_base64}"))
                    .build()?,
            )
            .build()?;

        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(vec![
                ChatCompletionRequestUserMessageContentPart::Text(text_part),
                ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
            ]))
            .build()?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![system, user])
            .temperature(EXTRACTION_TEMPERATURE)
            .build()?;

        Ok(request)
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String> {
        let response = self.client.chat().create(request).await?;

        debug!(
            "Received chat completion response with {} choices",
            response.choices.len()
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::upstream("Inference response contained no text"))
    }
}

fn retry_window(timeout: Duration) -> Duration {
    timeout / RETRY_WINDOW_DIVISOR
}

#[async_trait]
impl ReceiptExtractor for OpenAiExtractor {
    #[instrument(skip_all, fields(model = %self.model, image_len = image_base64.len()))]
    async fn extract(&self, image_base64: &str) -> Result<String> {
        let request = self.build_request(image_base64)?;

        let outcome = tokio::time::timeout(self.timeout, self.complete(request)).await;

        match outcome {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => {
                error!("Error communicating with GPT API: {}", e);
                Err(match e {
                    Error::Upstream(_) => e,
                    other => Error::upstream(other.to_string()),
                })
            }
            Err(_) => {
                error!("GPT API call timed out after {:?}", self.timeout);
                Err(Error::upstream(format!(
                    "Inference call timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
