//! Backend request/response adapter.
//!
//! Two completion providers are supported, distinguished by their base URL.
//! The distinction is resolved once into an explicit [`Backend`] when the
//! configuration is constructed; credentials, model selection, header
//! construction and response enrichment all dispatch on that variant.

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use chatloom_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, GenerationData, GenerationInfo,
    ModelDescriptor, ModelList, ToolSchema, Usage,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// End-user tag submitted with every completion request.
pub const CLIENT_USER_TAG: &str = "chatloom";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    OpenAi,
    OpenRouter,
}

impl Backend {
    /// Unrecognized base URLs get OpenRouter-style handling, matching the
    /// catch-all treatment of any non-OpenAI endpoint.
    pub fn from_base_url(base_url: &str) -> Self {
        if base_url.trim_end_matches('/') == OPENAI_BASE_URL {
            Backend::OpenAi
        } else {
            Backend::OpenRouter
        }
    }
}

/// Per-session backend configuration. Carries credentials and default models
/// for both providers so switching the base URL never loses either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    base_url: String,
    backend: Backend,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub openai_model: String,
    pub openrouter_model: String,
    /// Sent as the OpenRouter attribution headers.
    pub site_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new(OPENROUTER_BASE_URL)
    }
}

impl ChatConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let backend = Backend::from_base_url(&base_url);
        Self {
            base_url,
            backend,
            openai_api_key: String::new(),
            openrouter_api_key: String::new(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openrouter_model: "mistralai/mistral-7b-instruct".to_string(),
            site_url: "https://chatloom.dev".to_string(),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Re-resolves the backend variant; the URL comparison happens only here.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
        self.backend = Backend::from_base_url(&self.base_url);
    }

    pub fn api_key(&self) -> &str {
        match self.backend {
            Backend::OpenAi => &self.openai_api_key,
            Backend::OpenRouter => &self.openrouter_api_key,
        }
    }

    pub fn model(&self) -> &str {
        match self.backend {
            Backend::OpenAi => &self.openai_model,
            Backend::OpenRouter => &self.openrouter_model,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }

    fn generation_url(&self, response_id: &str) -> String {
        format!(
            "{}/generation?id={}",
            self.base_url.trim_end_matches('/'),
            response_id
        )
    }
}

/// Builds the request body. `function_call`/`functions` are present only when
/// tools were supplied.
pub fn build_request(
    messages: Vec<ChatMessage>,
    tools: &[ToolSchema],
    config: &ChatConfig,
) -> ChatCompletionRequest {
    let mut request = ChatCompletionRequest {
        model: config.model().to_string(),
        messages,
        user: CLIENT_USER_TAG.to_string(),
        temperature: 0.0,
        stream: false,
        n: 1,
        function_call: None,
        functions: None,
    };
    if !tools.is_empty() {
        request.function_call = Some("auto".to_string());
        request.functions = Some(tools.to_vec());
    }
    request
}

/// Bearer credential plus JSON content type; OpenRouter additionally requires
/// attribution headers identifying the calling application.
pub fn build_headers(config: &ChatConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", config.api_key()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if config.backend() == Backend::OpenRouter {
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.site_url)?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.site_url)?,
        );
    }
    Ok(headers)
}

/// Converts generation metadata into a usage block, but only when both native
/// token counts are present. Partial metadata yields no patch.
pub fn generation_usage(data: GenerationData) -> Option<Usage> {
    let prompt_tokens = data.native_tokens_prompt?;
    let completion_tokens = data.native_tokens_completion?;
    Some(Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        origin: data.origin,
        inference_costs: data.usage,
    })
}

#[derive(Debug, Clone, Default)]
pub struct BackendClient {
    client: Client,
}

impl BackendClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Submits the conversation for completion. Transport and HTTP errors
    /// propagate unchanged; on OpenRouter the usage block is overwritten with
    /// native token counts when the generation-metadata lookup succeeds.
    pub async fn submit_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolSchema],
        config: &ChatConfig,
    ) -> Result<ChatCompletionResponse> {
        let request = build_request(messages, tools, config);
        let headers = build_headers(config)?;
        let response = self
            .client
            .post(config.chat_url())
            .headers(headers)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let mut completion: ChatCompletionResponse = response.json().await?;
        tracing::debug!(
            target: "chatloom.providers",
            response_id = %completion.id,
            model = config.model(),
            "completion received"
        );

        if config.backend() == Backend::OpenRouter {
            match self.fetch_generation_usage(&completion.id, config).await {
                Some(usage) => completion.usage = Some(usage),
                None => tracing::debug!(
                    target: "chatloom.providers",
                    response_id = %completion.id,
                    "generation metadata unavailable, keeping provider usage"
                ),
            }
        }

        Ok(completion)
    }

    /// Best-effort: any transport failure, non-success status or missing
    /// field skips enrichment instead of failing the completion.
    async fn fetch_generation_usage(
        &self,
        response_id: &str,
        config: &ChatConfig,
    ) -> Option<Usage> {
        let headers = build_headers(config).ok()?;
        let response = self
            .client
            .get(config.generation_url(response_id))
            .headers(headers)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let info: GenerationInfo = response.json().await.ok()?;
        generation_usage(info.data)
    }

    /// Lists the models the active backend offers. Failures propagate to the
    /// caller.
    pub async fn list_models(&self, config: &ChatConfig) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(config.models_url())
            .bearer_auth(config.api_key())
            .header("Cache-Control", "max-stale=3600")
            .send()
            .await?
            .error_for_status()?;
        let list: ModelList = response.json().await?;
        Ok(list.data)
    }
}
