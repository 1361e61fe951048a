//! Vertex AI Gemini generation backend

use super::auth::TokenSource;
use super::error::{GeminiError, Result};
use super::protocol::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Role,
    relationship_schema, transcript,
};
use async_trait::async_trait;
use parlor_application::{
    GenerateInput, GenerationBackend, GenerationError, UpdateRelationshipInput,
};
use parlor_domain::persona::relationship::{MAX_AFFINITY, MIN_AFFINITY};
use parlor_domain::{ActorPromptContext, PromptTemplate, RelationshipUpdate, string::one_line};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Connection and sampling settings
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub project_id: String,
    pub location: String,
    pub model: String,
    pub temperature: f32,
    pub relationship_temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    /// Language characters speak and impressions are written in
    pub language: String,
}

impl GeminiSettings {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.3,
            relationship_temperature: 0.1,
            max_output_tokens: 200,
            timeout: Duration::from_secs(60),
            language: "English".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = self.location,
            project = self.project_id,
            model = self.model
        )
    }
}

/// Generation backend talking to Vertex AI over REST
pub struct VertexGeminiBackend {
    client: reqwest::Client,
    settings: GeminiSettings,
    tokens: TokenSource,
}

impl VertexGeminiBackend {
    /// Create a backend authenticating via [`TokenSource::from_env`]
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        Self::with_token_source(settings, TokenSource::from_env())
    }

    pub fn with_token_source(settings: GeminiSettings, tokens: TokenSource) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("parlor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            "VertexGeminiBackend initialized (model: {}, location: {})",
            settings.model, settings.location
        );

        Ok(Self {
            client,
            settings,
            tokens,
        })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    async fn call(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let token = self.tokens.token().await?;

        let response = self
            .client
            .post(self.settings.endpoint())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GeminiError::ParseError {
            error: e.to_string(),
            raw: body,
        })
    }
}

/// Request for one in-character utterance
pub fn utterance_request(settings: &GeminiSettings, input: &GenerateInput) -> GenerateContentRequest {
    let ctx = ActorPromptContext {
        persona: &input.persona,
        recent_messages: &input.recent_messages,
        topics: input.topics.as_slice(),
        current_turn: input.current_turn,
        max_turns: input.max_turns,
        relationships: &input.relationships,
        language: &settings.language,
    };

    GenerateContentRequest {
        contents: transcript(&input.persona.persona_id, &input.recent_messages),
        system_instruction: Content::text(Role::User, PromptTemplate::actor_system(&ctx)),
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            stop_sequences: PromptTemplate::stop_sequences(&input.persona),
            ..Default::default()
        },
    }
}

/// Request for re-evaluating a relationship, answered as JSON
pub fn relationship_request(
    settings: &GeminiSettings,
    input: &UpdateRelationshipInput,
) -> GenerateContentRequest {
    let system = PromptTemplate::relationship_system(
        &input.persona,
        &input.target,
        &input.current,
        &settings.language,
    );

    GenerateContentRequest {
        contents: transcript(&input.persona.persona_id, &input.recent_messages),
        system_instruction: Content::text(Role::User, system),
        generation_config: GenerationConfig {
            temperature: settings.relationship_temperature,
            max_output_tokens: settings.max_output_tokens,
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(relationship_schema()),
            ..Default::default()
        },
    }
}

#[derive(Deserialize)]
struct Verdict {
    affinity: i32,
    impression: String,
}

/// Parse the model's JSON verdict, clamping affinity to the scale.
pub fn parse_relationship(raw: &str) -> Result<RelationshipUpdate> {
    if raw.trim().is_empty() {
        return Err(GeminiError::EmptyResponse);
    }

    let verdict: Verdict = serde_json::from_str(raw).map_err(|e| GeminiError::ParseError {
        error: e.to_string(),
        raw: raw.to_string(),
    })?;

    Ok(RelationshipUpdate {
        affinity: verdict.affinity.clamp(MIN_AFFINITY, MAX_AFFINITY),
        impression: verdict.impression,
    })
}

#[async_trait]
impl GenerationBackend for VertexGeminiBackend {
    async fn generate(&self, input: &GenerateInput) -> std::result::Result<String, GenerationError> {
        let request = utterance_request(&self.settings, input);
        let response = self.call(&request).await?;

        let text = one_line(response.text().unwrap_or_default());
        if text.is_empty() {
            return Err(GeminiError::EmptyResponse.into());
        }

        debug!(agent = %input.agent_id, "Generated {} chars", text.chars().count());
        Ok(text)
    }

    async fn update_relationship(
        &self,
        input: &UpdateRelationshipInput,
    ) -> std::result::Result<RelationshipUpdate, GenerationError> {
        let request = relationship_request(&self.settings, input);
        let response = self.call(&request).await?;

        Ok(parse_relationship(response.text().unwrap_or_default())?)
    }
}
