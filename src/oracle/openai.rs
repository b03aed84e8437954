use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ChatMessage, ChatOptions, Choice, Oracle, OracleError, Role, TokenLogprob, TokenTable,
    TopLogprob,
};

/// A real oracle backed by an OpenAI-compatible chat completions
/// endpoint, parameterized by model name so the `gpt3_5` and `gpt4`
/// descriptors both bind to this same struct.
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    organization: Option<String>,
    model: String,
    tokens: TokenTable,
}

impl OpenAiOracle {
    pub fn new(api_key: String, organization: Option<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let tokens = if model.starts_with("gpt-4") {
            TokenTable::gpt4()
        } else {
            TokenTable::gpt3_5()
        };
        OpenAiOracle {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key,
            organization,
            model,
            tokens,
        }
    }

    /// `gpt-3.5-turbo`, using the `OPENAI_API_KEY`/`OPENAI_ORG_ID`
    /// environment variables.
    pub fn gpt3_5(api_key: String, organization: Option<String>) -> Self {
        OpenAiOracle::new(api_key, organization, "gpt-3.5-turbo")
    }

    /// `gpt-4`, same configuration surface as [`Self::gpt3_5`].
    pub fn gpt4(api_key: String, organization: Option<String>) -> Self {
        OpenAiOracle::new(api_key, organization, "gpt-4")
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: &'a [String],
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    logit_bias: std::collections::HashMap<String, f32>,
    logprobs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_logprobs: Option<u32>,
}

#[derive(Deserialize)]
struct WireTopLogprob {
    token: String,
    logprob: f32,
}

#[derive(Deserialize)]
struct WireTokenLogprob {
    token: String,
    logprob: f32,
    #[serde(default)]
    top_logprobs: Vec<WireTopLogprob>,
}

#[derive(Deserialize)]
struct WireLogprobs {
    #[serde(default)]
    content: Vec<WireTokenLogprob>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    logprobs: Option<WireLogprobs>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Vec<Choice>, OracleError> {
        let wire_messages = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        let logit_bias = options
            .logit_bias
            .iter()
            .map(|(id, bias)| (id.to_string(), *bias))
            .collect();

        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            n: options.n,
            stop: &options.stop,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            logit_bias,
            logprobs: options.logprobs,
            top_logprobs: if options.logprobs {
                Some(options.top_logprobs)
            } else {
                None
            },
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request);
        if let Some(org) = &self.organization {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req.send().await?.error_for_status()?;
        let parsed: ChatResponse = response.json().await?;

        if parsed.choices.is_empty() {
            return Err(OracleError::NoChoices);
        }

        Ok(parsed
            .choices
            .into_iter()
            .map(|c| Choice {
                message: ChatMessage {
                    role: Role::Assistant,
                    content: c.message.content.unwrap_or_default(),
                },
                logprobs: c.logprobs.map(|lp| {
                    lp.content
                        .into_iter()
                        .map(|t| TokenLogprob {
                            token: t.token,
                            logprob: t.logprob,
                            top_logprobs: t
                                .top_logprobs
                                .into_iter()
                                .map(|tl| TopLogprob {
                                    token: tl.token,
                                    logprob: tl.logprob,
                                })
                                .collect(),
                        })
                        .collect()
                }),
            })
            .collect())
    }

    fn token_table(&self) -> &TokenTable {
        &self.tokens
    }
}
