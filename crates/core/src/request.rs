//! Request and chat-turn value objects.
//!
//! A `GenerationRequest` carries everything the budgeter may place in a
//! prompt plus the numeric knobs that bound it. It is validated once at
//! construction and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// One exchange in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// What the user said
    pub user_text: String,

    /// What the bot answered; `None` marks a dangling turn (e.g. an error stub)
    #[serde(default)]
    pub bot_text: Option<String>,
}

impl ChatTurn {
    /// A completed exchange.
    pub fn new(user_text: impl Into<String>, bot_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: Some(bot_text.into()),
        }
    }

    /// A turn the bot never answered.
    pub fn dangling(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: None,
        }
    }

    pub fn is_dangling(&self) -> bool {
        self.bot_text.is_none()
    }

    /// The bot reply, empty for dangling turns.
    pub fn bot(&self) -> &str {
        self.bot_text.as_deref().unwrap_or("")
    }
}

/// Everything needed to budget and assemble one prompt.
///
/// Build one with [`GenerationRequest::builder`]; the builder validates the
/// numeric knobs. Deserialized requests should go through
/// [`GenerationRequest::validate`] before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's instruction for this turn
    pub instruction: String,

    /// Auxiliary input appended to the instruction
    #[serde(default)]
    pub aux_input: String,

    /// Free-text context block
    #[serde(default)]
    pub free_context: String,

    /// System prompt
    #[serde(default)]
    pub system_prompt: String,

    /// Language-pack text placed before the request
    #[serde(default)]
    pub lang_pre: String,

    /// Language-pack text placed after the request
    #[serde(default)]
    pub lang_post: String,

    /// Prior conversation, oldest first
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,

    /// Retrieved document snippets, most relevant first
    #[serde(default)]
    pub documents: Vec<String>,

    /// Model context window in tokens
    pub model_max_length: usize,

    /// Generation room kept free when sizing the input
    #[serde(default)]
    pub min_reserved_new_tokens: usize,

    /// Cap on input tokens for this call (`None` = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<usize>,

    /// Cap on input tokens across all calls (`None` = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_input_tokens: Option<usize>,

    /// How many new tokens the caller would like
    pub max_new_tokens_requested: usize,
}

impl GenerationRequest {
    /// Start building a request for `instruction` against a model window.
    pub fn builder(
        instruction: impl Into<String>,
        model_max_length: usize,
    ) -> GenerationRequestBuilder {
        GenerationRequestBuilder::new(instruction, model_max_length)
    }

    /// Check the numeric knobs.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.model_max_length == 0 {
            return Err(RequestError::ZeroModelMaxLength);
        }
        if self.max_new_tokens_requested == 0 {
            return Err(RequestError::ZeroMaxNewTokens);
        }
        if self.max_input_tokens == Some(0) {
            return Err(RequestError::ZeroInputCap {
                field: "max_input_tokens",
            });
        }
        if self.max_total_input_tokens == Some(0) {
            return Err(RequestError::ZeroInputCap {
                field: "max_total_input_tokens",
            });
        }
        Ok(())
    }

    /// History with dangling turns removed.
    pub fn complete_history(&self) -> Vec<ChatTurn> {
        self.chat_history
            .iter()
            .filter(|turn| !turn.is_dangling())
            .cloned()
            .collect()
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    request: GenerationRequest,
}

impl GenerationRequestBuilder {
    fn new(instruction: impl Into<String>, model_max_length: usize) -> Self {
        Self {
            request: GenerationRequest {
                instruction: instruction.into(),
                aux_input: String::new(),
                free_context: String::new(),
                system_prompt: String::new(),
                lang_pre: String::new(),
                lang_post: String::new(),
                chat_history: Vec::new(),
                documents: Vec::new(),
                model_max_length,
                min_reserved_new_tokens: 0,
                max_input_tokens: None,
                max_total_input_tokens: None,
                max_new_tokens_requested: 256,
            },
        }
    }

    pub fn aux_input(mut self, aux_input: impl Into<String>) -> Self {
        self.request.aux_input = aux_input.into();
        self
    }

    pub fn free_context(mut self, context: impl Into<String>) -> Self {
        self.request.free_context = context.into();
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.request.system_prompt = system_prompt.into();
        self
    }

    /// Language-pack hints placed before and after the request.
    pub fn language_hints(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.request.lang_pre = pre.into();
        self.request.lang_post = post.into();
        self
    }

    pub fn chat_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.request.chat_history = history;
        self
    }

    pub fn documents(mut self, documents: Vec<String>) -> Self {
        self.request.documents = documents;
        self
    }

    pub fn min_reserved_new_tokens(mut self, tokens: usize) -> Self {
        self.request.min_reserved_new_tokens = tokens;
        self
    }

    pub fn max_input_tokens(mut self, cap: Option<usize>) -> Self {
        self.request.max_input_tokens = cap;
        self
    }

    pub fn max_total_input_tokens(mut self, cap: Option<usize>) -> Self {
        self.request.max_total_input_tokens = cap;
        self
    }

    pub fn max_new_tokens(mut self, tokens: usize) -> Self {
        self.request.max_new_tokens_requested = tokens;
        self
    }

    /// Validate and produce the request.
    pub fn build(self) -> Result<GenerationRequest, RequestError> {
        self.request.validate()?;
        Ok(self.request)
    }
}
