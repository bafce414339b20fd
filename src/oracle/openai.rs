use super::*;
use rand::Rng;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// OpenAI provider implementation
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self { client, model }
    }

    /// Run a single system+user chat completion bounded by `timeout`.
    async fn complete(
        &self,
        system: &str,
        user: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> OracleResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| OracleError::ApiError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| OracleError::ApiError(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| OracleError::ApiError(e.to_string()))?;

        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| OracleError::Timeout(timeout))?
            .map_err(|e| OracleError::ApiError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| OracleError::ParseError("No content in response".to_string()))
    }
}

const GENERATE_SYSTEM_PROMPT: &str =
    "You generate speed-trivia categories for a word game. Answer with JSON only, \
     no prose, no markdown fences.";

const JUDGE_SYSTEM_PROMPT: &str =
    "You judge whether a word belongs to a trivia category. Answer with YES or NO only.";

#[async_trait]
impl OracleProvider for OpenAiProvider {
    async fn generate_category(&self, level: u32, timeout: Duration) -> OracleResult<Category> {
        let seed: u32 = rand::rng().random_range(0..1_000_000);
        let user = format!(
            "Generate ONE common speed trivia category. Level {level}. \
             Choose a unique topic. Random seed: {seed}. \
             Return JSON: {{\"category\": \"MAX 3 WORDS\", \"examples\": [\"list of 50 common answers\"]}}."
        );

        let text = self
            .complete(GENERATE_SYSTEM_PROMPT, user, 2048, timeout)
            .await?;
        parse_category_reply(&text)
    }

    async fn validate_word(
        &self,
        category: &str,
        word: &str,
        timeout: Duration,
    ) -> OracleResult<bool> {
        let user = format!("Category: \"{category}\". Is \"{word}\" valid? YES/NO only.");
        let text = self.complete(JUDGE_SYSTEM_PROMPT, user, 5, timeout).await?;
        Ok(parse_judgement(&text))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Only run with actual API key
    async fn openai_generates_category() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiProvider::new(api_key, "gpt-4o-mini".to_string());

        let category = provider
            .generate_category(1, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!category.name.is_empty());
        assert!(!category.examples.is_empty());
        println!("Generated category: {} ({} examples)", category.name, category.examples.len());
    }

    #[tokio::test]
    #[ignore] // Only run with actual API key
    async fn openai_judges_membership() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiProvider::new(api_key, "gpt-4o-mini".to_string());

        assert!(provider
            .validate_word("FRUITS", "kiwi", Duration::from_secs(30))
            .await
            .unwrap());
    }
}
