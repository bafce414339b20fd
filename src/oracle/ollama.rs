use super::*;
use rand::Rng;
use serde::Serialize;

/// Ollama provider implementation
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            base_url,
            model,
            client,
        }
    }

    /// Run a single `/api/generate` completion bounded by `timeout`.
    async fn complete(
        &self,
        prompt: String,
        num_predict: u32,
        timeout: Duration,
    ) -> OracleResult<String> {
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: Some(num_predict),
            },
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = tokio::time::timeout(
            timeout,
            self.client.post(&url).json(&request).send(),
        )
        .await
        .map_err(|_| OracleError::Timeout(timeout))?
        .map_err(|e| OracleError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::ApiError(format!(
                "Ollama API returned status: {}",
                response.status()
            )));
        }

        let reply: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::ParseError(e.to_string()))?;

        Ok(reply.response.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)] // Part of Ollama API response format
    done: bool,
}

#[async_trait]
impl OracleProvider for OllamaProvider {
    async fn generate_category(&self, level: u32, timeout: Duration) -> OracleResult<Category> {
        let seed: u32 = rand::rng().random_range(0..1_000_000);
        let prompt = format!(
            "Generate ONE common speed trivia category. Level {level}. \
             Choose a unique topic. Random seed: {seed}. \
             Return JSON: {{\"category\": \"MAX 3 WORDS\", \"examples\": [\"list of 50 common answers\"]}}. \
             Only JSON, no prose, no markdown fences."
        );

        let text = self.complete(prompt, 2048, timeout).await?;
        parse_category_reply(&text)
    }

    async fn validate_word(
        &self,
        category: &str,
        word: &str,
        timeout: Duration,
    ) -> OracleResult<bool> {
        let prompt = format!("Category: \"{category}\". Is \"{word}\" valid? Answer YES or NO only.");
        let text = self.complete(prompt, 5, timeout).await?;
        Ok(parse_judgement(&text))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Only run with Ollama running locally
    async fn ollama_generates_category() {
        let provider =
            OllamaProvider::new("http://localhost:11434".to_string(), "llama3.2".to_string());

        let category = provider
            .generate_category(1, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!category.name.is_empty());
        println!("Generated category: {}", category.name);
    }
}
