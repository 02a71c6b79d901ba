//! DeepSeek 客户端（OpenAI 兼容端点）

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

fn deepseek_api_key() -> Option<String> {
    std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
}

/// 创建 DeepSeek 客户端
///
/// Key 取 `DEEPSEEK_API_KEY`，其次 `OPENAI_API_KEY`；base_url 为空时用官方端点；
/// 模型为空时用 `DEEPSEEK_MODEL` 环境变量，默认 deepseek-chat。
/// 问答场景温度固定为 0，回答尽量可复现。
pub fn create_deepseek_client(model: Option<&str>, base_url: Option<&str>) -> OpenAiClient {
    let model = model
        .filter(|m| !m.trim().is_empty())
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
    let base_url = base_url.unwrap_or(DEEPSEEK_BASE_URL);

    OpenAiClient::new(Some(base_url), &model, deepseek_api_key().as_deref()).with_temperature(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_model_wins() {
        let client = create_deepseek_client(Some(DEEPSEEK_REASONER), None);
        assert_eq!(client.model(), DEEPSEEK_REASONER);
    }

    #[test]
    fn test_blank_model_falls_back() {
        std::env::remove_var("DEEPSEEK_MODEL");
        let client = create_deepseek_client(Some("  "), Some("http://localhost:1"));
        assert_eq!(client.model(), DEEPSEEK_CHAT);
    }
}
