//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MEDASSIST__*` 覆盖（双下划线表示嵌套，
//! 如 `MEDASSIST__ORCHESTRATOR__STEP_CEILING=40`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmSection,
    pub knowledge: KnowledgeSection,
    pub search: SearchSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Medical Assistant".to_string(),
        }
    }
}

/// [orchestrator] 段：生成尝试上限、总步数上限、两类上下文来源开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 单轮内 Generation Step 最多调用次数
    pub generation_attempt_ceiling: u32,
    /// 单轮内总步数上限（防止路由死循环，与生成次数独立）
    pub step_ceiling: u32,
    pub vector_store_enabled: bool,
    pub web_search_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation_attempt_ceiling: 3,
            step_ceiling: 25,
            vector_store_enabled: true,
            web_search_enabled: true,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub deepseek: LlmDeepSeekSection,
    pub openai: LlmOpenAiSection,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次生成请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [knowledge] 段：本地知识库目录、检索条数、容量与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeSection {
    /// 语料目录（.txt / .md），未设置时知识库为空
    pub corpus_dir: Option<PathBuf>,
    pub top_k: usize,
    pub max_entries: usize,
    pub timeout_secs: u64,
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            corpus_dir: None,
            top_k: 4,
            max_entries: 1000,
            timeout_secs: 10,
        }
    }
}

/// [search] 段：Tavily 端点、结果条数、超时与单条最大字符数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: crate::providers::TAVILY_ENDPOINT.to_string(),
            max_results: 3,
            timeout_secs: 15,
            max_result_chars: 4000,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MEDASSIST__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MEDASSIST__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MEDASSIST")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
