//! 上下文来源：知识库 / 联网搜索适配、搜索结果归一化

pub mod adapter;
pub mod normalize;
pub mod search;

pub use adapter::{ContextProvider, Fetched, ProviderKind};
pub use normalize::{normalize_search_results, SearchPayload};
pub use search::{TavilySearch, WebSearch, TAVILY_ENDPOINT};
