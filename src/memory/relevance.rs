//! 记忆相关性评分
//!
//! 默认实现是互相包含的子串匹配，只是语义检索的占位基线；可替换为向量相似度等实现。

/// 相关性评分：返回值大于 0 即视为相关
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, entry_key: &str, query: &str) -> f32;

    fn is_relevant(&self, entry_key: &str, query: &str) -> bool {
        self.score(entry_key, query) > 0.0
    }
}

/// 子串包含（大小写不敏感）：任一方包含另一方得 1.0，否则 0.0
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRelevance;

impl RelevanceScorer for SubstringRelevance {
    fn score(&self, entry_key: &str, query: &str) -> f32 {
        let key = entry_key.to_lowercase();
        let query = query.to_lowercase();
        if key.contains(&query) || query.contains(&key) {
            1.0
        } else {
            0.0
        }
    }
}
