//! 缓存键模块
//! 提供各种缓存键生成函数

/// 分析结果缓存键前缀
const ANALYSIS_PREFIX: &str = "analysis_";

/// 生成用户资料与推文缓存键，直接使用用户名
pub fn user_data_key(username: &str) -> String {
    username.to_string()
}

/// 生成分析结果缓存键
pub fn analysis_key(username: &str) -> String {
    format!("{}{}", ANALYSIS_PREFIX, username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct_per_cache() {
        assert_eq!(user_data_key("jack"), "jack");
        assert_eq!(analysis_key("jack"), "analysis_jack");
    }
}
