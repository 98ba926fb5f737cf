//! 分析辅助函数
//!
//! 提示词构造与 LLM 文本解析都是纯函数，与调度逻辑分离。

mod parser;
mod prompt;

pub use parser::parse_analysis;
pub use prompt::{MAX_PROMPT_TWEETS, build_prompt};
