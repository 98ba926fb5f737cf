// 令牌桶限流
// 出站调用等待令牌，入站请求无令牌时直接拒绝

mod token_bucket;

pub use token_bucket::TokenBucket;
