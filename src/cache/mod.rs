// 缓存模块
// 进程内 TTL 缓存，重启后清空

pub mod keys;
mod result_cache;

// 重新导出常用类型，方便其他模块使用
pub use result_cache::ResultCache;
