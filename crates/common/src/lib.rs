/// VPS Panel - 公共库
/// 
/// 提供 Server 与 Provider 共享的数据模型、错误类型、工具函数

pub mod errors;
pub mod models;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use models::{MemoryUsage, PowerAction, ServerId, ServerRecord, ServerStatus};
