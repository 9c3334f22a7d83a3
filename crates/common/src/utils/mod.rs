/// 工具函数集合

use std::time::Duration;
use uuid::Uuid;

/// 生成唯一 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 字节转换为 MB
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// 保留一位小数
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 在给定时间预算内按固定间隔最多可以尝试的次数，即 ceil(budget / interval)，至少为 1
pub fn max_attempts(budget: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 1;
    }
    let budget = budget.as_millis();
    let interval = interval.as_millis().max(1);
    let attempts = (budget + interval - 1) / interval;
    attempts.clamp(1, u32::MAX as u128) as u32
}
