/// 服务器指标来源
/// 
/// 云服务商接口不提供 CPU / 内存利用率，面板展示的指标来自本地：
/// - `Synthetic`：有界随机数（可指定种子，测试中结果可复现）
/// - `Measured`：采样本机 CPU 与内存

use panel_common::utils::{bytes_to_mb, round1};
use panel_common::{MemoryUsage, ServerStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::sync::Mutex;
use sysinfo::System;

/// 配置中的指标来源类型
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsKind {
    Synthetic,
    Measured,
}

/// 一次采样结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub cpu_load: f64,
    pub memory: MemoryUsage,
}

impl Metrics {
    pub fn zero(memory_total: f64) -> Self {
        Self {
            cpu_load: 0.0,
            memory: MemoryUsage::idle(memory_total),
        }
    }
}

pub enum MetricsSource {
    Synthetic(SyntheticSampler),
    Measured(MeasuredSampler),
}

impl MetricsSource {
    pub fn from_kind(kind: MetricsKind, seed: Option<u64>) -> Self {
        match kind {
            MetricsKind::Synthetic => MetricsSource::Synthetic(SyntheticSampler::new(seed)),
            MetricsKind::Measured => MetricsSource::Measured(MeasuredSampler::new()),
        }
    }

    #[cfg(test)]
    pub fn synthetic(seed: u64) -> Self {
        MetricsSource::Synthetic(SyntheticSampler::new(Some(seed)))
    }

    pub fn kind(&self) -> MetricsKind {
        match self {
            MetricsSource::Synthetic(_) => MetricsKind::Synthetic,
            MetricsSource::Measured(_) => MetricsKind::Measured,
        }
    }

    /// 采样一次
    pub fn sample(&self, memory_total: f64) -> Metrics {
        match self {
            MetricsSource::Synthetic(sampler) => sampler.sample(memory_total),
            MetricsSource::Measured(sampler) => sampler.sample(),
        }
    }

    /// 在线时采样，离线时全部为零
    pub fn for_status(&self, status: ServerStatus, memory_total: f64) -> Metrics {
        if status.is_online() {
            self.sample(memory_total)
        } else {
            Metrics::zero(memory_total)
        }
    }
}

/// CPU 5%~15%，内存 1000~4000 MB（不超过总容量）
pub struct SyntheticSampler {
    rng: Mutex<StdRng>,
}

impl SyntheticSampler {
    pub const CPU_RANGE: std::ops::Range<f64> = 5.0..15.0;
    pub const MEMORY_RANGE_MB: std::ops::Range<f64> = 1000.0..4000.0;

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn sample(&self, memory_total: f64) -> Metrics {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let cpu_load = round1(rng.gen_range(Self::CPU_RANGE));
        let used = round1(rng.gen_range(Self::MEMORY_RANGE_MB)).min(memory_total);
        Metrics {
            cpu_load,
            memory: MemoryUsage::new(used, memory_total),
        }
    }
}

/// 本机资源采样
pub struct MeasuredSampler {
    system: Mutex<System>,
}

impl MeasuredSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }

    fn sample(&self) -> Metrics {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_cpu_usage();
        system.refresh_memory();

        Metrics {
            cpu_load: round1(system.global_cpu_usage() as f64),
            memory: MemoryUsage::new(
                round1(bytes_to_mb(system.used_memory())),
                round1(bytes_to_mb(system.total_memory())),
            ),
        }
    }
}

impl Default for MeasuredSampler {
    fn default() -> Self {
        Self::new()
    }
}
