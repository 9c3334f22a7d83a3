/// VPS Panel - 云服务商控制
/// 
/// 封装云服务商 HTTP 接口（电源操作、状态查询）以及状态轮询

pub mod client;
pub mod error;
pub mod poller;

pub use client::{ActionAck, CloudApi, HetznerClient, ProviderConfig, RawServerStatus};
pub use error::{PollError, ProviderError};
pub use poller::{PollOutcome, StatePoller, DEFAULT_POLL_INTERVAL};
