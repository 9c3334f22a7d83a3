/// 业务服务层

pub mod fleet_service;
pub mod metrics;
pub mod user_service;
pub mod vps_service;
