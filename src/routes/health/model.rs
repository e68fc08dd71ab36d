use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterHealth {
    pub records: usize,
    pub general_limit: u32,
    pub upload_limit: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: String,
    pub uptime_seconds: i64,
    pub version: &'static str,
    pub environment: String,
    pub rate_limiter: RateLimiterHealth,
}
