//! `/health` body.

use std::time::Instant;

use serde::Serialize;

use agora_telemetry::DeliveryStatsSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: &'static str,
    pub uptime_secs: u64,
    /// Users with a live connection.
    pub connections: usize,
    pub rooms: usize,
    pub delivered: u64,
    pub dropped: u64,
}

pub fn health_check(
    start_time: Instant,
    connections: usize,
    rooms: usize,
    stats: &DeliveryStatsSnapshot,
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rooms,
        delivered: stats.delivered,
        dropped: stats.dropped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, 0, &DeliveryStatsSnapshot::default());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, 0, 0, &DeliveryStatsSnapshot::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn dropped_sums_every_reason() {
        let stats = DeliveryStatsSnapshot {
            delivered: 7,
            dropped_offline: 2,
            dropped_queue_full: 1,
            dropped_closed: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(health_check(Instant::now(), 3, 2, &stats)).unwrap();
        assert_eq!(json["connections"], 3);
        assert_eq!(json["rooms"], 2);
        assert_eq!(json["delivered"], 7);
        assert_eq!(json["dropped"], 4);
    }
}
