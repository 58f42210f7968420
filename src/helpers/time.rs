use chrono::{DateTime, Utc};
use tokio::time::Duration;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Time left until `deadline`, never less than `floor`.
pub fn duration_until(deadline: DateTime<Utc>, floor: Duration) -> Duration {
    (deadline - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_deadline_is_clamped_to_floor() {
        let past = Utc::now() - chrono::Duration::seconds(30);
        assert_eq!(duration_until(past, Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn future_deadline_is_kept() {
        let future = Utc::now() + chrono::Duration::seconds(120);
        let left = duration_until(future, Duration::from_secs(1));
        assert!(left > Duration::from_secs(100) && left <= Duration::from_secs(120));
    }
}
