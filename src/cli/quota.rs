//! Quota status command handler.

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use savvybot::config::Config;
use savvybot::quota::store::RedisCounterStore;
use savvybot::quota::{Meter, QuotaTracker};

/// Today's usage report for one user, as printed by `quota --json`.
#[derive(Debug, Serialize)]
struct UsageReport {
    user: i64,
    date: String,
    meters: Vec<MeterUsage>,
}

#[derive(Debug, Serialize)]
struct MeterUsage {
    meter: &'static str,
    used: u64,
    limit: u64,
}

/// Handle `savvybot quota --user <id>`: print today's usage for both meters.
pub(crate) async fn cmd_quota(user: i64, json: bool) -> Result<()> {
    let config = Config::from_env()?;
    let store = Arc::new(RedisCounterStore::connect(&config.redis_url).await?);
    let tracker = QuotaTracker::new(store, config.limits);

    let mut meters = Vec::new();
    for meter in [Meter::Completion, Meter::Transcription] {
        meters.push(MeterUsage {
            meter: meter.prefix(),
            used: tracker.usage(meter, user).await?,
            limit: tracker.limits().limit(meter),
        });
    }

    let report = UsageReport {
        user,
        date: Local::now().date_naive().to_string(),
        meters,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<16} {:<12} {:<12}", "Meter", "Used", "Limit");
    println!("{}", "-".repeat(40));
    for usage in &report.meters {
        println!("{:<16} {:<12} {:<12}", usage.meter, usage.used, usage.limit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_report_serializes_all_fields() {
        let report = UsageReport {
            user: 42,
            date: "2026-08-04".to_string(),
            meters: vec![MeterUsage {
                meter: "completion",
                used: 1_234,
                limit: 10_000,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["user"], 42);
        assert_eq!(json["date"], "2026-08-04");
        assert_eq!(json["meters"][0]["meter"], "completion");
        assert_eq!(json["meters"][0]["used"], 1_234);
        assert_eq!(json["meters"][0]["limit"], 10_000);
    }
}
