//! Provider dispatch example.
//!
//! Run with:
//! ```
//! cargo run --example provider_dispatch
//! ```

use std::sync::Arc;
use std::time::Duration;

use callgate::{Decision, LimiterSettings, RateLimiter, SystemClock, sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = LimiterSettings::from_json(
        r#"{
            "sweep_interval_ms": 1000,
            "identifiers": {
                "search": { "max_requests": 5, "time_window_ms": 2000, "priority": "low" }
            }
        }"#,
    )?;

    let limiter = Arc::new(RateLimiter::from_settings(&settings, SystemClock));
    let sweeper = sweeper::spawn(&limiter);

    println!("=== Provider Dispatch Demo ===\n");
    println!("Registered: {:?}\n", limiter.registry().identifiers());

    // Simulate bursts of calls per provider and caller
    let calls = vec![
        ("openai", "user-1", 15),   // 10 burst credits, then paced at 1/s
        ("anthropic", "user-1", 8), // 5 burst credits
        ("search", "user-2", 6),    // 5 per 2s, low priority -> 4
        ("unknown", "user-3", 3),   // fallback: 30/min
    ];

    for (provider, caller, count) in calls {
        println!("Provider: {} (caller: {}, sending {} calls)", provider, caller, count);

        let mut allowed = 0;
        for i in 1..=count {
            match limiter.check(provider, Some(caller)) {
                Decision::Allowed => allowed += 1,
                Decision::Denied { reason, retry_after } => {
                    println!("  call {}: ❌ {} (retry after {:?})", i, reason, retry_after);
                }
            }
        }

        let status = limiter.status(provider, Some(caller));
        println!(
            "  ✅ Allowed: {}, remaining: {}/{}, burst: {}, backoff: {}\n",
            allowed, status.remaining, status.limit, status.burst_tokens, status.in_backoff
        );
    }

    println!("--- Waiting for the search backoff to pass ---\n");
    let wait = limiter
        .status("search", Some("user-2"))
        .time_until_reset(std::time::Instant::now());
    tokio::time::sleep(wait + Duration::from_millis(10)).await;

    let decision = limiter.check("search", Some("user-2"));
    println!("search after wait: {:?}", decision);
    println!("Tracked keys: {}", limiter.tracked_keys());

    sweeper.shutdown().await;
    Ok(())
}
