use chrono::{DateTime, TimeZone, Utc};

use stitchline::{RawEvent, StitchConfig, StitchOutput, StitchPipeline};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn anon(visitor: &str, ip: &str, secs: i64) -> RawEvent {
    RawEvent::new(visitor, ip, at(secs))
}

fn login(visitor: &str, ip: &str, secs: i64, user: &str) -> RawEvent {
    RawEvent::new(visitor, ip, at(secs)).with_user_id(user)
}

/// Ten cookies: three pairs merged via shared hub IPs and split into two
/// persons each by login boundaries, plus four loners that keep their own
/// identity. Events are interleaved across partitions on purpose; only
/// within-partition order matters.
fn ten_cookie_batch() -> Vec<RawEvent> {
    let pairs = [
        ("c1", "c2", "10.0.0.1"),
        ("c3", "c4", "10.0.0.2"),
        ("c5", "c6", "10.0.0.3"),
    ];
    let mut events = Vec::new();
    for (i, &(first, second, hub)) in pairs.iter().enumerate() {
        let base = i as i64 * 1000;
        let tag = i + 1;
        events.push(anon(first, hub, base));
        events.push(login(first, hub, base + 10, &format!("user-{tag}-1")));
        events.push(anon(second, hub, base + 20));
        events.push(login(second, hub, base + 30, &format!("user-{tag}-2")));
        events.push(anon(first, hub, base + 40));
    }
    for i in 7..=10 {
        events.push(anon(&format!("c{i}"), &format!("192.0.2.{i}"), 5000 + i as i64));
    }
    events
}

fn run(config: StitchConfig) -> StitchOutput {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
    StitchPipeline::new(config).unwrap().run(ten_cookie_batch()).unwrap()
}

#[test]
fn ten_cookies_stitch_to_ten_persons() {
    let output = run(StitchConfig::default());

    // 3 pairwise merges, each re-split into 2 persons by logins, plus 4
    // untouched loners: 3 * 2 + 4 = 10.
    assert_eq!(output.stats.distinct_visitors, 10);
    assert_eq!(output.stats.merged_visitors, 6);
    assert_eq!(output.stats.partitions, 7);
    assert_eq!(output.stats.identity_windows, 10);
    assert_eq!(output.stats.distinct_stitched_ids, 10);
    assert!(output.stats.distinct_stitched_ids <= output.stats.distinct_visitors);
}

#[test]
fn hub_ips_are_eligible_and_loner_ips_are_not() {
    let output = run(StitchConfig::default());

    for hub in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        assert_eq!(output.eligibility.distinct_visitors(hub), 2);
        assert!(output.eligibility.is_eligible(hub));
    }
    for i in 7..=10 {
        assert!(!output.eligibility.is_eligible(&format!("192.0.2.{i}")));
    }
}

#[test]
fn merged_cookies_share_a_partition() {
    let output = run(StitchConfig::default());

    for event in output.events.iter().filter(|e| e.visitor_id == "c1" || e.visitor_id == "c2") {
        assert_eq!(event.ip_stitched_id, "10.0.0.1");
    }
    for event in output.events.iter().filter(|e| e.visitor_id == "c7") {
        assert_eq!(event.ip_stitched_id, "c7");
    }
}

#[test]
fn trailing_anonymous_activity_backfills_the_last_login() {
    let output = run(StitchConfig::default());

    // c1's final anonymous hit lands after user-1-2's login window opened,
    // so it is attributed to user-1-2 by backfill, not to the fallback.
    let trailing = output
        .events
        .iter()
        .find(|e| e.visitor_id == "c1" && e.hit_time == at(40))
        .unwrap();
    assert_eq!(trailing.id_group, 2);
    assert_eq!(trailing.stitched_id, "user-1-2");
}

#[test]
fn loners_without_logins_keep_their_own_identity() {
    let output = run(StitchConfig::default());

    for i in 7..=10 {
        let cookie = format!("c{i}");
        let events: Vec<_> = output.events.iter().filter(|e| e.visitor_id == cookie).collect();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.stitched_id == cookie));
    }
}

#[test]
fn reruns_and_worker_counts_do_not_change_output() {
    let sequential = run(StitchConfig::default());
    let again = run(StitchConfig::default());
    assert_eq!(sequential, again);

    let parallel = run(StitchConfig { workers: 4, queue_capacity: 3, ..Default::default() });
    assert_eq!(parallel, sequential);

    let lenient = run(StitchConfig { strict_mode: false, ..Default::default() });
    assert_eq!(lenient.events, sequential.events);
    assert_eq!(lenient.stats.orphan_fallbacks, 0);
}

#[test]
fn stitched_events_round_trip_through_json() {
    let output = run(StitchConfig::default());

    let text = serde_json::to_string(&output.events).unwrap();
    let back: Vec<stitchline::StitchedEvent> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, output.events);

    // The audit artifacts serialize too, for callers that cache them.
    serde_json::to_string(&output.eligibility).unwrap();
    serde_json::to_string(&output.lookup).unwrap();
    serde_json::to_string(&output.stats).unwrap();
}
