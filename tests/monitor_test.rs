//! Tests for the performance monitor.

use std::time::Duration;

use tessera::{MonitorConfig, PerformanceMonitor};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn monitor_config_defaults() {
    let config = MonitorConfig::default();
    assert_eq!(config.capacity, 100);
    assert_eq!(config.slow_threshold, Duration::from_secs(3));
    assert_eq!(config.slow_call_limit, 20);
}

#[test]
fn empty_monitor_aggregates() {
    let monitor = PerformanceMonitor::with_defaults();
    assert!(monitor.is_empty());
    assert_eq!(monitor.cache_hit_rate(), 0.0);
    assert_eq!(monitor.average_duration("analyze_reflection"), None);
    assert!(monitor.slow_calls().is_empty());
}

#[test]
fn history_is_bounded_oldest_first() {
    let monitor = PerformanceMonitor::new(MonitorConfig::new().capacity(3));
    for i in 0..5 {
        monitor.record(&format!("f{i}"), ms(10), false, true);
    }
    let names: Vec<String> = monitor
        .metrics()
        .into_iter()
        .map(|m| m.function_name)
        .collect();
    assert_eq!(names, vec!["f2", "f3", "f4"]);
}

#[test]
fn cache_hit_rate_and_success_rate() {
    let monitor = PerformanceMonitor::with_defaults();
    monitor.record("suggest_goal", ms(5), true, true);
    monitor.record("suggest_goal", ms(5), false, true);
    monitor.record("suggest_goal", ms(5), false, false);
    monitor.record("suggest_goal", ms(5), true, true);
    assert_eq!(monitor.cache_hit_rate(), 0.5);
    assert_eq!(monitor.success_rate(), 0.75);
}

#[test]
fn averages_per_function() {
    let monitor = PerformanceMonitor::with_defaults();
    monitor.record("a", ms(100), false, true);
    monitor.record("a", ms(300), false, true);
    monitor.record("b", ms(50), false, true);

    assert_eq!(monitor.average_duration("a"), Some(ms(200)));
    let averages = monitor.averages();
    assert_eq!(averages.len(), 2);
    assert_eq!(averages["b"], ms(50));
}

#[test]
fn slow_calls_newest_first_and_bounded() {
    let monitor = PerformanceMonitor::new(
        MonitorConfig::new()
            .slow_threshold(ms(100))
            .slow_call_limit(2),
    );
    monitor.record("fast", ms(10), false, true);
    monitor.record("slow1", ms(150), false, true);
    monitor.record("slow2", ms(100), false, true);
    monitor.record("slow3", ms(500), false, false);

    let slow: Vec<String> = monitor
        .slow_calls()
        .into_iter()
        .map(|m| m.function_name)
        .collect();
    assert_eq!(slow, vec!["slow3", "slow2"]);
}

#[test]
fn summary_and_clear() {
    let monitor = PerformanceMonitor::with_defaults();
    monitor.record("generate_mantra", ms(20), true, true);
    let summary = monitor.summary();
    assert_eq!(summary.total_calls, 1);
    assert_eq!(summary.cache_hit_rate, 1.0);
    assert!(summary.average_durations.contains_key("generate_mantra"));

    monitor.clear();
    assert!(monitor.is_empty());
}

#[test]
fn zero_capacity_keeps_nothing() {
    let monitor = PerformanceMonitor::new(MonitorConfig::new().capacity(0));
    monitor.record("a", ms(1), false, true);
    assert!(monitor.is_empty());
}
