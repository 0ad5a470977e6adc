// tests/property/watcher_test.rs

//! Property-based tests for response correlation
//! Tests that each line resolves at most one watcher, always the earliest
//! registered one that matches

use mudlink::core::watcher::WatcherRegistry;
use proptest::collection::vec;
use proptest::prelude::*;
use regex::Regex;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_earliest_matching_watcher_resolves(
        words in vec("[a-e]{1,2}", 1..12),
        lines in vec("[a-e ]{0,12}", 1..12),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let registry = WatcherRegistry::new();
            let mut outstanding: Vec<(Regex, _)> = words
                .iter()
                .map(|w| {
                    let re = Regex::new(w).unwrap();
                    let handle = registry.watch(re.clone(), Duration::from_secs(60), None);
                    (re, handle)
                })
                .collect();

            for line in &lines {
                let expected = outstanding.iter().position(|(re, _)| re.is_match(line));
                let consumed = registry.match_line(line);
                assert_eq!(consumed, expected.is_some());

                if let Some(index) = expected {
                    let (re, mut handle) = outstanding.remove(index);
                    let found = re.find(line).unwrap().as_str().to_string();
                    assert_eq!(handle.try_result(), Some(Ok(found)));
                }
                for (_, handle) in outstanding.iter_mut() {
                    assert_eq!(handle.try_result(), None);
                }
                let ids: Vec<u64> = outstanding.iter().map(|(_, h)| h.id()).collect();
                assert_eq!(registry.outstanding_ids(), ids);
            }
        });
    }

    #[test]
    fn test_expiry_removes_exactly_the_overdue(
        timeouts in vec(1u64..100, 1..16),
        elapsed in 0u64..120,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let registry = WatcherRegistry::new();
            let handles: Vec<_> = timeouts
                .iter()
                .map(|t| registry.watch(Regex::new("x").unwrap(), Duration::from_millis(*t), None))
                .collect();

            tokio::time::advance(Duration::from_millis(elapsed)).await;
            let expired = registry.expire_stale();

            let overdue = timeouts.iter().filter(|t| **t <= elapsed).count();
            assert_eq!(expired, overdue);
            assert_eq!(registry.len(), timeouts.len() - overdue);
            for (handle, timeout) in handles.iter().zip(&timeouts) {
                assert_eq!(registry.contains(handle.id()), *timeout > elapsed);
            }
        });
    }
}
