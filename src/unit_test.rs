use crate::cache::entry::EntryId;
use crate::cache::expiry_list::ExpiryList;
use crate::cache::policy::TouchPolicy;
use crate::utils::ExpiryError;
use log::debug;
use std::time::Duration;

// CMD TO RUN TESTS W/ CLEAR DEBUG OUTPUT
// $ RUST_LOG=debug cargo test unit --  --nocapture --test-threads=1

// Initialize the logger once for all tests
fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn keys(list: &ExpiryList<&'static str, Duration>) -> Vec<&'static str> {
    list.iter().map(|(_, key, _)| *key).collect()
}

fn three_entry_list() -> (ExpiryList<&'static str, Duration>, EntryId, EntryId, EntryId) {
    let mut list = ExpiryList::new(secs(60));
    let n1 = list.insert("node1", secs(1));
    let n2 = list.insert("node2", secs(2));
    let n3 = list.insert("node3", secs(3));
    (list, n1, n2, n3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_links_in_time_order() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        assert!(list.oldest().is_none());
        assert!(list.latest().is_none());

        let node1 = list.insert("node1", secs(0));
        assert_eq!(list.oldest(), Some(node1));
        assert_eq!(list.latest(), Some(node1));
        assert!(list.next(node1).is_none());
        assert!(list.prev(node1).is_none());

        let node2 = list.insert("node2", secs(2));
        assert_eq!(list.oldest(), Some(node1));
        assert_eq!(list.latest(), Some(node2));
        assert_eq!(list.next(node1), Some(node2));
        assert_eq!(list.prev(node2), Some(node1));

        // lands between the two
        let node3 = list.insert("node3", secs(1));
        assert_eq!(list.oldest(), Some(node1));
        assert_eq!(list.latest(), Some(node2));
        assert_eq!(list.next(node1), Some(node3));
        assert_eq!(list.prev(node3), Some(node1));
        assert_eq!(list.next(node3), Some(node2));
        assert_eq!(list.prev(node2), Some(node3));
        assert!(list.prev(node1).is_none());
        assert!(list.next(node2).is_none());
        assert_eq!(keys(&list), vec!["node1", "node3", "node2"]);
        list.verify().unwrap();
    }

    #[test]
    fn test_insert_older_than_oldest_prepends() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let b = list.insert("b", secs(5));
        let a = list.insert("a", secs(3));
        assert_eq!(list.oldest(), Some(a));
        assert_eq!(list.latest(), Some(b));
        assert_eq!(list.next(a), Some(b));
        list.verify().unwrap();
    }

    #[test]
    fn test_insert_equal_timestamps_keep_insertion_order() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        list.insert("a", secs(1));
        list.insert("b", secs(3));
        list.insert("c", secs(1));
        list.insert("d", secs(3));
        list.insert("e", secs(1));
        assert_eq!(keys(&list), vec!["a", "c", "e", "b", "d"]);
        list.verify().unwrap();
    }

    #[test]
    fn test_iter_runs_both_ways() {
        init_logger();
        let (list, _, _, _) = three_entry_list();
        let backward: Vec<_> = list.iter().rev().map(|(_, key, _)| *key).collect();
        assert_eq!(backward, vec!["node3", "node2", "node1"]);
        assert_eq!(list.iter().len(), 3);
    }

    #[test]
    fn test_delete_head_middle_tail() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let only = list.insert("node1", secs(0));
        assert_eq!(list.delete(only), Some("node1"));
        assert!(list.oldest().is_none());
        assert!(list.latest().is_none());
        assert!(list.is_empty());

        let (mut list, n1, n2, n3) = three_entry_list();
        list.delete(n1);
        assert_eq!(list.oldest(), Some(n2));
        assert_eq!(list.latest(), Some(n3));
        assert_eq!(list.next(n2), Some(n3));
        assert_eq!(list.prev(n3), Some(n2));
        assert!(list.prev(n2).is_none());
        list.verify().unwrap();

        let (mut list, n1, n2, n3) = three_entry_list();
        list.delete(n2);
        assert_eq!(list.oldest(), Some(n1));
        assert_eq!(list.latest(), Some(n3));
        assert_eq!(list.next(n1), Some(n3));
        assert_eq!(list.prev(n3), Some(n1));
        list.verify().unwrap();

        let (mut list, n1, n2, n3) = three_entry_list();
        list.delete(n3);
        assert_eq!(list.oldest(), Some(n1));
        assert_eq!(list.latest(), Some(n2));
        assert_eq!(list.next(n1), Some(n2));
        assert_eq!(list.prev(n2), Some(n1));
        assert!(list.next(n2).is_none());
        list.verify().unwrap();
    }

    #[test]
    fn test_deleted_entry_is_gone() {
        init_logger();
        let (mut list, _, n2, _) = three_entry_list();
        list.delete(n2);
        assert!(!list.contains(n2));
        assert!(list.next(n2).is_none());
        assert!(list.prev(n2).is_none());
        assert!(list.key(n2).is_none());
        assert!(list.iter().all(|(id, _, _)| id != n2));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_delete_twice_is_a_noop() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        assert_eq!(list.delete(a), Some("a"));
        assert_eq!(list.delete(a), None);
        assert!(list.oldest().is_none());
        assert!(list.latest().is_none());
        list.verify().unwrap();
    }

    #[test]
    fn test_reused_slot_does_not_revive_old_handle() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        list.delete(a);
        let b = list.insert("b", secs(1));
        assert_ne!(a, b);
        assert!(!list.contains(a));
        assert_eq!(list.delete(a), None);
        assert_eq!(list.key(b), Some(&"b"));
    }

    #[test]
    fn test_reposition_cases() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let node1 = list.insert("node1", secs(0));
        list.touch(node1, secs(2));
        assert_eq!(list.timestamp(node1), Some(secs(2)));
        assert_eq!(list.oldest(), Some(node1));
        assert_eq!(list.latest(), Some(node1));
        assert!(list.next(node1).is_none());
        assert!(list.prev(node1).is_none());

        // latest moves further ahead
        let (mut list, n1, n2, n3) = three_entry_list();
        list.touch(n3, secs(10));
        assert_eq!(list.latest(), Some(n3));
        assert_eq!(list.oldest(), Some(n1));
        assert_eq!(list.next(n1), Some(n2));
        assert_eq!(list.next(n2), Some(n3));

        // middle becomes latest
        let (mut list, n1, n2, n3) = three_entry_list();
        list.touch(n2, secs(10));
        assert_eq!(list.latest(), Some(n2));
        assert_eq!(list.oldest(), Some(n1));
        assert_eq!(list.next(n1), Some(n3));
        assert_eq!(list.prev(n3), Some(n1));
        assert_eq!(list.next(n3), Some(n2));
        assert_eq!(list.prev(n2), Some(n3));

        // oldest becomes latest
        let (mut list, n1, n2, n3) = three_entry_list();
        list.touch(n1, secs(10));
        assert_eq!(list.latest(), Some(n1));
        assert_eq!(list.oldest(), Some(n2));
        assert_eq!(list.next(n3), Some(n1));
        assert!(list.prev(n2).is_none());
        assert!(list.next(n1).is_none());

        // equal to the latest timestamp goes after it
        let (mut list, n1, n2, n3) = three_entry_list();
        list.touch(n2, secs(3));
        assert_eq!(list.latest(), Some(n2));
        assert_eq!(list.next(n1), Some(n3));
        assert_eq!(list.next(n3), Some(n2));
        list.verify().unwrap();
    }

    #[test]
    fn test_reposition_moves_back_in_time() {
        init_logger();
        let (mut list, n1, n2, n3) = three_entry_list();
        list.reposition(n3, secs(0));
        assert_eq!(list.oldest(), Some(n3));
        assert_eq!(list.latest(), Some(n2));
        assert_eq!(list.next(n3), Some(n1));
        list.verify().unwrap();

        let (mut list, n1, n2, n3) = three_entry_list();
        list.reposition(n3, secs(1));
        assert_eq!(keys(&list), vec!["node1", "node3", "node2"]);
        assert_eq!(list.prev(n3), Some(n1));
        assert_eq!(list.latest(), Some(n2));
        list.verify().unwrap();
    }

    #[test]
    fn test_promote_makes_entry_latest_and_keeps_others() {
        init_logger();
        let mut list = ExpiryList::with_policy(secs(60), TouchPolicy::PromoteToLatest);
        let a = list.insert("a", secs(0));
        let b = list.insert("b", secs(1));
        let c = list.insert("c", secs(2));
        let d = list.insert("d", secs(3));

        list.touch(b, secs(4));
        assert_eq!(list.latest(), Some(b));
        assert_eq!(keys(&list), vec!["a", "c", "d", "b"]);

        list.touch(a, secs(4));
        assert_eq!(list.latest(), Some(a));
        assert_eq!(list.oldest(), Some(c));
        assert_eq!(keys(&list), vec!["c", "d", "b", "a"]);

        // already the latest
        list.touch(a, secs(5));
        assert_eq!(list.latest(), Some(a));
        assert_eq!(list.prev(a), Some(b));
        assert_eq!(list.next(d), Some(b));
        list.verify().unwrap();
    }

    #[test]
    fn test_promote_rejects_older_timestamp() {
        init_logger();
        let mut list = ExpiryList::with_policy(secs(60), TouchPolicy::PromoteToLatest);
        let a = list.insert("a", secs(0));
        list.insert("b", secs(5));

        let err = list.try_touch(a, secs(3)).unwrap_err();
        debug!("promote error: {}", err);
        assert!(matches!(err, ExpiryError::NonMonotonicTouch { .. }));
        // nothing moved
        assert_eq!(keys(&list), vec!["a", "b"]);
        assert_eq!(list.timestamp(a), Some(secs(0)));
        list.verify().unwrap();
    }

    #[test]
    fn test_promote_latest_may_go_back_to_its_predecessor() {
        init_logger();
        let mut list = ExpiryList::with_policy(secs(60), TouchPolicy::PromoteToLatest);
        let a = list.insert("a", secs(1));
        let b = list.insert("b", secs(5));
        list.promote(b, secs(1));
        assert_eq!(list.latest(), Some(b));
        assert_eq!(list.prev(b), Some(a));
        list.verify().unwrap();
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_promote_with_older_timestamp_panics() {
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        list.insert("b", secs(5));
        list.promote(a, secs(3));
    }

    #[test]
    #[should_panic(expected = "not linked")]
    fn test_touch_on_deleted_entry_panics() {
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        list.delete(a);
        list.touch(a, secs(1));
    }

    #[test]
    fn test_try_touch_on_swept_entry_reports_stale() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        list.sweep(secs(60));
        assert_eq!(list.try_touch(a, secs(61)), Err(ExpiryError::StaleEntry(a)));
    }

    #[test]
    fn test_sweep_cases() {
        init_logger();
        let mut list: ExpiryList<&str, Duration> = ExpiryList::new(secs(60));
        assert!(list.sweep(secs(0)).is_empty());
        assert!(list.oldest().is_none());

        list.insert("node1", secs(0));
        assert!(list.sweep(secs(0)).is_empty());
        assert_eq!(list.sweep(secs(60)), vec!["node1"]);
        assert!(list.oldest().is_none());
        assert!(list.latest().is_none());

        let (mut list, _, n2, n3) = three_entry_list();
        assert_eq!(list.sweep(secs(61)), vec!["node1"]);
        assert_eq!(list.oldest(), Some(n2));
        assert_eq!(list.latest(), Some(n3));
        assert_eq!(list.next(n2), Some(n3));
        assert!(list.prev(n2).is_none());
        assert!(list.sweep(secs(61)).is_empty());

        assert_eq!(list.sweep(secs(63)), vec!["node2", "node3"]);
        assert!(list.is_empty());
        list.verify().unwrap();
    }

    #[test]
    fn test_sweep_ignores_future_timestamps() {
        init_logger();
        let mut list = ExpiryList::new(Duration::ZERO);
        list.insert("now", secs(10));
        list.insert("later", secs(20));
        assert_eq!(list.sweep(secs(10)), vec!["now"]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_scenario_touch_then_sweep() {
        init_logger();
        let mut list = ExpiryList::new(secs(60));
        let a = list.insert("a", secs(0));
        list.insert("b", secs(1));
        list.touch(a, secs(2));
        assert_eq!(keys(&list), vec!["b", "a"]);
        assert_eq!(list.sweep(secs(61)), vec!["b"]);
        assert_eq!(keys(&list), vec!["a"]);
        assert_eq!(list.oldest(), Some(a));
        assert_eq!(list.latest(), Some(a));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        init_logger();
        let (mut list, n1, _, n3) = three_entry_list();
        list.clear();
        assert!(list.is_empty());
        assert!(list.oldest().is_none());
        assert!(!list.contains(n1));
        assert_eq!(list.delete(n3), None);
        list.verify().unwrap();

        let n4 = list.insert("node4", secs(4));
        assert_eq!(list.oldest(), Some(n4));
        list.verify().unwrap();
    }
}
