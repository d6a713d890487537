// Skip list: insert, lookup and ordered iteration.

use lsm_engine::memtable::skiplist::SkipList;

// =============================================================================
// Test 1: Insert one key, get it back
// =============================================================================
#[test]
fn insert_one_key_get_it_back() {
    let mut sl = SkipList::new();
    sl.insert(b"hello".to_vec(), b"world".to_vec());
    assert_eq!(sl.get(b"hello"), Some(&b"world".to_vec()));
}

// =============================================================================
// Test 2: Duplicate key overwrites, len stays 1
// =============================================================================
#[test]
fn insert_duplicate_key_overwrites() {
    let mut sl = SkipList::new();
    sl.insert(b"key".to_vec(), b"old".to_vec());
    let previous = sl.insert(b"key".to_vec(), b"new".to_vec());

    assert_eq!(previous, Some(b"old".to_vec()));
    assert_eq!(sl.get(b"key"), Some(&b"new".to_vec()));
    assert_eq!(sl.len(), 1);
}

// =============================================================================
// Test 3: Missing keys return None
// =============================================================================
#[test]
fn get_nonexistent_key_returns_none() {
    let mut sl = SkipList::new();
    sl.insert(b"b".to_vec(), 1);
    assert_eq!(sl.get(b"a"), None);
    assert_eq!(sl.get(b"c"), None);
    assert_eq!(sl.get(b"bb"), None);
}

// =============================================================================
// Test 4: 1000 keys inserted out of order come back sorted
// =============================================================================
#[test]
fn iteration_is_sorted_regardless_of_insert_order() {
    let mut sl = SkipList::new();
    // 7 is coprime with 1000, so this visits every i exactly once, shuffled.
    for i in 0..1000u32 {
        let n = (i * 7) % 1000;
        sl.insert(format!("key_{:05}", n).into_bytes(), n);
    }

    assert_eq!(sl.len(), 1000);
    let values: Vec<u32> = sl.iter().map(|(_, v)| *v).collect();
    let expected: Vec<u32> = (0..1000).collect();
    assert_eq!(values, expected);

    for i in 0..1000u32 {
        assert_eq!(sl.get(format!("key_{:05}", i).as_bytes()), Some(&i));
    }
}

// =============================================================================
// Test 5: Empty list iterates nothing
// =============================================================================
#[test]
fn empty_skiplist_iterates_nothing() {
    let sl: SkipList<u32> = SkipList::new();
    assert!(sl.is_empty());
    assert_eq!(sl.iter().count(), 0);
    assert_eq!(sl.range_from(b"").count(), 0);
}

// =============================================================================
// Test 6: range_from starts at the first key >= target
// =============================================================================
#[test]
fn range_from_starts_at_lower_bound() {
    let mut sl = SkipList::new();
    for key in ["apple", "banana", "cherry", "date"] {
        sl.insert(key.as_bytes().to_vec(), ());
    }

    let keys = |from: &[u8]| -> Vec<Vec<u8>> {
        sl.range_from(from).map(|(k, _)| k.to_vec()).collect()
    };

    assert_eq!(keys(b"banana"), vec![b"banana".to_vec(), b"cherry".to_vec(), b"date".to_vec()]);
    assert_eq!(keys(b"c"), vec![b"cherry".to_vec(), b"date".to_vec()]);
    assert_eq!(keys(b"e"), Vec::<Vec<u8>>::new());
    assert_eq!(keys(b"").len(), 4);
}

// =============================================================================
// Test 7: seek / successor walk the same order as iter
// =============================================================================
#[test]
fn seek_and_successor_walk_level_zero() {
    let mut sl = SkipList::new();
    for key in ["c", "a", "b"] {
        sl.insert(key.as_bytes().to_vec(), key.to_string());
    }

    let mut walked = Vec::new();
    let mut node = sl.seek(b"");
    while let Some(n) = node {
        walked.push(sl.entry(n).1.clone());
        node = sl.successor(n);
    }
    assert_eq!(walked, vec!["a", "b", "c"]);
}
