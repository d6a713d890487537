// Several threads sharing one engine.

use std::sync::Arc;
use std::thread;

use lsm_engine::{DB, Options};
use tempfile::tempdir;

// =============================================================================
// Test 1: Writers on disjoint keys, small threshold → all writes visible
// =============================================================================
#[test]
fn parallel_writers() {
    let dir = tempdir().unwrap();
    let db = Arc::new(DB::open(dir.path(), Options::default().flush_threshold(256)).unwrap());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..250u32 {
                    let key = format!("t{t}_{:04}", i);
                    db.put(key.as_bytes(), &i.to_be_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records: Vec<_> = db.range(b"").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1000);
    for pair in records.windows(2) {
        assert!(pair[0].0 < pair[1].0);
    }
    assert_eq!(db.get(b"t3_0249").unwrap(), Some(249u32.to_be_bytes().to_vec()));
}

// =============================================================================
// Test 2: Readers scan while a writer flushes and compacts
// =============================================================================
// Every scan must be sorted and see each fixed key exactly once.
#[test]
fn readers_during_flush_and_compaction() {
    let dir = tempdir().unwrap();
    let db = Arc::new(DB::open(dir.path(), Options::default().flush_threshold(512)).unwrap());
    for i in 0..100u32 {
        db.put(format!("fixed_{:03}", i).as_bytes(), b"stable").unwrap();
    }

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 0..500u32 {
                db.put(format!("churn_{:04}", i % 50).as_bytes(), &i.to_be_bytes()).unwrap();
                if i % 100 == 99 {
                    db.compact().unwrap();
                }
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..20 {
                    let records: Vec<_> = db.range(b"fixed_").unwrap().map(|r| r.unwrap()).collect();
                    for pair in records.windows(2) {
                        assert!(pair[0].0 < pair[1].0);
                    }
                    let fixed = records.iter().filter(|(k, _)| k.starts_with(b"fixed_")).count();
                    assert_eq!(fixed, 100);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(db.get(b"churn_0049").unwrap(), Some(499u32.to_be_bytes().to_vec()));
}
