//! Resource pool behaviour across threads.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use handset::error::PoolError;
use handset::pool::ResourcePool;

#[test]
fn four_blocks_then_wait_for_release() {
    let pool: ResourcePool<[u8; 32], 4> = ResourcePool::new();
    let mut held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
    assert!(pool.acquire().is_none());

    let (ready_tx, ready_rx) = mpsc::channel();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            ready_tx.send(()).unwrap();
            let changed = pool.wait_for_change(Duration::from_secs(5));
            (changed, pool.acquire().is_some())
        })
    };

    ready_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    pool.release(held.pop().unwrap()).unwrap();

    assert_eq!(waiter.join().unwrap(), (true, true));
    assert_eq!(pool.free_count(), 0);
}

#[test]
fn blocks_are_never_shared() {
    let pool: ResourcePool<u64, 4> = ResourcePool::new();
    let workers: Vec<_> = (0..8u64)
        .map(|n| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(mut block) = pool.acquire_timeout(Duration::from_secs(5)) {
                        *block = n;
                        thread::yield_now();
                        assert_eq!(*block, n);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(pool.free_count(), 4);
}

#[test]
fn foreign_release_is_distinct_failure() {
    let a: ResourcePool<u8, 1> = ResourcePool::new();
    let b: ResourcePool<u8, 1> = ResourcePool::new();
    let block = a.acquire().unwrap();
    assert_eq!(b.release(block), Err(PoolError::ForeignBlock));
    assert_eq!(a.free_count(), 1);
}
