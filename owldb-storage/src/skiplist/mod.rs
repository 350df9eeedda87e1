//! A lock-coupled, lazily-deleted concurrent skip list.
//!
//! Unlike the crossbeam/CAS skip list historically used for this crate's
//! memtable, this variant favours the lazy-synchronization scheme: each
//! node carries its own lock plus `marked`/`fully_linked` flags, and
//! mutators lock predecessors bottom-up after an unlocked traversal,
//! validating before splicing. Range scans take two unlocked passes and
//! only accept the result when both passes agree on keys and per-node
//! modification times.

use owldb_core::{now_ms, Error, Result};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Maximum node height. Levels are `0..HMAX`.
const HMAX: usize = 5;

#[derive(Clone)]
enum NodeKey<K> {
    Head,
    Key(K),
    Tail,
}

impl<K> NodeKey<K> {
    fn rank(&self) -> u8 {
        match self {
            NodeKey::Head => 0,
            NodeKey::Key(_) => 1,
            NodeKey::Tail => 2,
        }
    }

    fn as_key(&self) -> Option<&K> {
        match self {
            NodeKey::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl<K: PartialEq> PartialEq for NodeKey<K> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeKey::Key(a), NodeKey::Key(b)) => a == b,
            _ => self.rank() == other.rank(),
        }
    }
}
impl<K: Eq> Eq for NodeKey<K> {}

impl<K: Ord> PartialOrd for NodeKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl<K: Ord> Ord for NodeKey<K> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        match (self, other) {
            (NodeKey::Key(a), NodeKey::Key(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

pub struct Node<K, V> {
    key: NodeKey<K>,
    value: RwLock<Option<V>>,
    top_level: usize,
    marked: AtomicBool,
    fully_linked: AtomicBool,
    next: Vec<RwLock<Arc<Node<K, V>>>>,
    time: AtomicI64,
    lock: Mutex<()>,
}

impl<K, V> Node<K, V> {
    /// The key of an observable node returned from `find`/`range`. Panics
    /// if called on a sentinel, which callers never see.
    pub fn key(&self) -> &K {
        self.key.as_key().expect("sentinel node exposed to caller")
    }

    pub fn value(&self) -> V
    where
        V: Clone,
    {
        self.value
            .read()
            .clone()
            .expect("observable node missing value")
    }

    pub fn time(&self) -> i64 {
        self.time.load(Ordering::Acquire)
    }
}

/// A concurrent ordered map from `K` to `V`.
pub struct SkipList<K, V> {
    head: Arc<Node<K, V>>,
    tail: Arc<Node<K, V>>,
}

impl<K, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SkipList<K, V> {
    pub fn new() -> Self {
        let tail = Arc::new(Node {
            key: NodeKey::Tail,
            value: RwLock::new(None),
            top_level: HMAX - 1,
            marked: AtomicBool::new(false),
            fully_linked: AtomicBool::new(true),
            next: Vec::new(),
            time: AtomicI64::new(0),
            lock: Mutex::new(()),
        });
        let head_next = (0..HMAX).map(|_| RwLock::new(Arc::clone(&tail))).collect();
        let head = Arc::new(Node {
            key: NodeKey::Head,
            value: RwLock::new(None),
            top_level: HMAX - 1,
            marked: AtomicBool::new(false),
            fully_linked: AtomicBool::new(true),
            next: head_next,
            time: AtomicI64::new(0),
            lock: Mutex::new(()),
        });
        SkipList { head, tail }
    }
}

/// Weighted random height: P(0)=16/31, P(1)=8/31, P(2)=4/31, P(3)=2/31, P(4)=1/31.
fn random_height() -> usize {
    let level: f64 = rand::random();
    if level > 15.0 / 31.0 {
        0
    } else if level > 7.0 / 31.0 {
        1
    } else if level > 3.0 / 31.0 {
        2
    } else if level > 1.0 / 31.0 {
        3
    } else {
        4
    }
}

impl<K: Ord + Clone, V: Clone> SkipList<K, V> {
    fn get_pred_succ(&self, key: &K) -> (Vec<Arc<Node<K, V>>>, Vec<Arc<Node<K, V>>>, Option<usize>) {
        let mut preds = vec![Arc::clone(&self.head); HMAX];
        let mut succs = vec![Arc::clone(&self.tail); HMAX];
        let mut level_found = None;
        let mut pred = Arc::clone(&self.head);

        let mut level = HMAX - 1;
        loop {
            let mut curr = Arc::clone(&*pred.next[level].read());
            while !Arc::ptr_eq(&curr, &self.tail) && curr.key() < key {
                pred = curr;
                curr = Arc::clone(&*pred.next[level].read());
            }
            if level_found.is_none() {
                if let Some(k) = curr.key.as_key() {
                    if k == key {
                        level_found = Some(level);
                    }
                }
            }
            preds[level] = Arc::clone(&pred);
            succs[level] = Arc::clone(&curr);
            if level == 0 {
                break;
            }
            level -= 1;
        }
        (preds, succs, level_found)
    }

    /// Returns an observable node at `key`, if present.
    pub fn find(&self, key: &K) -> Option<Arc<Node<K, V>>> {
        let (_, succs, level_found) = self.get_pred_succ(key);
        let level = level_found?;
        let found = &succs[level];
        if found.fully_linked.load(Ordering::Acquire) && !found.marked.load(Ordering::Acquire) {
            Some(Arc::clone(found))
        } else {
            None
        }
    }

    /// Inserts or updates the value at `key`. `resolve` is invoked with the
    /// current value (if any) while the affected nodes are locked; its
    /// return value becomes the new value, or its error aborts the upsert
    /// leaving the map unchanged.
    pub fn upsert<F>(&self, key: K, mut resolve: F) -> Result<bool>
    where
        F: FnMut(&K, Option<&V>, bool) -> Result<V>,
    {
        let height = random_height();
        loop {
            let (preds, succs, level_found) = self.get_pred_succ(&key);

            if let Some(level) = level_found {
                let found = Arc::clone(&succs[level]);
                if found.marked.load(Ordering::Acquire) {
                    continue;
                }
                let _node_guard = found.lock.lock();
                if found.marked.load(Ordering::Acquire) {
                    continue;
                }

                let mut guards = Vec::new();
                let mut prev: Option<&Arc<Node<K, V>>> = None;
                for pred in preds.iter() {
                    if prev.map_or(true, |p| !Arc::ptr_eq(p, pred)) {
                        guards.push(pred.lock.lock());
                    }
                    prev = Some(pred);
                }

                let mut valid = true;
                for (index, pred) in preds.iter().enumerate() {
                    if !pred.fully_linked.load(Ordering::Acquire) || pred.marked.load(Ordering::Acquire) {
                        valid = false;
                    }
                    if !Arc::ptr_eq(&*pred.next[index].read(), &succs[index]) {
                        valid = false;
                    }
                }
                if !valid {
                    drop(guards);
                    continue;
                }

                let current = found.value.read().clone();
                let new_value = resolve(&key, current.as_ref(), true)?;
                *found.value.write() = Some(new_value);
                found.time.store(now_ms(), Ordering::Release);
                return Ok(true);
            } else {
                let mut guards = Vec::new();
                let mut prev: Option<&Arc<Node<K, V>>> = None;
                for (idx, pred) in preds.iter().enumerate() {
                    if idx > height {
                        break;
                    }
                    if prev.map_or(true, |p| !Arc::ptr_eq(p, pred)) {
                        guards.push(pred.lock.lock());
                    }
                    prev = Some(pred);
                }

                let mut valid = true;
                for index in 0..=height {
                    let pred = &preds[index];
                    if !pred.fully_linked.load(Ordering::Acquire) || pred.marked.load(Ordering::Acquire) {
                        valid = false;
                    }
                    if !Arc::ptr_eq(&*pred.next[index].read(), &succs[index]) {
                        valid = false;
                    }
                }
                if !valid {
                    drop(guards);
                    continue;
                }

                let new_value = resolve(&key, None, false)?;
                let next = (0..=height)
                    .map(|i| RwLock::new(Arc::clone(&succs[i])))
                    .collect();
                let node = Arc::new(Node {
                    key: NodeKey::Key(key.clone()),
                    value: RwLock::new(Some(new_value)),
                    top_level: height,
                    marked: AtomicBool::new(false),
                    fully_linked: AtomicBool::new(false),
                    next,
                    time: AtomicI64::new(now_ms()),
                    lock: Mutex::new(()),
                });
                for i in 0..=height {
                    *preds[i].next[i].write() = Arc::clone(&node);
                }
                node.fully_linked.store(true, Ordering::Release);
                return Ok(true);
            }
        }
    }

    /// Marks and unlinks the node at `key`, returning it if present.
    ///
    /// The node is marked under its own lock exactly once; the lock is
    /// released immediately afterwards (matching the bottom-up predecessor
    /// locking used everywhere else in this type) and safety of the
    /// subsequent splice relies on the same predecessor-validity recheck
    /// that `upsert` uses: once `marked` is set, any racing `upsert` on
    /// this key fails its predecessor check and retries into the
    /// not-found branch instead of reviving the node.
    pub fn delete(&self, key: &K) -> Option<Arc<Node<K, V>>> {
        let mut marked_node: Option<Arc<Node<K, V>>> = None;
        let mut top_level = 0usize;

        loop {
            let (preds, succs, level_found) = self.get_pred_succ(key);
            let level = level_found?;
            let remove = Arc::clone(&succs[level]);

            if marked_node.is_none() {
                if !remove.fully_linked.load(Ordering::Acquire)
                    || remove.marked.load(Ordering::Acquire)
                    || remove.top_level != level
                {
                    return None;
                }
                top_level = remove.top_level;
                {
                    let _guard = remove.lock.lock();
                    if remove.marked.load(Ordering::Acquire) {
                        return None;
                    }
                    remove.marked.store(true, Ordering::Release);
                }
                marked_node = Some(remove);
            }

            let mut guards = Vec::new();
            let mut prev: Option<&Arc<Node<K, V>>> = None;
            for pred in preds.iter() {
                if prev.map_or(true, |p| !Arc::ptr_eq(p, pred)) {
                    guards.push(pred.lock.lock());
                }
                prev = Some(pred);
            }

            let mut valid = true;
            for (index, pred) in preds.iter().enumerate() {
                if !pred.fully_linked.load(Ordering::Acquire) || pred.marked.load(Ordering::Acquire) {
                    valid = false;
                }
                if !Arc::ptr_eq(&*pred.next[index].read(), &succs[index]) {
                    valid = false;
                }
            }
            if !valid {
                drop(guards);
                continue;
            }

            let remove = marked_node.as_ref().expect("marked node set above").clone();
            for level in (0..=top_level).rev() {
                let successor = Arc::clone(&*remove.next[level].read());
                *preds[level].next[level].write() = successor;
            }
            return Some(remove);
        }
    }

    fn first_geq(&self, lo: Option<&K>) -> Arc<Node<K, V>> {
        match lo {
            Some(k) => {
                let (_, succs, _) = self.get_pred_succ(k);
                Arc::clone(&succs[0])
            }
            None => Arc::clone(&*self.head.next[0].read()),
        }
    }

    fn scan_once(&self, lo: Option<&K>, hi: Option<&K>) -> Vec<Arc<Node<K, V>>> {
        let mut out = Vec::new();
        let mut node = self.first_geq(lo);
        while !Arc::ptr_eq(&node, &self.tail) {
            if let Some(h) = hi {
                if node.key() > h {
                    break;
                }
            }
            if node.fully_linked.load(Ordering::Acquire) && !node.marked.load(Ordering::Acquire) {
                out.push(Arc::clone(&node));
            }
            let next = Arc::clone(&*node.next[0].read());
            node = next;
        }
        out
    }

    /// Returns a snapshot-consistent, ascending slice of observable nodes
    /// with `lo <= key <= hi` (either bound `None` meaning unbounded). The
    /// snapshot is obtained by taking two unlocked passes and retrying
    /// until the two passes agree on keys and per-node modification times.
    /// Returns `None` if `cancel` fires before a consistent pass is found.
    pub fn range(
        &self,
        cancel: &owldb_core::CancelToken,
        lo: Option<&K>,
        hi: Option<&K>,
    ) -> Option<Vec<Arc<Node<K, V>>>> {
        if let (Some(l), Some(h)) = (lo, hi) {
            if l > h {
                return None;
            }
        }
        loop {
            let first = self.scan_once(lo, hi);
            if cancel.is_cancelled() {
                return None;
            }
            let second = self.scan_once(lo, hi);
            if first.len() == second.len()
                && first
                    .iter()
                    .zip(second.iter())
                    .all(|(a, b)| a.key() == b.key() && a.time() == b.time())
            {
                return Some(first);
            }
            if cancel.is_cancelled() {
                return None;
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashMap};
    use std::thread;

    proptest! {
        /// Per-key history is monotone: whichever value a key was most
        /// recently upserted with is the value `find` observes, no matter
        /// how many times it was overwritten beforehand.
        #[test]
        fn prop_upsert_then_find_reflects_last_write(
            ops in prop::collection::vec((0i32..50, 0i32..1000), 1..80)
        ) {
            let list: SkipList<i32, i32> = SkipList::new();
            let mut expected = HashMap::new();
            for (k, v) in &ops {
                list.upsert(*k, |_, _, _| Ok(*v)).unwrap();
                expected.insert(*k, *v);
            }
            for (k, v) in expected {
                prop_assert_eq!(list.find(&k).unwrap().value(), v);
            }
        }

        /// `range(lo, hi)` returns exactly the inserted keys within bounds,
        /// strictly ascending.
        #[test]
        fn prop_range_is_sorted_and_bounded(
            keys in prop::collection::hash_set(0i32..500, 0..60),
            a in 0i32..500,
            b in 0i32..500,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let list: SkipList<i32, i32> = SkipList::new();
            for k in &keys {
                list.upsert(*k, |_, _, _| Ok(*k)).unwrap();
            }
            let cancel = owldb_core::CancelToken::new();
            let nodes = list.range(&cancel, Some(&lo), Some(&hi)).unwrap();
            let observed: Vec<i32> = nodes.iter().map(|n| *n.key()).collect();

            let mut prev: Option<i32> = None;
            for &k in &observed {
                prop_assert!(k >= lo && k <= hi);
                if let Some(p) = prev {
                    prop_assert!(k > p);
                }
                prev = Some(k);
            }
            let expected: BTreeSet<i32> = keys.into_iter().filter(|k| *k >= lo && *k <= hi).collect();
            prop_assert_eq!(observed, expected.into_iter().collect::<Vec<_>>());
        }

        /// Under any interleaving of concurrent inserts of distinct keys,
        /// the map contains exactly those keys, in sorted order, once every
        /// insert has completed.
        #[test]
        fn prop_concurrent_distinct_inserts_all_visible(
            keys in prop::collection::hash_set(0i32..2000, 1..40),
        ) {
            let list = Arc::new(SkipList::<i32, i32>::new());
            let handles: Vec<_> = keys
                .iter()
                .copied()
                .map(|k| {
                    let list = Arc::clone(&list);
                    thread::spawn(move || {
                        list.upsert(k, |_, _, _| Ok(k)).unwrap();
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            let cancel = owldb_core::CancelToken::new();
            let nodes = list.range(&cancel, None, None).unwrap();
            let observed: Vec<i32> = nodes.iter().map(|n| *n.key()).collect();
            let mut expected: Vec<i32> = keys.into_iter().collect();
            expected.sort();
            prop_assert_eq!(observed, expected);
        }
    }
}
