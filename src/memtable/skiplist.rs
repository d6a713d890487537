use rand::Rng;

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// A single node in the skip list.
///
/// Each node has `height` forward pointers. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
#[derive(Debug, Clone)]
struct SkipNode<V> {
    key: Vec<u8>,
    value: V,
    /// Indices into `SkipList::nodes`, one per level of this node.
    forward: Vec<Option<usize>>,
}

/// A probabilistic sorted map from byte keys to `V`.
///
/// Nodes live in an arena (`Vec`) and link to each other by index, so the
/// whole structure is `Clone` and needs no unsafe code. Entries are never
/// removed; deletes are modelled one level up as tombstone values.
///
/// Average case: O(log n) insert, O(log n) lookup, O(n) iteration.
#[derive(Debug, Clone)]
pub struct SkipList<V> {
    /// Forward pointers of the head sentinel.
    head: [Option<usize>; MAX_HEIGHT],
    nodes: Vec<SkipNode<V>>,
    /// Current max level in use.
    height: usize,
}

impl<V> Default for SkipList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SkipList<V> {
    /// Create a new empty skip list.
    pub fn new() -> Self {
        SkipList {
            head: [None; MAX_HEIGHT],
            nodes: Vec::new(),
            height: 1,
        }
    }

    /// Insert a key-value pair. Overwrites if key already exists and
    /// returns the replaced value.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Generate a random height for the new node
    ///   3. Splice into the list at each level up to the node's height
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> Option<V> {
        let preds = self.find_predecessors(&key);

        if let Some(next) = self.next_at(preds[0], 0) {
            if self.nodes[next].key == key {
                return Some(std::mem::replace(&mut self.nodes[next].value, value));
            }
        }

        let height = random_height();
        // Levels above the old height have the head as predecessor, which
        // `preds` already encodes as None.
        self.height = self.height.max(height);

        let idx = self.nodes.len();
        let forward = (0..height)
            .map(|level| self.next_at(preds[level], level))
            .collect();
        self.nodes.push(SkipNode { key, value, forward });

        for (level, pred) in preds.iter().enumerate().take(height) {
            match pred {
                None => self.head[level] = Some(idx),
                Some(p) => self.nodes[*p].forward[level] = Some(idx),
            }
        }
        None
    }

    /// Look up a key. Returns the value if found.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let node = self.seek(key)?;
        let node = &self.nodes[node];
        (node.key == key).then_some(&node.value)
    }

    /// Position of the first entry with key >= `key`.
    pub fn seek(&self, key: &[u8]) -> Option<usize> {
        let preds = self.find_predecessors(key);
        self.next_at(preds[0], 0)
    }

    /// Position following `node` on level 0.
    pub fn successor(&self, node: usize) -> Option<usize> {
        self.nodes[node].forward[0]
    }

    /// Key and value stored at a position returned by `seek`/`successor`.
    pub fn entry(&self, node: usize) -> (&[u8], &V) {
        let node = &self.nodes[node];
        (&node.key, &node.value)
    }

    /// Number of entries in the skip list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the skip list is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all entries in sorted order.
    pub fn iter(&self) -> SkipListIterator<'_, V> {
        SkipListIterator {
            list: self,
            current: self.head[0],
        }
    }

    /// Iterate over entries with key >= `from`, in sorted order.
    pub fn range_from(&self, from: &[u8]) -> SkipListIterator<'_, V> {
        SkipListIterator {
            list: self,
            current: self.seek(from),
        }
    }

    fn next_at(&self, node: Option<usize>, level: usize) -> Option<usize> {
        match node {
            None => self.head[level],
            Some(idx) => self.nodes[idx].forward[level],
        }
    }

    /// For every level, the last node whose key is < `key` (None = head).
    fn find_predecessors(&self, key: &[u8]) -> [Option<usize>; MAX_HEIGHT] {
        let mut preds = [None; MAX_HEIGHT];
        let mut current = None;
        for level in (0..self.height).rev() {
            while let Some(next) = self.next_at(current, level) {
                if self.nodes[next].key.as_slice() < key {
                    current = Some(next);
                } else {
                    break;
                }
            }
            preds[level] = current;
        }
        preds
    }
}

/// Generate a random level for a new node.
/// Each extra level has a 1/4 probability (LevelDB uses 1/4, not 1/2).
fn random_height() -> usize {
    let mut rng = rand::thread_rng();
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen_ratio(1, 4) {
        height += 1;
    }
    height
}

/// Iterator over skip list entries in sorted order.
///
/// Simply follows level 0 forward pointers. Level 0 is a sorted linked list
/// containing every entry.
pub struct SkipListIterator<'a, V> {
    list: &'a SkipList<V>,
    current: Option<usize>,
}

impl<'a, V> Iterator for SkipListIterator<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.list.successor(node);
        Some(self.list.entry(node))
    }
}
