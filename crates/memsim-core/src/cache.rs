//! Two-level set-associative cache model.
//!
//! Allocation and deallocation traffic generates one simulated access
//! per touched block, keyed by the block's starting offset. L1 is
//! checked first; on a miss the lookup falls through to L2, and the
//! line is promoted into L1 on an L2 hit or installed in both levels on
//! a double miss. Replacement is strict LRU within each set, ties
//! broken by lowest line index.

/// Bytes per cache line at both levels.
pub const LINE_SIZE: usize = 32;
/// L1 geometry: 8 sets, 2-way.
pub const L1_SETS: usize = 8;
pub const L1_WAYS: usize = 2;
/// L2 geometry: 16 sets, 4-way.
pub const L2_SETS: usize = 16;
pub const L2_WAYS: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct CacheLine {
    valid: bool,
    tag: usize,
    /// Monotonic timestamp of the last touch, for LRU ordering.
    recency: u64,
}

/// Counter snapshot for one cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub name: &'static str,
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hits over accesses, 0 when the level was never touched.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }
}

/// One set-associative cache level.
#[derive(Debug, Clone)]
pub struct CacheLevel {
    name: &'static str,
    num_sets: usize,
    ways: usize,
    sets: Vec<Vec<CacheLine>>,
    clock: u64,
    accesses: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheLevel {
    fn new(name: &'static str, num_sets: usize, ways: usize) -> Self {
        Self {
            name,
            num_sets,
            ways,
            sets: vec![vec![CacheLine::default(); ways]; num_sets],
            clock: 0,
            accesses: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn set_index(&self, addr: usize) -> usize {
        (addr / LINE_SIZE) % self.num_sets
    }

    fn tag(&self, addr: usize) -> usize {
        (addr / LINE_SIZE) / self.num_sets
    }

    /// Looks up `addr`, counting a hit or miss. A hit refreshes the
    /// line's recency.
    fn lookup(&mut self, addr: usize) -> bool {
        self.accesses += 1;
        self.clock += 1;
        let set = self.set_index(addr);
        let tag = self.tag(addr);
        for line in &mut self.sets[set] {
            if line.valid && line.tag == tag {
                line.recency = self.clock;
                self.hits += 1;
                return true;
            }
        }
        self.misses += 1;
        false
    }

    /// Installs `addr` with fresh recency, evicting the LRU line of the
    /// set when no invalid slot remains.
    fn fill(&mut self, addr: usize) {
        self.clock += 1;
        let set = self.set_index(addr);
        let tag = self.tag(addr);

        let victim = match self.sets[set].iter().position(|l| !l.valid) {
            Some(empty) => empty,
            None => {
                self.evictions += 1;
                self.lru_victim(set)
            }
        };
        self.sets[set][victim] = CacheLine {
            valid: true,
            tag,
            recency: self.clock,
        };
    }

    /// Lowest-recency line; the strict comparison breaks ties toward
    /// the lowest line index.
    fn lru_victim(&self, set: usize) -> usize {
        let mut victim = 0;
        for way in 1..self.ways {
            if self.sets[set][way].recency < self.sets[set][victim].recency {
                victim = way;
            }
        }
        victim
    }

    /// Whether `addr` currently resides in this level.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        let set = self.set_index(addr);
        let tag = self.tag(addr);
        self.sets[set].iter().any(|l| l.valid && l.tag == tag)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name,
            accesses: self.accesses,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

/// Where an access was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    L1Hit,
    L2Hit,
    Miss,
}

/// The L1 + L2 hierarchy.
#[derive(Debug, Clone)]
pub struct CacheHierarchy {
    l1: CacheLevel,
    l2: CacheLevel,
}

impl CacheHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            l1: CacheLevel::new("L1", L1_SETS, L1_WAYS),
            l2: CacheLevel::new("L2", L2_SETS, L2_WAYS),
        }
    }

    /// Runs one simulated access against the hierarchy.
    pub fn access(&mut self, addr: usize) -> AccessOutcome {
        if self.l1.lookup(addr) {
            return AccessOutcome::L1Hit;
        }
        if self.l2.lookup(addr) {
            self.l1.fill(addr);
            return AccessOutcome::L2Hit;
        }
        self.l2.fill(addr);
        self.l1.fill(addr);
        AccessOutcome::Miss
    }

    #[must_use]
    pub fn l1(&self) -> &CacheLevel {
        &self.l1
    }

    #[must_use]
    pub fn l2(&self) -> &CacheLevel {
        &self.l2
    }
}

impl Default for CacheHierarchy {
    fn default() -> Self {
        Self::new()
    }
}
