use std::fmt;

use log::{debug, trace};

use crate::recency;
use crate::trace::{AccessKind, TraceAccess};

/// Significant address bits. The top bit of an address is ignored.
pub const ADDRESS_BITS: u32 = 63;
const ADDRESS_MASK: u64 = u64::MAX >> (u64::BITS - ADDRESS_BITS);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("number of set index bits must be at least 1")]
    ZeroSetIndexBits,
    #[error("number of lines per set must be at least 1")]
    ZeroLinesPerSet,
    #[error("number of block offset bits must be at least 1")]
    ZeroBlockOffsetBits,
    #[error(
        "{set_index_bits} set index bits and {block_offset_bits} block offset bits leave no tag bits in a 63-bit address"
    )]
    AddressTooNarrow {
        set_index_bits: u32,
        block_offset_bits: u32,
    },
    #[error("{sets} sets of {lines_per_set} lines exceed the addressable line count")]
    TooManyLines { sets: u64, lines_per_set: usize },
}

/// Cache geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    set_index_bits: u32,
    lines_per_set: usize,
    block_offset_bits: u32,
}

impl CacheConfig {
    pub fn new(
        set_index_bits: u32,
        lines_per_set: usize,
        block_offset_bits: u32,
    ) -> Result<Self, ConfigError> {
        if set_index_bits == 0 {
            return Err(ConfigError::ZeroSetIndexBits);
        }
        if lines_per_set == 0 {
            return Err(ConfigError::ZeroLinesPerSet);
        }
        if block_offset_bits == 0 {
            return Err(ConfigError::ZeroBlockOffsetBits);
        }
        if set_index_bits.saturating_add(block_offset_bits) >= ADDRESS_BITS {
            return Err(ConfigError::AddressTooNarrow {
                set_index_bits,
                block_offset_bits,
            });
        }
        let too_many = || ConfigError::TooManyLines {
            sets: 1u64 << set_index_bits,
            lines_per_set,
        };
        let sets = usize::try_from(1u64 << set_index_bits).map_err(|_| too_many())?;
        sets.checked_mul(lines_per_set).ok_or_else(too_many)?;
        Ok(Self {
            set_index_bits,
            lines_per_set,
            block_offset_bits,
        })
    }

    pub fn set_index_bits(&self) -> u32 {
        self.set_index_bits
    }

    pub fn lines_per_set(&self) -> usize {
        self.lines_per_set
    }

    pub fn block_offset_bits(&self) -> u32 {
        self.block_offset_bits
    }

    pub fn num_sets(&self) -> usize {
        1 << self.set_index_bits
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> u64 {
        1 << self.block_offset_bits
    }

    pub fn set_index(&self, address: u64) -> usize {
        let mask = (1u64 << self.set_index_bits) - 1;
        (((address & ADDRESS_MASK) >> self.block_offset_bits) & mask) as usize
    }

    pub fn tag(&self, address: u64) -> u64 {
        (address & ADDRESS_MASK) >> (self.set_index_bits + self.block_offset_bits)
    }
}

/// Classification of a single access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Hit,
    /// Modify hitting on both its load and its store.
    HitHit,
    Miss,
    /// Modify missing on its load, then hitting on its store.
    MissHit,
    MissEvict,
    MissEvictHit,
}

impl Outcome {
    pub fn hits(self) -> u64 {
        match self {
            Outcome::HitHit => 2,
            Outcome::Hit | Outcome::MissHit | Outcome::MissEvictHit => 1,
            Outcome::Miss | Outcome::MissEvict => 0,
        }
    }

    pub fn misses(self) -> u64 {
        match self {
            Outcome::Hit | Outcome::HitHit => 0,
            Outcome::Miss | Outcome::MissHit | Outcome::MissEvict | Outcome::MissEvictHit => 1,
        }
    }

    pub fn evictions(self) -> u64 {
        match self {
            Outcome::MissEvict | Outcome::MissEvictHit => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Hit => "hit",
            Outcome::HitHit => "hit hit",
            Outcome::Miss => "miss",
            Outcome::MissHit => "miss hit",
            Outcome::MissEvict => "miss eviction",
            Outcome::MissEvictHit => "miss eviction hit",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn record(&mut self, outcome: Outcome) {
        self.hits += outcome.hits();
        self.misses += outcome.misses();
        self.evictions += outcome.evictions();
    }

    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        if self.accesses() == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses() as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{} misses:{} evictions:{}",
            self.hits, self.misses, self.evictions
        )
    }
}

/// Tag metadata of one cache line slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub(crate) tag: u64,
    pub(crate) valid: bool,
    pub(crate) rank: usize,
}

impl Line {
    pub fn tag(&self) -> Option<u64> {
        self.valid.then_some(self.tag)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Set-associative cache holding tags only.
///
/// All lines live in one arena of `num_sets * lines_per_set` slots. Set `i`
/// occupies the slots `i * lines_per_set .. (i + 1) * lines_per_set`.
#[derive(Debug, Clone)]
pub struct Cache {
    config: CacheConfig,
    lines: Vec<Line>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let num_lines = config.num_sets() * config.lines_per_set();
        debug!(
            "cache: s={} E={} b={} ({} sets, {} byte blocks)",
            config.set_index_bits(),
            config.lines_per_set(),
            config.block_offset_bits(),
            config.num_sets(),
            config.block_size()
        );
        Self {
            config,
            lines: vec![Line::default(); num_lines],
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Lines of the set at `index`.
    ///
    /// # Panics
    /// If `index` is not below the number of sets.
    pub fn set(&self, index: usize) -> &[Line] {
        let ways = self.config.lines_per_set();
        &self.lines[index * ways..(index + 1) * ways]
    }

    fn set_mut(&mut self, index: usize) -> &mut [Line] {
        let ways = self.config.lines_per_set();
        &mut self.lines[index * ways..(index + 1) * ways]
    }

    /// Classifies one access and updates the selected set.
    ///
    /// # Panics
    /// If a full set has no least recently used line, which means the line
    /// rankings of that set are corrupt.
    pub fn access(&mut self, kind: AccessKind, address: u64) -> Outcome {
        let set_index = self.config.set_index(address);
        let tag = self.config.tag(address);
        let modify = kind == AccessKind::Modify;
        let set = self.set_mut(set_index);

        let outcome = if let Some(way) = set.iter().position(|line| line.valid && line.tag == tag)
        {
            recency::touch(set, way);
            if modify { Outcome::HitHit } else { Outcome::Hit }
        } else if let Some(way) = set.iter().position(|line| !line.valid) {
            set[way].valid = true;
            set[way].tag = tag;
            recency::touch(set, way);
            if modify { Outcome::MissHit } else { Outcome::Miss }
        } else if let Some(way) = recency::victim(set) {
            set[way].tag = tag;
            recency::touch(set, way);
            if modify {
                Outcome::MissEvictHit
            } else {
                Outcome::MissEvict
            }
        } else {
            panic!("set {set_index} is full but has no least recently used line: {set:?}");
        };

        debug_assert!(
            recency::is_ordered(set),
            "set {set_index} lost its recency order: {set:?}"
        );
        trace!("{kind} {address:#x} -> set {set_index} tag {tag:#x}: {outcome}");
        outcome
    }

    /// Replays `trace` and returns the totals.
    pub fn run_trace(&mut self, trace: &[TraceAccess]) -> CacheStats {
        self.replay(trace, |_, _| {})
    }

    /// Replays `trace`, reporting every access with its outcome to `observe`.
    pub fn replay<F>(&mut self, trace: &[TraceAccess], mut observe: F) -> CacheStats
    where
        F: FnMut(&TraceAccess, Outcome),
    {
        let mut stats = CacheStats::default();
        for access in trace {
            let outcome = self.access(access.kind, access.address);
            stats.record(outcome);
            observe(access, outcome);
        }
        stats
    }
}
