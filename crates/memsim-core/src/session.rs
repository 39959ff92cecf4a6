//! Protocol command processor.
//!
//! A [`Session`] owns the whole simulator state: the active allocator
//! (a tagged mode, flat or buddy), the cache hierarchy, and the
//! terminated flag. It is the sole entry point; commands are parsed,
//! validated against the current mode, executed, and formatted into
//! exactly one response unit each. Sessions are plain values, so
//! independent instances coexist freely in tests.

use crate::alloc::buddy::BuddyAllocator;
use crate::alloc::flat::{FlatAllocator, Strategy};
use crate::alloc::{ArenaStats, Placement};
use crate::block::{BlockId, BlockTable};
use crate::cache::CacheHierarchy;
use crate::error::SimError;

/// A parsed protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    InitMemory(usize),
    InitBuddy(usize),
    SetAllocator(Strategy),
    Malloc(usize),
    Free(BlockId),
    Dump,
    Stats,
    Cache,
    Exit,
}

impl Command {
    /// Parses one protocol line. Blank lines parse to `None` and
    /// produce no response unit.
    pub fn parse(line: &str) -> Result<Option<Self>, SimError> {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Ok(None);
        };

        let cmd = match head {
            "init" => match tokens.next() {
                Some("memory") => Self::InitMemory(parse_positive(tokens.next(), "size")?),
                Some("buddy") => Self::InitBuddy(parse_positive(tokens.next(), "size")?),
                _ => {
                    return Err(SimError::BadArgument(
                        "usage: init memory <n> | init buddy <n>".into(),
                    ));
                }
            },
            "set" => match tokens.next() {
                Some("allocator") => {
                    let name = tokens.next().ok_or_else(|| {
                        SimError::BadArgument(
                            "usage: set allocator <first_fit|best_fit|worst_fit>".into(),
                        )
                    })?;
                    let strategy = Strategy::from_name(name)
                        .ok_or_else(|| SimError::UnknownStrategy(name.to_string()))?;
                    Self::SetAllocator(strategy)
                }
                _ => {
                    return Err(SimError::BadArgument(
                        "usage: set allocator <first_fit|best_fit|worst_fit>".into(),
                    ));
                }
            },
            "malloc" => Self::Malloc(parse_positive(tokens.next(), "size")?),
            "free" => {
                let raw = tokens
                    .next()
                    .ok_or_else(|| SimError::BadArgument("free requires a block id".into()))?;
                let id: BlockId = raw.parse().map_err(|_| {
                    SimError::BadArgument(format!("block id must be a non-negative integer, got `{raw}`"))
                })?;
                Self::Free(id)
            }
            "dump" => Self::Dump,
            "stats" => Self::Stats,
            "cache" => Self::Cache,
            "exit" => Self::Exit,
            other => return Err(SimError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = tokens.next() {
            return Err(SimError::BadArgument(format!(
                "unexpected trailing argument `{extra}`"
            )));
        }
        Ok(Some(cmd))
    }
}

fn parse_positive(token: Option<&str>, what: &str) -> Result<usize, SimError> {
    let raw = token.ok_or_else(|| SimError::BadArgument(format!("missing {what}")))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SimError::BadArgument(format!(
            "{what} must be a positive integer, got `{raw}`"
        ))),
    }
}

/// One response unit: the lines to emit, plus whether the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub exit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            exit: false,
        }
    }

    fn listing(lines: Vec<String>) -> Self {
        Self { lines, exit: false }
    }
}

/// Active allocator, selected at `init` time.
#[derive(Debug, Clone)]
enum Mode {
    Uninitialized,
    Flat(FlatAllocator),
    Buddy(BuddyAllocator),
}

/// A single simulator instance.
#[derive(Debug, Clone)]
pub struct Session {
    mode: Mode,
    cache: CacheHierarchy,
    terminated: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Uninitialized,
            cache: CacheHierarchy::new(),
            terminated: false,
        }
    }

    /// Whether `exit` has been processed. A terminated session accepts
    /// no further commands.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    #[must_use]
    pub fn cache(&self) -> &CacheHierarchy {
        &self.cache
    }

    /// Processes one raw input line into one formatted response unit.
    ///
    /// Returns `None` for blank lines and for lines arriving after
    /// termination; errors are rendered as `error: <TAG>: <detail>`.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        if self.terminated {
            return None;
        }
        match Command::parse(line) {
            Ok(None) => None,
            Ok(Some(cmd)) => match self.execute(cmd) {
                Ok(reply) => Some(reply.lines.join("\n")),
                Err(err) => Some(format!("error: {err}")),
            },
            Err(err) => Some(format!("error: {err}")),
        }
    }

    /// Executes a parsed command against the current state.
    pub fn execute(&mut self, cmd: Command) -> Result<Reply, SimError> {
        match cmd {
            Command::InitMemory(size) => {
                self.mode = Mode::Flat(FlatAllocator::new(size));
                self.cache = CacheHierarchy::new();
                Ok(Reply::line(format!("memory initialized: {size} bytes")))
            }
            Command::InitBuddy(size) => {
                // A rejected size leaves any existing arena untouched.
                let buddy = BuddyAllocator::new(size)?;
                let capacity = buddy.capacity();
                self.mode = Mode::Buddy(buddy);
                self.cache = CacheHierarchy::new();
                Ok(Reply::line(format!(
                    "buddy memory initialized: {capacity} bytes"
                )))
            }
            Command::SetAllocator(strategy) => match &mut self.mode {
                Mode::Uninitialized => Err(SimError::NotInitialized),
                Mode::Buddy(_) => Err(SimError::InvalidMode(
                    "allocation strategies apply to flat mode only".into(),
                )),
                Mode::Flat(flat) => {
                    flat.set_strategy(strategy);
                    Ok(Reply::line(format!("allocator set to {}", strategy.name())))
                }
            },
            Command::Malloc(size) => {
                let placement = match &mut self.mode {
                    Mode::Uninitialized => return Err(SimError::NotInitialized),
                    Mode::Flat(flat) => flat.malloc(size)?,
                    Mode::Buddy(buddy) => buddy.malloc(size)?,
                };
                self.cache.access(placement.offset);
                Ok(Reply::line(format_placement(placement)))
            }
            Command::Free(id) => {
                let offset = match &mut self.mode {
                    Mode::Uninitialized => return Err(SimError::NotInitialized),
                    Mode::Flat(flat) => flat.free(id)?,
                    Mode::Buddy(buddy) => buddy.free(id)?,
                };
                self.cache.access(offset);
                Ok(Reply::line(format!("block {id} freed")))
            }
            Command::Dump => {
                let table = self.active_table()?;
                Ok(Reply::listing(format_dump(table)))
            }
            Command::Stats => {
                let stats = match &self.mode {
                    Mode::Uninitialized => return Err(SimError::NotInitialized),
                    Mode::Flat(flat) => flat.stats(),
                    Mode::Buddy(buddy) => buddy.stats(),
                };
                Ok(Reply::listing(format_stats(&stats)))
            }
            Command::Cache => {
                if matches!(self.mode, Mode::Uninitialized) {
                    return Err(SimError::NotInitialized);
                }
                Ok(Reply::listing(format_cache(&self.cache)))
            }
            Command::Exit => {
                self.terminated = true;
                Ok(Reply {
                    lines: vec!["bye".into()],
                    exit: true,
                })
            }
        }
    }

    fn active_table(&self) -> Result<&BlockTable, SimError> {
        match &self.mode {
            Mode::Uninitialized => Err(SimError::NotInitialized),
            Mode::Flat(flat) => Ok(flat.table()),
            Mode::Buddy(buddy) => Ok(buddy.table()),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn format_placement(p: Placement) -> String {
    format!(
        "allocated block id={} at address=0x{:x} size={}",
        p.id, p.offset, p.size
    )
}

fn format_dump(table: &BlockTable) -> Vec<String> {
    table
        .blocks()
        .iter()
        .map(|b| {
            let last = b.end() - 1;
            if b.is_free() {
                format!("[0x{:x} - 0x{:x}] FREE", b.offset, last)
            } else {
                // Used blocks always carry an id.
                let id = b.id.map(|id| id.to_string()).unwrap_or_default();
                format!("[0x{:x} - 0x{:x}] USED (id={id})", b.offset, last)
            }
        })
        .collect()
}

fn format_stats(stats: &ArenaStats) -> Vec<String> {
    let mut lines = vec![
        format!("total memory: {}", stats.total_bytes),
        format!("used memory: {}", stats.used_bytes),
        format!("free memory: {}", stats.free_bytes),
        format!("free blocks: {}", stats.free_blocks),
        format!("largest free block: {}", stats.largest_free),
        match stats.external_fragmentation() {
            Some(ratio) => format!("external fragmentation: {ratio:.2}"),
            None => "external fragmentation: n/a".to_string(),
        },
        format!("memory utilization: {:.2}%", stats.utilization()),
    ];
    if let Some(frag) = stats.internal_fragmentation {
        lines.push(format!("internal fragmentation: {frag} bytes"));
    }
    lines.push(format!("allocation success: {}", stats.successes));
    lines.push(format!("allocation failure: {}", stats.failures));
    lines
}

fn format_cache(cache: &CacheHierarchy) -> Vec<String> {
    [cache.l1().stats(), cache.l2().stats()]
        .iter()
        .map(|s| {
            format!(
                "{}: accesses={} hits={} misses={} evictions={} hit rate={:.2}%",
                s.name,
                s.accesses,
                s.hits,
                s.misses,
                s.evictions,
                s.hit_rate() * 100.0
            )
        })
        .collect()
}
