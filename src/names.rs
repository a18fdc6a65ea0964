//! Synthetic continuation names.
//!
//! When a record overflows the line budget, the overflow is moved under a
//! freshly minted key. Minted keys must never collide with a real group
//! name or with another minted key of the same run; `TmpNameFactory` owns
//! the registry of taken names for one map.

use std::collections::{HashMap, HashSet};

use crate::error::FormatError;

/// How continuation names are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TmpNameScheme {
    /// `prefix` followed by a run-wide hex counter (`x00`, `x01`, ...).
    Prefixed { prefix: String },
    /// The base name followed by a hex counter, truncating the base until the
    /// result fits `max_len` (`examp0`, ...). Used for posix groups.
    Truncated { max_len: usize },
    /// The base name followed by `-` and a per-base hex counter (`hosts-01`).
    Suffixed,
}

/// Candidate names for `base`, in the order they are tried.
fn candidates<'a>(
    scheme: &'a TmpNameScheme,
    base: &'a str,
) -> Box<dyn Iterator<Item = String> + 'a> {
    match scheme {
        TmpNameScheme::Prefixed { prefix } => {
            Box::new((0u64..).map(move |n| format!("{}{:02x}", prefix, n)))
        }
        TmpNameScheme::Suffixed => Box::new((1u64..).map(move |n| format!("{}-{:02x}", base, n))),
        TmpNameScheme::Truncated { max_len } => truncated_candidates(base, *max_len),
    }
}

fn truncated_candidates(base: &str, max_len: usize) -> Box<dyn Iterator<Item = String> + '_> {
    let chars: Vec<char> = base.chars().collect();
    let stems = (1..=chars.len())
        .rev()
        .map(move |len| chars[..len].iter().collect::<String>());
    Box::new(stems.flat_map(move |stem| {
        let padded = stem.chars().count() + 1 < max_len;
        (0u64..)
            .map(move |n| {
                if padded {
                    format!("{}{:02x}", stem, n)
                } else {
                    format!("{}{:x}", stem, n)
                }
            })
            .take_while(move |name| name.chars().count() <= max_len)
    }))
}

/// Mint the first free name for `base`, starting at candidate `attempt`.
///
/// Returns the name and the attempt index to resume from next time, or
/// `None` once the candidate sequence is exhausted.
pub fn mint_name(
    scheme: &TmpNameScheme,
    base: &str,
    attempt: usize,
    used: &HashSet<String>,
) -> Option<(String, usize)> {
    candidates(scheme, base)
        .enumerate()
        .skip(attempt)
        .find(|(_, name)| !used.contains(name))
        .map(|(i, name)| (name, i + 1))
}

/// Registry of taken names plus the counters of one map export.
#[derive(Debug, Clone)]
pub struct TmpNameFactory {
    scheme: TmpNameScheme,
    used: HashSet<String>,
    next_attempt: HashMap<String, usize>,
    minted: usize,
}

impl TmpNameFactory {
    /// Create a factory that will never hand out any of `taken`.
    pub fn new<I, S>(scheme: TmpNameScheme, taken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scheme,
            used: taken.into_iter().map(Into::into).collect(),
            next_attempt: HashMap::new(),
            minted: 0,
        }
    }

    pub fn scheme(&self) -> &TmpNameScheme {
        &self.scheme
    }

    /// Mark `name` as taken. Returns false if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_string())
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Number of names minted so far.
    pub fn minted(&self) -> usize {
        self.minted
    }

    /// Mint a fresh continuation name for a record keyed `base`.
    pub fn mint(&mut self, base: &str) -> Result<String, FormatError> {
        // Truncated names restart from the full base every time.
        let counter_key = match &self.scheme {
            TmpNameScheme::Prefixed { .. } => "",
            TmpNameScheme::Suffixed => base,
            TmpNameScheme::Truncated { .. } => {
                let (name, _) = mint_name(&self.scheme, base, 0, &self.used)
                    .ok_or_else(|| FormatError::NamesExhausted { base: base.to_string() })?;
                return Ok(self.take(name));
            }
        };
        let attempt = self.next_attempt.get(counter_key).copied().unwrap_or(0);
        let (name, next) = mint_name(&self.scheme, base, attempt, &self.used)
            .ok_or_else(|| FormatError::NamesExhausted { base: base.to_string() })?;
        self.next_attempt.insert(counter_key.to_string(), next);
        Ok(self.take(name))
    }

    fn take(&mut self, name: String) -> String {
        self.used.insert(name.clone());
        self.minted += 1;
        name
    }
}
