//! Packed boolean valuations.
//!
//! A [`Valuation`] assigns a truth value to each variable of an ordered
//! variable list (environment variables, system variables or transition-system
//! propositions). Bit `i` holds the value of the `i`-th variable.

use std::fmt;

/// Maximum number of declared variables per player. Valuations are enumerated
/// explicitly, so this bounds the per-node branching factor at `2^16`.
pub const MAX_PLAYER_VARS: usize = 16;

/// Maximum number of atomic propositions in a transition system.
pub const MAX_PROPOSITIONS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct Valuation(u64);

impl Valuation {
    /// All variables false.
    pub const EMPTY: Valuation = Valuation(0);

    pub fn from_bits(bits: u64) -> Self {
        Valuation(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn get(self, index: usize) -> bool {
        index < 64 && (self.0 >> index) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        if index >= 64 {
            return;
        }
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn with(mut self, index: usize, value: bool) -> Self {
        self.set(index, value);
        self
    }

    /// Build a valuation from the indices of the variables that are true.
    pub fn from_true_indices<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        indices
            .into_iter()
            .fold(Valuation::EMPTY, |acc, i| acc.with(i, true))
    }

    /// Every valuation over `width` variables, in ascending bit order.
    pub fn enumerate(width: usize) -> impl Iterator<Item = Valuation> {
        let count: u64 = if width >= 64 { u64::MAX } else { 1u64 << width };
        (0..count).map(Valuation)
    }

    /// Pair each variable name with its value.
    pub fn assignment<'a, I>(self, names: I) -> Vec<(&'a str, bool)>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), self.get(i)))
            .collect()
    }

    /// Render as `{a, !b}` using the given names.
    pub fn display_with<'a, I>(self, names: I) -> String
    where
        I: IntoIterator<Item = &'a String>,
    {
        let parts: Vec<String> = self
            .assignment(names)
            .into_iter()
            .map(|(name, value)| {
                if value {
                    name.to_string()
                } else {
                    format!("!{name}")
                }
            })
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// One full valuation: environment variables, system variables and the
/// propositions that label the current transition-system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Snapshot {
    pub env: Valuation,
    pub sys: Valuation,
    pub props: Valuation,
}

impl Snapshot {
    pub fn new(env: Valuation, sys: Valuation, props: Valuation) -> Self {
        Self { env, sys, props }
    }
}
