//! Small bitsets over closed enums, used for graph labels and element properties.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An enum usable as a member of a [`FlagSet`]. At most 32 variants.
pub trait Flag: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn bit(self) -> u32;
}

pub struct FlagSet<T: Flag> {
    bits: u32,
    _marker: PhantomData<T>,
}

impl<T: Flag> FlagSet<T> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    pub fn of(flags: &[T]) -> Self {
        flags.iter().copied().collect()
    }

    pub fn contains(&self, flag: T) -> bool {
        self.bits & (1 << flag.bit()) != 0
    }

    pub fn insert(&mut self, flag: T) {
        self.bits |= 1 << flag.bit();
    }

    pub fn remove(&mut self, flag: T) {
        self.bits &= !(1 << flag.bit());
    }

    pub fn with(mut self, flag: T) -> Self {
        self.insert(flag);
        self
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            bits: self.bits | other.bits,
            _marker: PhantomData,
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.bits & other.bits != 0
    }

    pub fn is_superset(&self, other: &Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        T::ALL.iter().copied().filter(|f| self.contains(*f))
    }
}

impl<T: Flag> FromIterator<T> for FlagSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<T: Flag> Clone for FlagSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Flag> Copy for FlagSet<T> {}

impl<T: Flag> Default for FlagSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Flag> PartialEq for FlagSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T: Flag> Eq for FlagSet<T> {}

impl<T: Flag> PartialOrd for FlagSet<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Flag> Ord for FlagSet<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bits.cmp(&other.bits)
    }
}

impl<T: Flag> Hash for FlagSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<T: Flag> fmt::Debug for FlagSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
