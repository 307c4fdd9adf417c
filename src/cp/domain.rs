//! Finite cycle domains as fixed-width bitsets.
//!
//! A domain holds the cycles still feasible for one operation, drawn
//! from `[0, length)`. Cheap to clone, which is what the engine's
//! snapshot stack relies on.

const WORD_BITS: usize = 64;

/// Set of candidate issue cycles for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    words: Vec<u64>,
    size: usize,
}

impl Domain {
    /// Full domain `{0, .., length - 1}`.
    pub fn full(length: i64) -> Self {
        assert!(length > 0, "domain length must be positive");
        let length = length as usize;
        let n_words = length.div_ceil(WORD_BITS);
        let mut words = vec![u64::MAX; n_words];
        let tail = length % WORD_BITS;
        if tail != 0 {
            words[n_words - 1] = (1u64 << tail) - 1;
        }
        Self {
            words,
            size: length,
        }
    }

    /// Number of remaining values.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Exactly one value remains.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.size == 1
    }

    pub fn contains(&self, v: i64) -> bool {
        if v < 0 {
            return false;
        }
        let v = v as usize;
        self.words
            .get(v / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (v % WORD_BITS)) != 0)
    }

    /// Smallest remaining value, if any.
    pub fn min(&self) -> Option<i64> {
        for (i, &w) in self.words.iter().enumerate() {
            if w != 0 {
                return Some((i * WORD_BITS + w.trailing_zeros() as usize) as i64);
            }
        }
        None
    }

    /// Largest remaining value, if any.
    pub fn max(&self) -> Option<i64> {
        for (i, &w) in self.words.iter().enumerate().rev() {
            if w != 0 {
                return Some((i * WORD_BITS + (WORD_BITS - 1 - w.leading_zeros() as usize)) as i64);
            }
        }
        None
    }

    /// Removes `v`; reports whether the domain changed.
    pub fn remove(&mut self, v: i64) -> bool {
        if !self.contains(v) {
            return false;
        }
        let v = v as usize;
        self.words[v / WORD_BITS] &= !(1u64 << (v % WORD_BITS));
        self.size -= 1;
        true
    }

    /// Removes every value below `bound`; reports whether anything was
    /// removed.
    pub fn remove_below(&mut self, bound: i64) -> bool {
        let mut changed = false;
        for w in 0..self.words.len() {
            let base = (w * WORD_BITS) as i64;
            if base + WORD_BITS as i64 <= bound {
                changed |= self.drop_word(w, u64::MAX);
            } else if base < bound {
                let mask = (1u64 << (bound - base)) - 1;
                changed |= self.drop_word(w, mask);
            } else {
                break;
            }
        }
        changed
    }

    /// Removes every value above `bound`; reports whether anything was
    /// removed.
    pub fn remove_above(&mut self, bound: i64) -> bool {
        let mut changed = false;
        for w in (0..self.words.len()).rev() {
            let base = (w * WORD_BITS) as i64;
            if base > bound {
                changed |= self.drop_word(w, u64::MAX);
            } else if base + WORD_BITS as i64 - 1 > bound {
                let keep = (bound - base + 1) as u64;
                let mask = if keep >= WORD_BITS as u64 {
                    0
                } else {
                    !((1u64 << keep) - 1)
                };
                changed |= self.drop_word(w, mask);
            } else {
                break;
            }
        }
        changed
    }

    /// Collapses the domain to `{v}`.
    ///
    /// # Panics
    /// Panics if `v` is not in the domain.
    pub fn fix(&mut self, v: i64) {
        assert!(self.contains(v), "fixing a value outside the domain");
        for w in self.words.iter_mut() {
            *w = 0;
        }
        let v = v as usize;
        self.words[v / WORD_BITS] = 1u64 << (v % WORD_BITS);
        self.size = 1;
    }

    /// Remaining values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            let base = i * WORD_BITS;
            (0..WORD_BITS)
                .filter(move |b| w & (1u64 << b) != 0)
                .map(move |b| (base + b) as i64)
        })
    }

    fn drop_word(&mut self, w: usize, mask: u64) -> bool {
        let dropped = self.words[w] & mask;
        if dropped == 0 {
            return false;
        }
        self.words[w] &= !mask;
        self.size -= dropped.count_ones() as usize;
        true
    }
}
