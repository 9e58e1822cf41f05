#![forbid(unsafe_code)]

/// Packed bits backing column validity, boolean storage and row masks.
///
/// Bit `i` lives in word `i / 64` at position `i % 64` (LSB first). Bits past
/// `len` in the last word are always zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

fn word_count(bits: usize) -> usize {
    (bits + 63) / 64
}

fn tail_mask(len: usize) -> Option<u64> {
    match len % 64 {
        0 => None,
        rem => Some((1u64 << rem) - 1),
    }
}

impl BitVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bits(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(word_count(bits)),
            len: 0,
            ones: 0,
        }
    }

    /// A mask of `bits` set bits.
    pub fn ones(bits: usize) -> Self {
        let mut words = vec![u64::MAX; word_count(bits)];
        if let (Some(mask), Some(last)) = (tail_mask(bits), words.last_mut()) {
            *last = mask;
        }
        Self {
            words,
            len: bits,
            ones: bits,
        }
    }

    /// A mask of `bits` cleared bits.
    pub fn zeros(bits: usize) -> Self {
        Self {
            words: vec![0; word_count(bits)],
            len: bits,
            ones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    pub fn all_true(&self) -> bool {
        self.ones == self.len
    }

    pub fn push(&mut self, value: bool) {
        let bit = self.len % 64;
        if bit == 0 {
            self.words.push(0);
        }
        if value {
            self.words[self.len / 64] |= 1u64 << bit;
            self.ones += 1;
        }
        self.len += 1;
    }

    /// Read bit `index`. Indices past the end read as `false`.
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {index} out of range for length {}", self.len);
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let was_set = *word & mask != 0;
        if value && !was_set {
            *word |= mask;
            self.ones += 1;
        } else if !value && was_set {
            *word &= !mask;
            self.ones -= 1;
        }
    }

    /// Iterate the indices of set bits in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| {
                let mut rest = word;
                std::iter::from_fn(move || {
                    if rest == 0 {
                        return None;
                    }
                    let bit = rest.trailing_zeros() as usize;
                    rest &= rest - 1;
                    Some(word_idx * 64 + bit)
                })
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub fn and_inplace(&mut self, other: &BitVec) {
        self.combine(other, |a, b| a & b);
    }

    pub fn or_inplace(&mut self, other: &BitVec) {
        self.combine(other, |a, b| a | b);
    }

    pub fn not_inplace(&mut self) {
        for w in &mut self.words {
            *w = !*w;
        }
        self.clear_tail();
        self.ones = self.len - self.ones;
    }

    fn combine(&mut self, other: &BitVec, op: impl Fn(u64, u64) -> u64) {
        assert_eq!(self.len, other.len, "bit vector length mismatch");
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w = op(*w, *o);
        }
        self.clear_tail();
        self.ones = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }

    fn clear_tail(&mut self) {
        if let (Some(mask), Some(last)) = (tail_mask(self.len), self.words.last_mut()) {
            *last &= mask;
        }
    }
}

impl FromIterator<bool> for BitVec {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut out = BitVec::with_capacity_bits(iter.size_hint().0);
        for bit in iter {
            out.push(bit);
        }
        out
    }
}
