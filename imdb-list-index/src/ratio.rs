/*!
Gestalt pattern matching between two strings.

This is the classic recursive longest-matching-block similarity: find the
longest contiguous block common to both sequences, then recurse on the
pieces to its left and right; the ratio is `2 * M / T` where `M` is the
total matched length and `T` the combined length. Two cheap upper bounds,
`real_quick_ratio` (length arithmetic only) and `quick_ratio` (character
multiset overlap), allow a caller to skip the full computation whenever the
bound already falls below its cutoff.

The ranker holds one matcher per reference string and swaps candidate
strings in with `set_seq1`, so the index built over the fixed second
sequence is computed once. Junk heuristics are deliberately absent: every
string compared here is a short title, far below the lengths where they
matter.
*/

use fnv::FnvHashMap;

/// A similarity matcher between a swappable first sequence and a fixed
/// second sequence.
#[derive(Clone, Debug)]
pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    /// For each character of `b`, the positions at which it occurs.
    b2j: FnvHashMap<char, Vec<usize>>,
    /// Character multiset of `b`, for `quick_ratio`.
    b_count: FnvHashMap<char, usize>,
}

impl SequenceMatcher {
    /// Create a matcher against the fixed second sequence `b`.
    pub fn new(b: &str) -> SequenceMatcher {
        let b: Vec<char> = b.chars().collect();
        let mut b2j: FnvHashMap<char, Vec<usize>> = FnvHashMap::default();
        let mut b_count: FnvHashMap<char, usize> = FnvHashMap::default();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
            *b_count.entry(c).or_insert(0) += 1;
        }
        SequenceMatcher { a: vec![], b, b2j, b_count }
    }

    /// Replace the first sequence.
    pub fn set_seq1(&mut self, a: &str) {
        self.a = a.chars().collect();
    }

    /// An upper bound on `ratio` computable from the lengths alone.
    pub fn real_quick_ratio(&self) -> f64 {
        calculate_ratio(self.a.len().min(self.b.len()), self.a.len() + self.b.len())
    }

    /// An upper bound on `ratio` from character multiset intersection.
    pub fn quick_ratio(&self) -> f64 {
        let mut a_count: FnvHashMap<char, usize> = FnvHashMap::default();
        for &c in &self.a {
            *a_count.entry(c).or_insert(0) += 1;
        }
        let mut matches = 0;
        for (c, &n) in &a_count {
            matches += n.min(self.b_count.get(c).copied().unwrap_or(0));
        }
        calculate_ratio(matches, self.a.len() + self.b.len())
    }

    /// The full similarity ratio in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        let matched: usize =
            self.matching_blocks().iter().map(|&(_, _, k)| k).sum();
        calculate_ratio(matched, self.a.len() + self.b.len())
    }

    /// The longest block common to `a[alo..ahi]` and `b[blo..bhi]`, as
    /// `(a_start, b_start, length)`. Among equally long blocks, the one
    /// starting earliest in `a` (then earliest in `b`) wins.
    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        // j2len maps a position j in b to the length of the longest block
        // ending at the current a position and at j.
        let mut j2len: FnvHashMap<usize, usize> = FnvHashMap::default();
        for i in alo..ahi {
            let mut new_j2len: FnvHashMap<usize, usize> =
                FnvHashMap::default();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j == 0 {
                        1
                    } else {
                        j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                    };
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }
        (best_i, best_j, best_size)
    }

    /// All maximal matching blocks, sorted by position, with adjacent
    /// blocks merged.
    fn matching_blocks(&self) -> Vec<(usize, usize, usize)> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut raw = vec![];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k > 0 {
                raw.push((i, j, k));
                if alo < i && blo < j {
                    queue.push((alo, i, blo, j));
                }
                if i + k < ahi && j + k < bhi {
                    queue.push((i + k, ahi, j + k, bhi));
                }
            }
        }
        raw.sort_unstable();

        let mut blocks: Vec<(usize, usize, usize)> = vec![];
        for (i, j, k) in raw {
            match blocks.last_mut() {
                Some(last) if last.0 + last.2 == i && last.1 + last.2 == j => {
                    last.2 += k;
                }
                _ => blocks.push((i, j, k)),
            }
        }
        blocks
    }
}

fn calculate_ratio(matches: usize, length: usize) -> f64 {
    if length == 0 {
        return 1.0;
    }
    2.0 * matches as f64 / length as f64
}
