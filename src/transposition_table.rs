/*
 * Prawn, an XBoard-compatible chess engine
 * Copyright (C) 2024 Jasper Shovelton
 *
 * Prawn is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Prawn is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
 * details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Prawn. If not, see <https://www.gnu.org/licenses/>.
 */

use crate::board::zobrist::Key;
use crate::defs::Eval;
use crate::movegen::Move;

/// The bound of a stored score depending on how it was obtained.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Bound {
    /// Unused slot.
    None,
    /// An exact score: `alpha < score < beta` held when it was stored.
    Exact,
    /// An upper bound: the node failed low.
    Upper,
    /// A lower bound: the node failed high.
    Lower,
}

/// A single entry in a transposition table.
///
/// The tag is the upper 32 bits of the position hash; the low bits already
/// picked the cluster, so together they identify the position well enough.
#[derive(Clone, Copy)]
struct TableEntry {
    /// The upper 32 bits of the hash, as a checksum.
    tag: u32,
    /// The depth at which the score was obtained.
    depth: i8,
    /// The bound of the score.
    bound: Bound,
    /// The stored score.
    value: Eval,
    /// The best move found at this position, or the null move.
    mv: Move,
}

/// The result of a table lookup.
pub struct Probe {
    /// The score to return, when the stored bound allows a cutoff.
    pub score: Option<Eval>,
    /// The stored best move (null when none is known); useful for move
    /// ordering even when no cutoff is possible.
    pub best: Move,
}

/// A transposition table of two-entry clusters.
///
/// The cluster is picked by the low hash bits; a probe scans both slots and
/// a store overwrites the shallower one, so one deep entry per cluster
/// survives the churn.
pub struct TranspositionTable {
    /// The clusters.
    clusters: Vec<[TableEntry; 2]>,
    /// `clusters.len() - 1`; the length is a power of two.
    mask: u64,
}

/// A single entry of the pawn-structure table.
#[derive(Clone, Copy)]
struct PawnEntry {
    /// The full pawn hash; the table is small and collisions are cheap, so
    /// the whole key doubles as the tag.
    hash: Key,
    /// The cached pawn-structure score (White's point of view).
    value: Eval,
}

/// A direct-mapped, replace-always cache of pawn-structure scores.
pub struct PawnTable {
    /// The entries.
    entries: Vec<PawnEntry>,
    /// `entries.len() - 1`; the length is a power of two.
    mask: u64,
}

impl TableEntry {
    /// An unused entry.
    const EMPTY: Self = Self {
        tag: 0,
        depth: 0,
        bound: Bound::None,
        value: 0,
        mv: Move::null(),
    };
}

impl TranspositionTable {
    /// Allocates a zeroed table of `2^bits` clusters.
    pub fn new(bits: u32) -> Self {
        let len = 1usize << bits;
        Self {
            clusters: vec![[TableEntry::EMPTY; 2]; len],
            mask: len as u64 - 1,
        }
    }

    /// Zeroes the table.
    pub fn clear(&mut self) {
        for cluster in &mut self.clusters {
            *cluster = [TableEntry::EMPTY; 2];
        }
    }

    /// The cluster index of `hash`.
    fn index(&self, hash: Key) -> usize {
        (hash & self.mask) as usize
    }

    /// Probes for a cut-node: any stored bound that proves a value outside
    /// the window produces a cutoff.
    ///
    /// A fail-low match returns `alpha` and a fail-high match returns `beta`
    /// (fail-hard), mirroring what the search would have concluded.
    pub fn probe_cut(&self, hash: Key, depth: i32, alpha: Eval, beta: Eval) -> Probe {
        let tag = (hash >> 32) as u32;
        let mut probe = Probe {
            score: None,
            best: Move::null(),
        };
        for entry in &self.clusters[self.index(hash)] {
            if entry.tag != tag || entry.bound == Bound::None {
                continue;
            }
            if !entry.mv.is_null() {
                probe.best = entry.mv;
            }
            if i32::from(entry.depth) >= depth {
                match entry.bound {
                    Bound::Exact => {
                        probe.score = Some(entry.value);
                        return probe;
                    }
                    Bound::Upper if entry.value <= alpha => {
                        probe.score = Some(alpha);
                        return probe;
                    }
                    Bound::Lower if entry.value >= beta => {
                        probe.score = Some(beta);
                        return probe;
                    }
                    _ => {}
                }
            }
        }
        probe
    }

    /// Probes for a PV node: only exact scores may short-circuit, but the
    /// stored move is still worth having.
    pub fn probe_pv(&self, hash: Key, depth: i32) -> Probe {
        let tag = (hash >> 32) as u32;
        let mut probe = Probe {
            score: None,
            best: Move::null(),
        };
        for entry in &self.clusters[self.index(hash)] {
            if entry.tag != tag || entry.bound == Bound::None {
                continue;
            }
            if !entry.mv.is_null() {
                probe.best = entry.mv;
            }
            if i32::from(entry.depth) >= depth && entry.bound == Bound::Exact {
                probe.score = Some(entry.value);
                return probe;
            }
        }
        probe
    }

    /// Stores a result, overwriting the shallower slot of the cluster.
    ///
    /// A null best move keeps whatever move the slot already had: a stale
    /// move from the same cluster still tends to be playable and is better
    /// ordering fodder than nothing.
    pub fn store(&mut self, hash: Key, depth: i32, value: Eval, bound: Bound, mv: Move) {
        let index = self.index(hash);
        let cluster = &mut self.clusters[index];
        let slot = usize::from(depth < i32::from(cluster[0].depth));
        let entry = &mut cluster[slot];
        entry.tag = (hash >> 32) as u32;
        entry.depth = depth as i8;
        entry.value = value;
        entry.bound = bound;
        if !mv.is_null() {
            entry.mv = mv;
        }
    }
}

impl PawnTable {
    /// Allocates a zeroed table of `2^bits` entries.
    pub fn new(bits: u32) -> Self {
        let len = 1usize << bits;
        Self {
            entries: vec![PawnEntry { hash: 0, value: 0 }; len],
            mask: len as u64 - 1,
        }
    }

    /// Looks up a cached pawn-structure score.
    pub fn probe(&self, hash: Key) -> Option<Eval> {
        let entry = self.entries[(hash & self.mask) as usize];
        (entry.hash == hash).then_some(entry.value)
    }

    /// Caches a pawn-structure score, replacing unconditionally.
    pub fn store(&mut self, hash: Key, value: Eval) {
        self.entries[(hash & self.mask) as usize] = PawnEntry { hash, value };
    }
}

#[cfg(test)]
mod tests {
    use super::{Bound, PawnTable, TranspositionTable};
    use crate::defs::Square;
    use crate::movegen::Move;

    fn mv(from: Square, to: Square) -> Move {
        Move::new(from, to, Move::PIECE_FLAG, 0)
    }

    #[test]
    fn probe_honours_bounds() {
        let mut tt = TranspositionTable::new(4);
        let hash = 0xdead_beef_c0de_1234;
        tt.store(hash, 6, 120, Bound::Lower, mv(Square::E2, Square::E4));

        // deep enough and failing high: cutoff at beta
        let probe = tt.probe_cut(hash, 5, 0, 100);
        assert_eq!(probe.score, Some(100), "lower bound proves a fail high");
        assert!(
            probe.best.same_squares(mv(Square::E2, Square::E4)),
            "stored move comes back"
        );

        // window above the stored value: no cutoff, move still returned
        let probe = tt.probe_cut(hash, 5, 200, 300);
        assert_eq!(probe.score, None, "lower bound below alpha cannot cut");
        assert!(!probe.best.is_null(), "move survives a failed probe");

        // insufficient depth: no cutoff
        let probe = tt.probe_cut(hash, 7, 0, 100);
        assert_eq!(probe.score, None, "shallow entries cannot cut");

        // PV probe ignores non-exact bounds
        let probe = tt.probe_pv(hash, 5);
        assert_eq!(probe.score, None, "PV nodes only take exact scores");

        tt.store(hash, 6, 42, Bound::Exact, Move::null());
        let probe = tt.probe_pv(hash, 5);
        assert_eq!(probe.score, Some(42), "exact scores cut at PV nodes");
    }

    #[test]
    fn store_keeps_the_deeper_entry() {
        let mut tt = TranspositionTable::new(4);
        let deep = 0x0101_0101_0000_0005;
        // same cluster (equal low bits), different tags
        let shallow_a = 0x2222_2222_0000_0005;
        let shallow_b = 0x3333_3333_0000_0005;
        tt.store(deep, 10, 75, Bound::Exact, mv(Square::D2, Square::D4));
        tt.store(shallow_a, 3, -10, Bound::Upper, mv(Square::A2, Square::A3));
        tt.store(shallow_b, 4, 12, Bound::Exact, mv(Square::B2, Square::B4));
        assert_eq!(
            tt.probe_pv(deep, 10).score,
            Some(75),
            "shallow stores must not evict the deep entry"
        );
        assert_eq!(
            tt.probe_pv(shallow_b, 4).score,
            Some(12),
            "the latest shallow entry occupies the second slot"
        );
    }

    #[test]
    fn pawn_table_replaces_always() {
        let mut pt = PawnTable::new(4);
        pt.store(99, 17);
        assert_eq!(pt.probe(99), Some(17), "stored value comes back");
        pt.store(99 + 16, -5);
        assert_eq!(pt.probe(99), None, "colliding store evicts");
        assert_eq!(pt.probe(99 + 16), Some(-5), "newest entry wins");
    }
}
