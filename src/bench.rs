#![cfg(test)]

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

use lazy_static::lazy_static;

use crate::board::Board;
use crate::defs::Side;
use crate::perft::perft;

/// A position with a known perft count.
#[derive(Clone, Copy)]
struct TestPosition {
    /// Position text, or the empty string for the starting position.
    position: &'static str,
    /// The side to move.
    side: Side,
    /// The perft depth.
    depth: u32,
    /// The expected number of leaves.
    expected: u64,
}

impl TestPosition {
    /// Creates a new [`TestPosition`].
    const fn new(position: &'static str, side: Side, depth: u32, expected: u64) -> Self {
        Self {
            position,
            side,
            depth,
            expected,
        }
    }

    /// Sets up the board for this position.
    fn board(&self) -> Board {
        if self.position.is_empty() {
            Board::startpos()
        } else {
            Board::from_position_text(self.position).expect("bench positions must parse")
        }
    }
}

/// A middlegame position that exercises castling, promotions, en passant,
/// checks and pins all at once.
const KIWIPETE: &str = "white: Ke1 Qf3 Ra1 Rh1 Bd2 Be2 Nc3 Ne5 Pa2 Pb2 Pc2 Pd5 Pe4 Pf2 Pg2 Ph2\n\
                        black: Ke8 Qe7 Ra8 Rh8 Ba6 Bg7 Nb6 Nf6 Pa7 Pb4 Pc7 Pd7 Pe6 Pf7 Pg6 Ph3\n";

/// An endgame where en-passant captures keep exposing the kings.
const PINNED_EP: &str = "white: Ka5 Rb4 Pb5 Pe2 Pg2\nblack: Kh4 Rh5 Pc7 Pd6 Pf4\n";

lazy_static! {
    /// Test positions used to check the correctness of movegen/make/unmake.
    static ref TEST_POSITIONS: Vec<TestPosition> = vec![
        TestPosition::new("", Side::WHITE, 1, 20),
        TestPosition::new("", Side::WHITE, 2, 400),
        TestPosition::new("", Side::WHITE, 3, 8_902),
        TestPosition::new("", Side::WHITE, 4, 197_281),
        // depth 5 sees en passant, checks and checkmates
        TestPosition::new("", Side::WHITE, 5, 4_865_609),
        TestPosition::new(KIWIPETE, Side::WHITE, 1, 48),
        TestPosition::new(KIWIPETE, Side::WHITE, 2, 2_039),
        TestPosition::new(KIWIPETE, Side::WHITE, 3, 97_862),
        TestPosition::new(KIWIPETE, Side::WHITE, 4, 4_085_603),
        TestPosition::new(PINNED_EP, Side::WHITE, 1, 14),
        TestPosition::new(PINNED_EP, Side::WHITE, 2, 191),
        TestPosition::new(PINNED_EP, Side::WHITE, 3, 2_812),
        TestPosition::new(PINNED_EP, Side::WHITE, 4, 43_238),
        TestPosition::new(PINNED_EP, Side::WHITE, 5, 674_624),
    ];
}

#[test]
fn perft_matches_the_published_counts() {
    for test in TEST_POSITIONS.iter() {
        let mut bd = test.board();
        let total = perft::<false, false>(&mut bd, test.side, test.depth);
        assert_eq!(
            total, test.expected,
            "perft({}) of {:?}",
            test.depth, test.position
        );
        bd.assert_consistent();
    }
}
