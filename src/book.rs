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

use std::fmt::Write as _;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use oorandom::Rand64;

use crate::defs::Side;
use crate::movegen::{CoordMove, Move, MoveList};

/// Moves beyond this many plies are not tracked against the book.
const MAX_TRACKED_PLIES: u32 = 40;
/// The built-in book: a single Italian line.
const INTERNAL_LINE: &str = "e2e4 e7e5 g1f3 b8c6 f1c4";

/// The opening book.
///
/// Lines are whole games in coordinate notation separated by spaces; a move
/// suffixed `?` is known bad and never *played* from the book, though lines
/// through it still match. The played game is tracked as a growing prefix
/// string and a book line supplies its next move when the prefix matches.
pub struct Book {
    /// The book lines (the built-in line when no file is available).
    lines: Vec<String>,
    /// The coordinate-notation prefix of the played game.
    current: String,
    /// Plies recorded into `current` so far.
    plies: u32,
    /// Cleared once the game has left every line (or never was on one).
    active: bool,
    /// Tie-break generator for positions with several book continuations.
    rng: Rand64,
}

impl Book {
    /// Opens the book file, falling back to the built-in line with a
    /// diagnostic when it cannot be read.
    pub fn open(path: &str) -> Self {
        let lines = match fs::read_to_string(path) {
            Ok(text) => text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
            Err(_) => {
                eprintln!("Opening book missing.");
                vec![INTERNAL_LINE.to_owned()]
            }
        };
        Self {
            lines,
            current: String::new(),
            plies: 0,
            active: true,
            rng: seeded_rng(),
        }
    }

    /// Starts tracking a fresh game from the standard starting position.
    pub fn reset(&mut self) {
        self.current.clear();
        self.plies = 0;
        self.active = true;
    }

    /// Permanently closes the book (edited or loaded positions).
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Records a played move into the tracked prefix.
    pub fn record_move(&mut self, mv: Move) {
        self.plies += 1;
        if self.plies > MAX_TRACKED_PLIES {
            return;
        }
        let _ = write!(self.current, "{}{} ", mv.from, mv.to);
    }

    /// Picks a book continuation among `legal`, if any line matches the
    /// played prefix. Several matches tie-break uniformly at random.
    ///
    /// A failed lookup closes the book for the rest of the game.
    pub fn consult(&mut self, legal: &MoveList, side: Side) -> Option<Move> {
        if !self.active {
            return None;
        }
        let mut matches: Vec<Move> = Vec::new();
        for line in &self.lines {
            if let Some(written) = line_continuation(line, &self.current, side) {
                if let Some(mv) = written.find_in(legal) {
                    if !mv.is_null() {
                        matches.push(mv);
                    }
                }
            }
        }
        if matches.is_empty() {
            self.active = false;
            return None;
        }
        let pick = if matches.len() == 1 {
            0
        } else {
            self.rng.rand_range(0..matches.len() as u64) as usize
        };
        Some(matches[pick])
    }
}

/// Matches `current` as a prefix of `line` (skipping `?` annotations) and
/// parses the move that continues it.
///
/// When the continuation belongs to the consulting side, a `?`-annotated
/// move is withheld; the opponent walking into a known-bad move is their
/// problem.
fn line_continuation(line: &str, current: &str, side: Side) -> Option<CoordMove> {
    let bytes = line.as_bytes();
    let prefix = current.as_bytes();
    let mut skipped = 0;
    let mut level = 1;
    for (index, &expected) in prefix.iter().enumerate() {
        let mut at = index + skipped;
        if bytes.get(at) == Some(&b'?') {
            skipped += 1;
            at += 1;
        }
        let &found = bytes.get(at)?;
        if found == b' ' {
            level += 1;
        }
        if found != expected {
            return None;
        }
    }
    let rest = line.get(prefix.len() + skipped..)?;
    let own_move = if side == Side::WHITE {
        level % 2 == 1
    } else {
        level % 2 == 0
    };
    let written = CoordMove::parse(rest)?;
    if own_move && written.flagged_bad {
        return None;
    }
    Some(written)
}

/// A generator seeded from OS entropy, with the clock as a fallback.
fn seeded_rng() -> Rand64 {
    let mut seed = [0u8; 16];
    if getrandom::getrandom(&mut seed).is_err() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0x5eed, |elapsed| elapsed.as_nanos());
        seed = nanos.to_le_bytes();
    }
    Rand64::new(u128::from_le_bytes(seed))
}

#[cfg(test)]
mod tests {
    use super::{line_continuation, Book};
    use crate::board::Board;
    use crate::defs::{Side, Square};
    use crate::movegen::{generate_all, QuietOrdering};

    #[test]
    fn follows_the_internal_line() {
        let mut book = Book {
            lines: vec![super::INTERNAL_LINE.to_owned()],
            current: String::new(),
            plies: 0,
            active: true,
            rng: oorandom::Rand64::new(7),
        };
        let mut bd = Board::startpos();

        // the book opens with e2e4 for White
        let legal = generate_all(&mut bd, Side::WHITE, &QuietOrdering::NONE);
        let mv = book.consult(&legal, Side::WHITE).expect("book move expected");
        assert_eq!((mv.from, mv.to), (Square::E2, Square::E4), "book plays e4");

        book.record_move(mv);
        bd.make_move(mv);

        // and answers it with e7e5 for Black
        let legal = generate_all(&mut bd, Side::BLACK, &QuietOrdering::NONE);
        let mv = book.consult(&legal, Side::BLACK).expect("book reply expected");
        assert_eq!((mv.from, mv.to), (Square::E7, Square::E5), "book answers e5");
    }

    #[test]
    fn leaves_the_book_off_line() {
        let mut book = Book {
            lines: vec![super::INTERNAL_LINE.to_owned()],
            current: String::new(),
            plies: 0,
            active: true,
            rng: oorandom::Rand64::new(7),
        };
        let mut bd = Board::startpos();
        let legal = generate_all(&mut bd, Side::WHITE, &QuietOrdering::NONE);
        let d4 = legal
            .iter()
            .copied()
            .find(|m| m.from == Square::D2 && m.to == Square::D4)
            .expect("d4 must be generated");
        book.record_move(d4);
        bd.make_move(d4);
        let legal = generate_all(&mut bd, Side::BLACK, &QuietOrdering::NONE);
        assert!(
            book.consult(&legal, Side::BLACK).is_none(),
            "d4 is not in the book"
        );
        assert!(!book.active, "a miss closes the book");
    }

    #[test]
    fn questioned_moves_are_not_played_but_still_match() {
        // the f3? move is never picked for White...
        let line = "f2f3? e7e5 g2g4";
        assert!(
            line_continuation(line, "", Side::WHITE).is_none(),
            "white never plays its own ? move"
        );
        // ...but after it has been played, the line still matches for the
        // opponent's reply
        let reply = line_continuation(line, "f2f3 ", Side::BLACK).expect("line must match");
        assert_eq!(
            (reply.from, reply.to),
            (Square::E7, Square::E5),
            "black's book answer to f3"
        );
    }
}
