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

use std::fmt::{self, Display, Formatter};

use arrayvec::ArrayVec;

use crate::board::Board;
use crate::defs::{Eval, Piece, Side, Square, MAX_DEPTH, MAX_MOVES};

/// A move packed into 32 bits.
///
/// `flag` doubles as the move kind: 0 is the null move (also used to mark
/// moves found illegal), 1 is a plain piece move, a pawn code is a
/// non-promoting pawn move, and any other piece code is a promotion to that
/// piece. `key` is the ordering key: positive for captures, promotions and
/// killers, negative for everything else.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Move {
    /// The move kind; see the type docs.
    pub flag: u8,
    /// The origin square.
    pub from: Square,
    /// The destination square.
    pub to: Square,
    /// The ordering key.
    pub key: i8,
}

/// A list of generated moves.
pub type MoveList = ArrayVec<Move, MAX_MOVES>;

/// What is attacking a king, and where the check can be met.
///
/// `targets` holds every square where a non-king move can address the check:
/// the attacker squares themselves plus the empty squares of the checking
/// rays. With more than one attacker only king moves can help, so callers
/// stop reading `targets` then.
pub struct CheckInfo {
    /// Capture-or-block squares.
    pub targets: ArrayVec<Square, 32>,
    /// The number of checking pieces.
    pub attackers: usize,
}

/// The ordering inputs for quiet moves.
///
/// `killers` is the killer pair of the ply being generated for, if any;
/// `history` is the generating side's (piece kind, destination) table. When
/// both draw a blank the key falls back to distance-to-enemy-king, biased
/// into the negative band below every capture and killer.
pub struct QuietOrdering<'a> {
    /// Killer moves of the ply, tried right after captures.
    pub killers: Option<[Move; 2]>,
    /// The generating side's history table.
    pub history: Option<&'a [[Eval; Square::TOTAL]; Piece::KINDS]>,
}

/// Mailbox offsets of a knight jump.
const KNIGHT_OFFSETS: [i16; 8] = [8, 12, 19, 21, -8, -12, -19, -21];
/// Mailbox offsets of a king step.
const KING_OFFSETS: [i16; 8] = [1, -1, 9, 10, 11, -9, -10, -11];
/// Diagonal ray directions.
const BISHOP_DIRS: [i16; 4] = [9, 11, -9, -11];
/// Orthogonal ray directions.
const ROOK_DIRS: [i16; 4] = [1, -1, 10, -10];

/// Mobility normalisation per piece kind, subtracted once per piece.
const KNIGHT_NORM: Eval = 4;
#[allow(clippy::missing_docs_in_private_items)]
const BISHOP_NORM: Eval = 6;
#[allow(clippy::missing_docs_in_private_items)]
const ROOK_NORM: Eval = 7;
#[allow(clippy::missing_docs_in_private_items)]
const QUEEN_NORM: Eval = 13;

impl Move {
    /// Ordering key of a kingside castle.
    pub const CASTLE_SHORT_KEY: i8 = 100;
    /// Ordering key of a queenside castle.
    pub const CASTLE_LONG_KEY: i8 = 90;
    /// Ordering key of the move following the principal variation.
    pub const PV_KEY: i8 = 127;
    /// Ordering key of the move suggested by the transposition table.
    pub const HASH_KEY: i8 = 126;
    /// Ordering key of the move suggested by the null-move threat.
    pub const THREAT_KEY: i8 = 110;
    /// Flag of a plain piece move.
    pub const PIECE_FLAG: u8 = 1;

    /// The null move.
    pub const fn null() -> Self {
        Self {
            flag: 0,
            from: Square::NONE,
            to: Square::NONE,
            key: 0,
        }
    }

    /// Builds a move with the given flag and ordering key.
    pub const fn new(from: Square, to: Square, flag: u8, key: i8) -> Self {
        Self { flag, from, to, key }
    }

    /// Checks for the null move (or an illegal-marked one).
    pub const fn is_null(self) -> bool {
        self.flag == 0
    }

    /// Checks if two moves go between the same squares, ignoring flag and
    /// ordering key.
    pub fn same_squares(self, other: Self) -> bool {
        self.from == other.from && self.to == other.to
    }

    /// Checks if two moves are the same move, ignoring the ordering key.
    pub fn matches(self, other: Self) -> bool {
        self.same_squares(other) && self.flag == other.flag
    }

    /// The promotion piece, if this is a promotion.
    pub fn promotion(self) -> Option<Piece> {
        (self.flag > 1 && (3..=6).contains(&(self.flag % 10))).then_some(Piece(self.flag))
    }
}

impl Display for Move {
    /// Writes the move in coordinate notation (`e2e4`, `e7e8q`), or `0000`
    /// for the null move.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0000");
        }
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion() {
            let letter = [b'n', b'b', b'r', b'q'][piece.kind() - 1] as char;
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

impl CheckInfo {
    /// Checks whether `square` capture-or-blocks the check.
    fn contains(&self, square: Square) -> bool {
        self.targets.iter().any(|&target| target == square)
    }
}

/// A move in coordinate notation as written, before it is resolved against
/// the legal move list.
#[derive(Clone, Copy)]
pub struct CoordMove {
    /// The origin square.
    pub from: Square,
    /// The destination square.
    pub to: Square,
    /// The colour-relative code of the requested promotion piece.
    pub promo: Option<i32>,
    /// The move was annotated `?` (book lines mark bad moves this way).
    pub flagged_bad: bool,
}

impl CoordMove {
    /// Parses `<from><to>[nbrq][?]` from the front of `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        let square = |offset: usize| -> Option<Square> {
            let file = *bytes.get(offset)?;
            let rank = *bytes.get(offset + 1)?;
            ((b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank))
                .then(|| Square::from_file_rank(file - b'a' + 1, rank - b'1' + 1))
        };
        let from = square(0)?;
        let to = square(2)?;
        let promo = match bytes.get(4) {
            Some(b'n') => Some(3),
            Some(b'b') => Some(4),
            Some(b'r') => Some(5),
            Some(b'q') => Some(6),
            _ => None,
        };
        let tail = 4 + usize::from(promo.is_some());
        let flagged_bad = bytes.get(tail) == Some(&b'?');
        Some(Self {
            from,
            to,
            promo,
            flagged_bad,
        })
    }

    /// Resolves the written move against a generated list.
    ///
    /// A promotion written without a piece letter resolves to the queen.
    pub fn find_in(&self, moves: &[Move]) -> Option<Move> {
        moves
            .iter()
            .find(|mv| {
                mv.from == self.from
                    && mv.to == self.to
                    && match (mv.promotion(), self.promo) {
                        (None, _) => true,
                        (Some(piece), Some(rel)) => piece.rel() == rel,
                        (Some(piece), None) => piece.rel() == 6,
                    }
            })
            .copied()
    }
}

impl QuietOrdering<'_> {
    /// An ordering context with no killers and no history, as used outside
    /// the search.
    pub const NONE: QuietOrdering<'static> = QuietOrdering {
        killers: None,
        history: None,
    };
}

/// Sorts a move list by descending ordering key.
///
/// The sort is stable so that equal keys keep generation order.
pub fn sort_moves(moves: &mut MoveList) {
    moves.sort_by(|a, b| b.key.cmp(&a.key));
}

/// Tests whether a king of `side` standing on `square` would be attacked.
///
/// The rest of the board is read as-is; in particular the king may "stand" on
/// a square it has not actually moved to, which is how castling transit
/// squares are probed.
pub fn attacked_as_king(bd: &Board, side: Side, square: Square) -> bool {
    let them = side.flip();
    let knight = Piece::from_rel(3, them);
    let bishop = Piece::from_rel(4, them);
    let rook = Piece::from_rel(5, them);
    let queen = Piece::from_rel(6, them);

    for delta in KNIGHT_OFFSETS {
        if bd.piece_on(square.offset(delta)) == knight {
            return true;
        }
    }
    let pawn = Piece::pawn_of(them);
    for delta in [side.forward() - 1, side.forward() + 1] {
        if bd.piece_on(square.offset(delta)) == pawn {
            return true;
        }
    }
    let king = Piece::king_of(them);
    for delta in KING_OFFSETS {
        if bd.piece_on(square.offset(delta)) == king {
            return true;
        }
    }
    for dir in BISHOP_DIRS {
        let hit = ray_hit(bd, square, dir);
        if hit == bishop || hit == queen {
            return true;
        }
    }
    for dir in ROOK_DIRS {
        let hit = ray_hit(bd, square, dir);
        if hit == rook || hit == queen {
            return true;
        }
    }
    false
}

/// Tests whether the king of `side` is in check.
pub fn in_check(bd: &Board, side: Side) -> bool {
    attacked_as_king(bd, side, bd.king(side))
}

/// Walks one ray and returns the first non-empty cell (possibly the fence).
fn ray_hit(bd: &Board, from: Square, dir: i16) -> Piece {
    let mut square = from.offset(dir);
    loop {
        let piece = bd.piece_on(square);
        if !piece.is_empty() {
            return piece;
        }
        square = square.offset(dir);
    }
}

/// Collects the checkers of `side`'s king together with the squares where
/// the check can be captured or blocked.
///
/// Stops early once a double check is established, since the caller will
/// only consider king moves from there.
pub fn check_info(bd: &Board, side: Side) -> CheckInfo {
    let mut info = CheckInfo {
        targets: ArrayVec::new(),
        attackers: 0,
    };
    let king = bd.king(side);
    let them = side.flip();
    let knight = Piece::from_rel(3, them);
    let bishop = Piece::from_rel(4, them);
    let rook = Piece::from_rel(5, them);
    let queen = Piece::from_rel(6, them);
    let pawn = Piece::pawn_of(them);

    for delta in KNIGHT_OFFSETS {
        let square = king.offset(delta);
        if bd.piece_on(square) == knight {
            info.targets.push(square);
            info.attackers += 1;
        }
    }
    for delta in [side.forward() - 1, side.forward() + 1] {
        let square = king.offset(delta);
        if bd.piece_on(square) == pawn {
            info.targets.push(square);
            info.attackers += 1;
        }
    }
    for (dirs, slider) in [(BISHOP_DIRS, bishop), (ROOK_DIRS, rook)] {
        for dir in dirs {
            let mut line: ArrayVec<Square, 8> = ArrayVec::new();
            let mut square = king.offset(dir);
            loop {
                let piece = bd.piece_on(square);
                if piece.is_empty() {
                    line.push(square);
                    square = square.offset(dir);
                    continue;
                }
                if piece == slider || piece == queen {
                    for &blocker in &line {
                        info.targets.push(blocker);
                    }
                    info.targets.push(square);
                    info.attackers += 1;
                    if info.attackers > 1 {
                        return info;
                    }
                }
                break;
            }
        }
    }
    info
}

/// Working state of one generation pass.
struct Gen<'a> {
    /// The board being generated for.
    bd: &'a Board,
    /// The side to generate for.
    side: Side,
    /// Cached enemy king square for the distance tie-break.
    enemy_king: Square,
    /// Quiet-move ordering inputs.
    ord: &'a QuietOrdering<'a>,
    /// The output list.
    moves: MoveList,
}

impl<'a> Gen<'a> {
    /// Starts a generation pass.
    fn new(bd: &'a Board, side: Side, ord: &'a QuietOrdering<'a>) -> Self {
        Self {
            bd,
            side,
            enemy_king: bd.king(side.flip()),
            ord,
            moves: MoveList::new(),
        }
    }

    /// Pushes a capture, promotion or otherwise pre-scored move.
    fn push_scored(&mut self, from: Square, to: Square, flag: u8, key: i32) {
        self.moves.push(Move::new(from, to, flag, key as i8));
    }

    /// Pushes a quiet move, deriving its ordering key from killers, history
    /// or the distance fallback.
    ///
    /// King moves never match killers (`killer_ok == false`), mirroring how
    /// they are emitted outside the killer bookkeeping.
    fn push_quiet(&mut self, from: Square, to: Square, flag: u8, killer_ok: bool) {
        let candidate = Move::new(from, to, flag, 0);
        let key = self.quiet_key(candidate, killer_ok);
        self.moves.push(Move::new(from, to, flag, key));
    }

    /// Derives the ordering key of a quiet move.
    fn quiet_key(&self, candidate: Move, killer_ok: bool) -> i8 {
        if killer_ok {
            if let Some(killers) = self.ord.killers {
                if killers[0].matches(candidate) {
                    return 1;
                }
                if killers[1].matches(candidate) {
                    return 0;
                }
            }
        }
        let hit = self.ord.history.map_or(0, |history| {
            history[self.bd.piece_on(candidate.from).kind()][candidate.to.to_index()]
        });
        if hit != 0 {
            return hit as i8;
        }
        // closer to the enemy king sorts earlier within the quiet band
        let distance = i32::from(candidate.to.0).abs_diff(i32::from(self.enemy_king.0)) as i32;
        (-distance - MAX_DEPTH) as i8
    }

    /// Generates knight moves; returns the mobility count.
    fn knight_moves(&mut self, from: Square, quiets: bool) -> Eval {
        let mut count = 0;
        for delta in KNIGHT_OFFSETS {
            let to = from.offset(delta);
            let test = self.bd.piece_on(to);
            if test.is_empty() {
                if quiets {
                    self.push_quiet(from, to, Move::PIECE_FLAG, true);
                }
                count += 1;
            } else if test.is_side(self.side.flip()) {
                self.push_scored(from, to, Move::PIECE_FLAG, (test.rel() << 4) - 3);
                count += 1;
            }
        }
        count
    }

    /// Generates knight evasions restricted to `info` targets; returns the
    /// mobility count.
    fn knight_evasions(&mut self, from: Square, info: &CheckInfo) -> Eval {
        let mut count = 0;
        for delta in KNIGHT_OFFSETS {
            let to = from.offset(delta);
            let test = self.bd.piece_on(to);
            if test.is_empty() {
                if info.contains(to) {
                    self.push_quiet(from, to, Move::PIECE_FLAG, false);
                }
                count += 1;
            } else if test.is_side(self.side.flip()) {
                if info.contains(to) {
                    self.push_scored(from, to, Move::PIECE_FLAG, (test.rel() << 4) - 3);
                }
                count += 1;
            }
        }
        count
    }

    /// Generates sliding moves along `dirs`; returns the mobility count.
    ///
    /// `attacker_rel` is the mover's colour-relative code for the MVV/LVA
    /// key (a queen emits rook rays and bishop rays in two calls).
    fn slider_moves(&mut self, from: Square, dirs: [i16; 4], attacker_rel: i32, quiets: bool) -> Eval {
        let mut count = 0;
        for dir in dirs {
            let mut to = from.offset(dir);
            loop {
                let test = self.bd.piece_on(to);
                if test.is_empty() {
                    if quiets {
                        self.push_quiet(from, to, Move::PIECE_FLAG, true);
                    }
                    count += 1;
                    to = to.offset(dir);
                    continue;
                }
                if test.is_side(self.side.flip()) {
                    self.push_scored(from, to, Move::PIECE_FLAG, (test.rel() << 4) - attacker_rel);
                    count += 1;
                }
                break;
            }
        }
        count
    }

    /// Generates sliding evasions restricted to `info` targets; returns the
    /// mobility count.
    fn slider_evasions(
        &mut self,
        from: Square,
        dirs: [i16; 4],
        attacker_rel: i32,
        info: &CheckInfo,
    ) -> Eval {
        let mut count = 0;
        for dir in dirs {
            let mut to = from.offset(dir);
            loop {
                let test = self.bd.piece_on(to);
                if test.is_empty() {
                    if info.contains(to) {
                        self.push_quiet(from, to, Move::PIECE_FLAG, false);
                    }
                    count += 1;
                    to = to.offset(dir);
                    continue;
                }
                if test.is_side(self.side.flip()) {
                    if info.contains(to) {
                        self.push_scored(from, to, Move::PIECE_FLAG, (test.rel() << 4) - attacker_rel);
                    }
                    count += 1;
                }
                break;
            }
        }
        count
    }

    /// Generates non-capturing, non-promoting pawn moves.
    fn pawn_quiets(&mut self, from: Square) {
        let fwd = self.side.forward();
        let pawn = Piece::pawn_of(self.side).0;
        let to = from.offset(fwd);
        if !self.bd.piece_on(to).is_empty() {
            return;
        }
        if rel_rank(from, self.side) < 7 {
            // pushes to the sixth rank and beyond jump the quiet queue
            if rel_rank(to, self.side) >= 6 {
                self.push_scored(from, to, pawn, 1);
            } else {
                self.push_quiet(from, to, pawn, true);
            }
        }
        if rel_rank(from, self.side) == 2 {
            let to = to.offset(fwd);
            if self.bd.piece_on(to).is_empty() {
                self.push_quiet(from, to, pawn, true);
            }
        }
    }

    /// Generates pawn captures, promotions and en-passant captures.
    fn pawn_captures(&mut self, from: Square) {
        let fwd = self.side.forward();
        let pawn = Piece::pawn_of(self.side).0;
        if rel_rank(from, self.side) == 7 {
            // all four promotion pieces, queen first
            for delta in [fwd - 1, fwd + 1] {
                let to = from.offset(delta);
                let test = self.bd.piece_on(to);
                if test.is_side(self.side.flip()) {
                    for rel in [6, 3, 5, 4] {
                        let promo = Piece::from_rel(rel, self.side).0;
                        self.push_scored(from, to, promo, ((test.rel() + rel - 4) << 4) - 2);
                    }
                }
            }
            let to = from.offset(fwd);
            if self.bd.piece_on(to).is_empty() {
                for rel in [6, 3, 5, 4] {
                    let promo = Piece::from_rel(rel, self.side).0;
                    self.push_scored(from, to, promo, (rel << 4) - 2);
                }
            }
        } else {
            for delta in [fwd - 1, fwd + 1] {
                let to = from.offset(delta);
                let test = self.bd.piece_on(to);
                if test.is_side(self.side.flip()) {
                    self.push_scored(from, to, pawn, (test.rel() << 4) - 2);
                } else if to == self.bd.ep_square() {
                    self.push_scored(from, to, pawn, (2 << 4) - 2);
                }
            }
        }
    }

    /// Generates king steps and castling.
    fn king_moves(&mut self, from: Square, quiets: bool) {
        for delta in KING_OFFSETS {
            let to = from.offset(delta);
            let test = self.bd.piece_on(to);
            if test.is_empty() {
                if quiets {
                    self.push_quiet(from, to, Move::PIECE_FLAG, false);
                }
            } else if test.is_side(self.side.flip()) {
                self.push_scored(from, to, Move::PIECE_FLAG, (test.rel() << 4) - 7);
            }
        }
        if quiets {
            self.castles(from);
        }
    }

    /// Generates castling when the rights, the empties, and the transit
    /// squares allow it.
    ///
    /// The destination square is not probed here: landing in check is caught
    /// by the make/unmake legality filter like any other king move.
    fn castles(&mut self, from: Square) {
        let bd = self.bd;
        let side = self.side;
        let home = Square::from_file_rank(5, if side == Side::WHITE { 1 } else { 8 });
        if bd.flags().king_moved(side) || from != home {
            return;
        }
        let rook = Piece::from_rel(5, side);
        if !bd.flags().rook_moved(side, true)
            && bd.piece_on(home.offset(3)) == rook
            && bd.piece_on(home.offset(1)).is_empty()
            && bd.piece_on(home.offset(2)).is_empty()
            && !attacked_as_king(bd, side, home)
            && !attacked_as_king(bd, side, home.offset(1))
        {
            self.push_scored(from, home.offset(2), Move::PIECE_FLAG, Move::CASTLE_SHORT_KEY.into());
        }
        if !bd.flags().rook_moved(side, false)
            && bd.piece_on(home.offset(-4)) == rook
            && bd.piece_on(home.offset(-1)).is_empty()
            && bd.piece_on(home.offset(-2)).is_empty()
            && bd.piece_on(home.offset(-3)).is_empty()
            && !attacked_as_king(bd, side, home)
            && !attacked_as_king(bd, side, home.offset(-1))
        {
            self.push_scored(from, home.offset(-2), Move::PIECE_FLAG, Move::CASTLE_LONG_KEY.into());
        }
    }
}

/// The rank of `square` from `side`'s point of view (1 = back rank).
const fn rel_rank(square: Square, side: Side) -> u8 {
    if side.0 == Side::WHITE.0 {
        square.rank()
    } else {
        9 - square.rank()
    }
}

/// Generates all pseudo-legal moves of `side` and refreshes piece mobility.
///
/// Pseudo-legal: leaving the own king in check is not filtered here (castling
/// transit excepted). The list is not sorted; the search sorts after it has
/// rewritten the keys of hash/PV/threat moves.
pub fn generate_all(bd: &mut Board, side: Side, ord: &QuietOrdering<'_>) -> MoveList {
    let mut mobility = [0; 16];
    let mut gen = Gen::new(bd, side, ord);
    for slot in 1..16 {
        let Some(entry) = bd.pieces(side).alive(slot) else {
            continue;
        };
        let sq = entry.square;
        mobility[slot] = match entry.piece.kind() {
            0 => {
                gen.pawn_captures(sq);
                gen.pawn_quiets(sq);
                0
            }
            1 => gen.knight_moves(sq, true) - KNIGHT_NORM,
            2 => gen.slider_moves(sq, BISHOP_DIRS, 4, true) - BISHOP_NORM,
            3 => gen.slider_moves(sq, ROOK_DIRS, 5, true) - ROOK_NORM,
            _ => {
                gen.slider_moves(sq, ROOK_DIRS, 6, true)
                    + gen.slider_moves(sq, BISHOP_DIRS, 6, true)
                    - QUEEN_NORM
            }
        };
    }
    gen.king_moves(bd.king(side), true);
    let moves = gen.moves;
    store_mobility(bd, side, &mobility);
    moves
}

/// Generates captures and promotions of `side`, pre-sorted by MVV/LVA, and
/// refreshes piece mobility.
pub fn generate_captures(bd: &mut Board, side: Side) -> MoveList {
    let mut mobility = [0; 16];
    let mut gen = Gen::new(bd, side, &QuietOrdering::NONE);
    for slot in 1..16 {
        let Some(entry) = bd.pieces(side).alive(slot) else {
            continue;
        };
        let sq = entry.square;
        mobility[slot] = match entry.piece.kind() {
            0 => {
                gen.pawn_captures(sq);
                0
            }
            1 => gen.knight_moves(sq, false) - KNIGHT_NORM,
            2 => gen.slider_moves(sq, BISHOP_DIRS, 4, false) - BISHOP_NORM,
            3 => gen.slider_moves(sq, ROOK_DIRS, 5, false) - ROOK_NORM,
            _ => {
                gen.slider_moves(sq, ROOK_DIRS, 6, false)
                    + gen.slider_moves(sq, BISHOP_DIRS, 6, false)
                    - QUEEN_NORM
            }
        };
    }
    gen.king_moves(bd.king(side), false);
    let mut moves = gen.moves;
    store_mobility(bd, side, &mobility);
    sort_moves(&mut moves);
    moves
}

/// Generates check evasions for `side` and refreshes piece mobility.
///
/// King moves are always emitted. With a single checker the other pieces are
/// pre-filtered by a cheap geometric test against the capture-or-block set;
/// surviving moves may still be illegal and go through the usual make/unmake
/// filter. With a double check only the king moves remain.
pub fn generate_evasions(
    bd: &mut Board,
    side: Side,
    info: &CheckInfo,
    ord: &QuietOrdering<'_>,
) -> MoveList {
    let mut mobility = [0; 16];
    let mut gen = Gen::new(bd, side, ord);
    gen.king_moves(bd.king(side), true);
    if info.attackers > 1 {
        return gen.moves;
    }
    for slot in 1..16 {
        let Some(entry) = bd.pieces(side).alive(slot) else {
            continue;
        };
        let sq = entry.square;
        let here = sq.to_index64() as i32;
        mobility[slot] = match entry.piece.kind() {
            0 => {
                let reachable = info.targets.iter().any(|&target| {
                    let diff = (target.to_index64() as i32 - here).abs();
                    matches!(diff, 1 | 7 | 8 | 9 | 16)
                });
                if reachable {
                    gen.pawn_captures(sq);
                    gen.pawn_quiets(sq);
                }
                0
            }
            1 => {
                let reachable = info.targets.iter().any(|&target| {
                    let diff = (target.to_index64() as i32 - here).abs();
                    matches!(diff, 6 | 10 | 15 | 17)
                });
                if reachable {
                    gen.knight_evasions(sq, info) - KNIGHT_NORM
                } else {
                    0
                }
            }
            2 => {
                let reachable = info.targets.iter().any(|&target| {
                    let diff = target.to_index64() as i32 - here;
                    diff % 9 == 0 || diff % 7 == 0
                });
                if reachable {
                    gen.slider_evasions(sq, BISHOP_DIRS, 4, info) - BISHOP_NORM
                } else {
                    0
                }
            }
            3 => gen.slider_evasions(sq, ROOK_DIRS, 5, info) - ROOK_NORM,
            _ => {
                gen.slider_evasions(sq, ROOK_DIRS, 6, info)
                    + gen.slider_evasions(sq, BISHOP_DIRS, 6, info)
                    - QUEEN_NORM
            }
        };
    }
    let moves = gen.moves;
    store_mobility(bd, side, &mobility);
    moves
}

/// Writes freshly counted mobility back into the piece list.
fn store_mobility(bd: &mut Board, side: Side, mobility: &[Eval; 16]) {
    let pieces = bd.pieces_mut(side);
    for slot in 1..16 {
        if pieces.is_alive(slot) {
            pieces.entries[slot].mobility = mobility[slot];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{check_info, generate_all, generate_evasions, in_check, sort_moves, QuietOrdering};
    use crate::board::Board;
    use crate::defs::{Side, Square};

    /// Collects the subset of `side`'s pseudo-legal moves that survive the
    /// make/unmake legality filter.
    fn legal_moves(bd: &mut Board, side: Side) -> Vec<super::Move> {
        let mut legal = Vec::new();
        let moves = generate_all(bd, side, &QuietOrdering::NONE);
        for &mv in &moves {
            bd.make_move(mv);
            if !in_check(bd, side) {
                legal.push(mv);
            }
            bd.unmake_move();
        }
        legal
    }

    fn has_move(moves: &[super::Move], from: Square, to: Square) -> bool {
        moves.iter().any(|m| m.from == from && m.to == to)
    }

    #[test]
    fn startpos_counts_twenty() {
        let mut bd = Board::startpos();
        let moves = legal_moves(&mut bd, Side::WHITE);
        assert_eq!(moves.len(), 20, "twenty legal moves at the start");
    }

    #[test]
    fn castling_both_ways_with_clear_home_rank() {
        let mut bd = Board::from_position_text("white: Ke1 Ra1 Rh1\nblack: Ke8\n").unwrap();
        let moves = legal_moves(&mut bd, Side::WHITE);
        assert!(has_move(&moves, Square::E1, Square::G1), "short castle emitted");
        assert!(has_move(&moves, Square::E1, Square::C1), "long castle emitted");
    }

    #[test]
    fn castling_blocked_by_attacked_transit() {
        // rook eyeing f1 kills the short castle only
        let mut bd = Board::from_position_text("white: Ke1 Ra1 Rh1\nblack: Ke8 Rf8\n").unwrap();
        let moves = legal_moves(&mut bd, Side::WHITE);
        assert!(!has_move(&moves, Square::E1, Square::G1), "no castle through f1");
        assert!(has_move(&moves, Square::E1, Square::C1), "long castle fine");

        // rook eyeing d1 kills the long castle only
        let mut bd = Board::from_position_text("white: Ke1 Ra1 Rh1\nblack: Ke8 Rd8\n").unwrap();
        let moves = legal_moves(&mut bd, Side::WHITE);
        assert!(has_move(&moves, Square::E1, Square::G1), "short castle fine");
        assert!(!has_move(&moves, Square::E1, Square::C1), "no castle through d1");

        // check kills both
        let mut bd = Board::from_position_text("white: Ke1 Ra1 Rh1\nblack: Ke8 Re7\n").unwrap();
        let moves = legal_moves(&mut bd, Side::WHITE);
        assert!(!has_move(&moves, Square::E1, Square::G1), "no castle in check");
        assert!(!has_move(&moves, Square::E1, Square::C1), "no castle in check");
    }

    #[test]
    fn evasions_cover_all_legal_replies() {
        // a handful of in-check positions: the evasion list must be a
        // superset of the filtered full list
        let positions = [
            ("white: Ke1 Qd1 Nb1 Pe2\nblack: Ke8 Rf1\n", Side::WHITE),
            ("white: Ke1 Re8\nblack: Kg8 Nc6 Pd7\n", Side::BLACK),
            ("white: Kc1 Pb2\nblack: Kc8 Qh1\n", Side::WHITE),
            ("white: Kg1 Bc4 Pf2\nblack: Kg8 Qg5\n", Side::WHITE),
        ];
        for (text, side) in positions {
            let mut bd = Board::from_position_text(text).unwrap();
            assert!(in_check(&bd, side), "test position must start in check");
            let info = check_info(&bd, side);
            let evasions = generate_evasions(&mut bd, side, &info, &QuietOrdering::NONE);
            for mv in legal_moves(&mut bd, side) {
                assert!(
                    evasions.iter().any(|e| e.matches(mv)),
                    "evasions missing {mv} in {text:?}"
                );
            }
        }
    }

    #[test]
    fn double_check_yields_king_moves_only() {
        // knight on f6 and rook on e4 both hit the e8 king after Ne4xf6+
        let mut bd = Board::from_position_text("white: Kg1 Nf6 Re4\nblack: Ke8 Qa8 Pd7\n").unwrap();
        assert!(in_check(&bd, Side::BLACK), "black must be in double check");
        let info = check_info(&bd, Side::BLACK);
        assert_eq!(info.attackers, 2, "two checkers expected");
        let evasions = generate_evasions(&mut bd, Side::BLACK, &info, &QuietOrdering::NONE);
        assert!(
            evasions.iter().all(|m| m.from == Square::E8),
            "only king moves evade a double check"
        );
    }

    #[test]
    fn capture_keys_rank_victims_over_attackers() {
        // pawn takes queen must sort above queen takes pawn
        let mut bd =
            Board::from_position_text("white: Kh1 Pb2 Qd5\nblack: Kh8 Qc3 Pe6\n").unwrap();
        let mut moves = generate_all(&mut bd, Side::WHITE, &QuietOrdering::NONE);
        sort_moves(&mut moves);
        let first = moves[0];
        assert_eq!(
            (first.from, first.to),
            (Square::B2, Square::C3),
            "pawn takes queen first"
        );
    }
}
