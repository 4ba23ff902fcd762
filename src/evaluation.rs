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

use crate::board::Board;
use crate::defs::{Eval, Piece, Side, Square};
use crate::transposition_table::PawnTable;

/// Bishop-colour bit for the light squares.
const LIGHT: u8 = 1;
/// Bishop-colour bit for the dark squares.
const DARK: u8 = 2;

/// Counts gathered in the first pass over the piece lists.
#[derive(Default)]
struct Counts {
    /// Queens of both sides together.
    queens: i32,
    /// Rooks of both sides together.
    rooks: i32,
    /// Pawns per side.
    pawns: [i32; 2],
    /// Bishops per side.
    bishops: [i32; 2],
    /// Knights per side.
    knights: [i32; 2],
    /// Bishop square-colour bits per side.
    colors: [u8; 2],
    /// All pieces per side, kings included.
    pieces: [usize; 2],
}

impl Counts {
    /// Total pieces on the board.
    fn total(&self) -> usize {
        self.pieces[0] + self.pieces[1]
    }

    /// Total pawns on the board.
    fn all_pawns(&self) -> i32 {
        self.pawns[0] + self.pawns[1]
    }
}

/// Statically evaluates the position from White's point of view.
///
/// Returns the score and the number of non-pawn pieces (kings included);
/// a piece count of zero signals insufficient mating material, for which the
/// score is always 0.
///
/// The board is taken mutably because the passed-pawn scores are parked in
/// the pawn entries' mobility scratch field, where the endgame terms re-read
/// them.
pub fn evaluate(bd: &mut Board, pawn_tt: &mut PawnTable) -> (Eval, i32) {
    let mut ret = bd.material();
    let mut counts = Counts::default();

    for side in [Side::WHITE, Side::BLACK] {
        let sign = if side == Side::WHITE { 1 } else { -1 };
        let index = side.to_index();
        let list = bd.pieces(side);
        for slot in 1..16 {
            let Some(entry) = list.alive(slot) else {
                continue;
            };
            counts.pieces[index] += 1;
            match entry.piece.kind() {
                0 => {
                    counts.pawns[index] += 1;
                    ret += sign * pawn_pst(entry.square, side);
                }
                1 => {
                    counts.knights[index] += 1;
                    ret += sign * (entry.mobility + knight_pst(entry.square));
                }
                2 => {
                    counts.bishops[index] += 1;
                    counts.colors[index] |= square_colour(entry.square);
                    ret += sign * entry.mobility;
                }
                3 => {
                    counts.rooks += 1;
                    ret += sign * entry.mobility;
                }
                _ => {
                    counts.queens += 1;
                    ret += sign * entry.mobility;
                }
            }
        }
        // the king
        counts.pieces[index] += 1;
    }

    // two bishops are worth more on an emptying board; two knights a little
    let pair_bonus = if counts.all_pawns() < 15 { 35 } else { 18 };
    if counts.bishops[Side::WHITE.to_index()] == 2 {
        ret += pair_bonus;
    }
    if counts.bishops[Side::BLACK.to_index()] == 2 {
        ret -= pair_bonus;
    }
    if counts.knights[Side::WHITE.to_index()] == 2 {
        ret += 10;
    }
    if counts.knights[Side::BLACK.to_index()] == 2 {
        ret -= 10;
    }

    let total = counts.total();
    let all_pawns = counts.all_pawns();
    let enough_material = total as i32 - all_pawns;

    let same_coloured_bishops = total == 4
        && counts.bishops[Side::WHITE.to_index()] == 1
        && counts.colors[Side::WHITE.to_index()] == counts.colors[Side::BLACK.to_index()];
    if (total < 4 || same_coloured_bishops)
        && all_pawns == 0
        && counts.queens == 0
        && counts.rooks == 0
    {
        return (0, 0);
    }

    let middle_game = !(total < 20
        && (counts.rooks < 4 || total < 13)
        && (counts.queens < 2 || total < 13 || enough_material < 7));
    if middle_game && !(-250..=250).contains(&ret) {
        // a lopsided middlegame needs no positional fine print
        return (ret, enough_material);
    }

    let pawn_key = bd.pawn_hash();
    let cached = pawn_tt.probe(pawn_key);
    let mut pawn_score = cached.unwrap_or(0);
    let mut isolani = [0; 2];
    if cached.is_none() {
        pawn_score = pawn_structure(bd, &mut isolani);
    }

    if middle_game {
        ret += pawn_score;
        ret += development_terms(bd);
        ret += central_control(bd);
        ret += king_safety(bd, Side::WHITE, &counts);
        ret -= king_safety(bd, Side::BLACK, &counts);
    } else {
        if cached.is_none() {
            pawn_score += endgame_pawn_terms(bd, &counts, &isolani);
        }
        ret += pawn_score;
        for side in [Side::WHITE, Side::BLACK] {
            let sign = if side == Side::WHITE { 1 } else { -1 };
            match endgame_king(bd, side, &counts) {
                Some(score) => ret += sign * score,
                // a blockaded king-and-pawn ending is dead drawn
                None => return (0, enough_material),
            }
        }
    }

    if cached.is_none() {
        pawn_tt.store(pawn_key, pawn_score);
    }
    (ret, enough_material)
}

/// The rank of `square` from `side`'s point of view.
const fn rel_rank(square: Square, side: Side) -> u8 {
    if side.0 == Side::WHITE.0 {
        square.rank()
    } else {
        9 - square.rank()
    }
}

/// A square named in `side`'s coordinates ("my g2" is g7 for Black).
const fn rel_sq(file: u8, rank: u8, side: Side) -> Square {
    if side.0 == Side::WHITE.0 {
        Square::from_file_rank(file, rank)
    } else {
        Square::from_file_rank(file, 9 - rank)
    }
}

/// The bishop-colour bit of a square.
const fn square_colour(square: Square) -> u8 {
    if square.is_light() {
        LIGHT
    } else {
        DARK
    }
}

/// Positional bonus of a pawn, from its owner's point of view.
fn pawn_pst(square: Square, side: Side) -> Eval {
    let square = rel_sq(square.file(), rel_rank(square, side), Side::WHITE);
    let mut value = 0;
    if square == Square::D2 || square == Square::E2 {
        value -= 8;
    }
    if square == Square::C2 {
        value -= 6;
    }
    if square == Square::C4 || square == Square::D4 || square == Square::E4 {
        value += 2;
    }
    let rank = square.rank();
    if rank >= 5 {
        value += 2;
    }
    if rank >= 6 {
        value += 5;
    }
    if rank >= 7 {
        value += 20;
    }
    value
}

/// Central-preference bonus of a knight; symmetric in both axes.
fn knight_pst(square: Square) -> Eval {
    let file_edge = (square.file() - 1).min(8 - square.file());
    let rank_edge = (square.rank() - 1).min(8 - square.rank());
    match file_edge.min(rank_edge) {
        0 => -4,
        1 => 0,
        2 => 2,
        _ => 4,
    }
}

/// Is the square one of the four centre squares?
const fn central(square: Square) -> bool {
    matches!(square.file(), 4 | 5) && matches!(square.rank(), 4 | 5)
}

/// Is the square on the ring around the centre?
const fn part_central(square: Square) -> bool {
    square.file() >= 3 && square.file() <= 6 && square.rank() >= 3 && square.rank() <= 6
        && !central(square)
}

/// Is the square on the board edge?
const fn edge(square: Square) -> bool {
    square.file() == 1 || square.file() == 8 || square.rank() == 1 || square.rank() == 8
}

/// Is the square on the ring just inside the edge?
const fn part_edge(square: Square) -> bool {
    !edge(square) && !central(square) && !part_central(square)
}

/// Isolani penalties and passed-pawn bonuses for both sides.
///
/// Leaves each pawn's passed-pawn score in its mobility scratch field and
/// the per-side isolani counts in `isolani`.
fn pawn_structure(bd: &mut Board, isolani: &mut [Eval; 2]) -> Eval {
    let mut score = 0;
    for side in [Side::WHITE, Side::BLACK] {
        let sign = if side == Side::WHITE { 1 } else { -1 };
        let fwd = side.forward();
        let enemy_pawn = Piece::pawn_of(side.flip());
        let own_pawn = Piece::pawn_of(side);

        let mut passed_scores = [0; 16];
        for slot in 8..16 {
            let Some(entry) = bd.pieces(side).alive(slot) else {
                continue;
            };
            if !entry.piece.is_pawn() {
                continue;
            }
            let sq = entry.square;

            let mut lonely = true;
            for other in 8..16 {
                if other == slot {
                    continue;
                }
                if let Some(buddy) = bd.pieces(side).alive(other) {
                    if buddy.piece.is_pawn()
                        && buddy.square.file().abs_diff(sq.file()) == 1
                    {
                        lonely = false;
                        break;
                    }
                }
            }
            if lonely {
                isolani[side.to_index()] += 1;
                score -= sign * 10;
            }

            let mut passed = true;
            let mut ahead = sq.offset(fwd);
            while (2..=7).contains(&ahead.rank()) {
                if bd.piece_on(ahead) == enemy_pawn
                    || bd.piece_on(ahead.offset(-1)) == enemy_pawn
                    || bd.piece_on(ahead.offset(1)) == enemy_pawn
                {
                    passed = false;
                    break;
                }
                ahead = ahead.offset(fwd);
            }
            let mut pawn_value = 0;
            if passed {
                pawn_value = 2;
                let rank = rel_rank(sq, side);
                if rank >= 4 {
                    pawn_value += 8;
                }
                if rank >= 5 {
                    pawn_value += 12;
                }
                if rank >= 6 {
                    pawn_value += 16;
                }
                if bd.piece_on(sq.offset(-fwd - 1)) == own_pawn
                    || bd.piece_on(sq.offset(-fwd + 1)) == own_pawn
                {
                    // a defended passer is half again as strong
                    pawn_value += pawn_value >> 1;
                }
            }
            if rel_rank(sq, side) >= 7 {
                pawn_value += 20;
            }
            passed_scores[slot] = pawn_value;
            score += sign * pawn_value;
        }
        let list = bd.pieces_mut(side);
        for slot in 8..16 {
            if list.is_alive(slot) {
                list.entries[slot].mobility = passed_scores[slot];
            }
        }
    }
    score
}

/// Endgame-only pawn terms: missing-pawn penalty, isolani escalation,
/// doubled passer weight and connected passers.
fn endgame_pawn_terms(bd: &Board, counts: &Counts, isolani: &[Eval; 2]) -> Eval {
    let mut score = 0;
    for side in [Side::WHITE, Side::BLACK] {
        let sign = if side == Side::WHITE { 1 } else { -1 };
        let index = side.to_index();
        if counts.pawns[index] == 0 {
            score -= sign * 50;
        }
        if isolani[index] > 0 {
            score -= sign * (isolani[index] << 3);
            if isolani[index] > 2 {
                score -= sign * (isolani[index] << 3);
            }
        }
        // passers count double here, and an advanced connected pair more
        let list = bd.pieces(side);
        let mut best_connected = 0;
        for slot in 8..16 {
            let Some(entry) = list.alive(slot) else {
                continue;
            };
            if !entry.piece.is_pawn() || entry.mobility == 0 {
                continue;
            }
            score += sign * entry.mobility;
            if slot > 8 {
                if let Some(buddy) = list.alive(slot - 1) {
                    let here = rel_rank(entry.square, side);
                    let there = rel_rank(buddy.square, side);
                    if buddy.piece.is_pawn()
                        && buddy.mobility != 0
                        && here > 3
                        && there > 3
                        && entry.square.file().abs_diff(buddy.square.file()) == 1
                    {
                        let connected = Eval::from(here + there) << 3;
                        best_connected = best_connected.max(connected);
                    }
                }
            }
        }
        score += sign * best_connected;
    }
    score
}

/// Undeveloped-minor penalties, from White's point of view.
fn development_terms(bd: &Board) -> Eval {
    let mut score = 0;
    for side in [Side::WHITE, Side::BLACK] {
        let sign = if side == Side::WHITE { 1 } else { -1 };
        // the original knights live in slots 6 and 7
        for slot in [6, 7] {
            if let Some(entry) = bd.pieces(side).alive(slot) {
                if entry.piece.kind() == 1 {
                    let sq = entry.square;
                    if sq == rel_sq(7, 1, side) || sq == rel_sq(2, 1, side) {
                        score -= sign * 7;
                    } else {
                        let rank = rel_rank(sq, side);
                        let file = sq.file();
                        if (3..=6).contains(&file) {
                            if rank == 5 {
                                score += sign * 2;
                            } else if rank == 6 {
                                score += sign * 4;
                            }
                        }
                    }
                }
            }
        }
        // and the original bishops in slots 4 and 5
        for slot in [4, 5] {
            if let Some(entry) = bd.pieces(side).alive(slot) {
                if entry.piece.kind() == 2
                    && (entry.square == rel_sq(6, 1, side) || entry.square == rel_sq(3, 1, side))
                {
                    score -= sign * 5;
                }
            }
        }
    }
    score
}

/// A flat bonus for occupying the four centre squares.
fn central_control(bd: &Board) -> Eval {
    let mut score = 0;
    for square in [Square::D4, Square::E4, Square::D5, Square::E5] {
        let piece = bd.piece_on(square);
        if piece.is_white() {
            score += 5;
        } else if piece.is_black() {
            score -= 5;
        }
    }
    score
}

/// Middle-game king safety of `side`, from `side`'s point of view.
///
/// Castled kings are scored by their pawn shelter; a missing shelter pawn is
/// a "hole". Without queens the whole term is halved.
fn king_safety(bd: &Board, side: Side, counts: &Counts) -> Eval {
    let king = bd.king(side);
    let own_pawn = Piece::pawn_of(side);
    let own_colors = counts.colors[side.to_index()];
    let enemy_colors = counts.colors[side.flip().to_index()];
    let mut res = 0;
    if !bd.flags().has_castled(side) {
        res -= 30;
    }
    let file = king.file();
    let rs = |f, r| rel_sq(f, r, side);
    let empty = |sq| bd.piece_on(sq).is_empty();
    if file == 4 || file == 5 {
        res -= 7;
    } else if (king == rs(7, 1) && empty(rs(8, 1))) || king == rs(8, 1) {
        // kingside shelter
        let mut hole1 = 1;
        let mut hole2 = 1;
        res += 5;
        if bd.piece_on(rs(6, 2)) == own_pawn {
            res += 8;
        }
        if bd.piece_on(rs(7, 2)) == own_pawn {
            res += 12;
            hole2 = 0;
        } else if bd.piece_on(rs(7, 2)) == Piece::from_rel(4, side) {
            res += 8;
        } else {
            let fianchetto = square_colour(rs(7, 2));
            if own_colors & fianchetto == 0 {
                // a fianchetto hole with no bishop to cover it
                res -= 15;
                if enemy_colors & fianchetto != 0 {
                    res -= 35;
                }
            }
        }
        if bd.piece_on(rs(8, 2)) == own_pawn {
            res += 10;
            hole1 = 0;
        }
        if bd.piece_on(rs(8, 3)) == own_pawn {
            res += 8;
            hole1 = 0;
        }
        if bd.piece_on(rs(7, 3)) == own_pawn {
            res += 4;
            hole2 = 0;
        }
        res -= (hole1 + hole2) << 4;
    } else if (king == rs(3, 1) && empty(rs(2, 1)) && empty(rs(1, 1)))
        || (king == rs(2, 1) && empty(rs(1, 1)))
        || king == rs(1, 1)
    {
        // queenside shelter
        let mut hole1 = 1;
        let mut hole2 = 1;
        res += 5;
        if king == rs(2, 1) || king == rs(1, 1) {
            res += 1;
        }
        if bd.piece_on(rs(3, 2)) == own_pawn {
            res += 10;
        }
        if bd.piece_on(rs(2, 2)) == own_pawn {
            res += 8;
            hole2 = 0;
        }
        if bd.piece_on(rs(1, 2)) == own_pawn {
            res += 4;
            hole1 = 0;
        }
        if bd.piece_on(rs(1, 3)) == own_pawn {
            res += 4;
            hole1 = 0;
        }
        res -= (hole1 + hole2) << 4;
    } else {
        // a king in the open: penalise the air around it
        let fwd = side.forward();
        for delta in [-fwd - 1, -fwd, -fwd + 1] {
            if empty(king.offset(delta)) {
                res -= 5;
            }
        }
        for delta in [fwd - 1, fwd, fwd + 1] {
            if empty(king.offset(delta)) {
                res -= 3;
            }
        }
        if empty(king.offset(1)) {
            res -= 3;
        }
        if empty(king.offset(-1)) {
            res -= 3;
        }
    }
    if counts.queens == 0 {
        // without queens the king is only half in danger
        res >>= 1;
    }
    res
}

/// Endgame king placement of `side`, from `side`'s point of view.
///
/// Returns `None` when the position is a blockaded king-and-pawn draw, which
/// short-circuits the whole evaluation to 0.
fn endgame_king(bd: &Board, side: Side, counts: &Counts) -> Option<Eval> {
    let king = bd.king(side);
    let index = side.to_index();
    let enemy = side.flip();
    let enemy_index = enemy.to_index();
    let total = counts.total();
    let three_or_four_no_pawns = total < 5 && counts.all_pawns() == 0;
    let special_basic = bd.lone_king_edge() && three_or_four_no_pawns;
    let enemy_colors = counts.colors[enemy_index];

    if special_basic
        && counts.queens == 0
        && counts.rooks == 0
        && (enemy_colors == LIGHT || enemy_colors == DARK)
    {
        // the bishop-and-knight mate: herd the bare king to the right corner
        return Some(-kbn_corner(king, enemy_colors == DARK));
    }

    let basic = three_or_four_no_pawns && counts.pieces[index] == 1;
    let mut res = 0;
    if special_basic && counts.pieces[enemy_index] == 1 {
        let enemy_king = bd.king(enemy);
        res -= Eval::from(king.rank().abs_diff(enemy_king.rank()))
            + Eval::from(king.file().abs_diff(enemy_king.file()));
    }

    if total == 3 && counts.pawns[enemy_index] == 1 && counts.pieces[index] == 1 {
        // bare king against king and pawn: a king camped on the pawn's
        // path is a dead draw
        if let Some(pawn_sq) = find_pawn(bd, enemy) {
            // how far the king stands ahead of the pawn, along its path
            let steps = i32::from(rel_rank(king, enemy)) - i32::from(rel_rank(pawn_sq, enemy));
            if king.file().abs_diff(pawn_sq.file()) <= 1 && (1..=2).contains(&steps) {
                return None;
            }
        }
    }

    // rook-vs-rook-and-pawn: the defending king belongs in front of the
    // pawn, wherever that is
    let king_halts_passed = total == 5
        && counts.rooks == 2
        && counts.pawns[enemy_index] == 1
        && counts.pawns[index] == 0;

    if central(king) {
        if !king_halts_passed {
            res += 40;
        }
        if basic {
            res -= 25;
        }
    } else if part_central(king) {
        if !king_halts_passed {
            res += 20;
        }
        if basic {
            res -= 15;
        }
    } else if part_edge(king) {
        if !king_halts_passed {
            res -= 7;
        }
        if basic {
            if matches!(king, Square::B2 | Square::G2 | Square::B7 | Square::G7) {
                res -= 150;
            } else if matches!(
                king,
                Square::C2
                    | Square::F2
                    | Square::B3
                    | Square::G3
                    | Square::B6
                    | Square::C7
                    | Square::F7
                    | Square::G6
            ) {
                res -= 80;
            }
        }
    } else {
        res += if king_halts_passed { -10 } else { -30 };
        if basic {
            res -= 300;
            if counts.queens == 0
                && counts.rooks == 0
                && (enemy_colors == 0 || enemy_colors == (LIGHT | DARK))
            {
                // against two knights or opposite bishops, the middle of an
                // edge still holds
                if matches!(
                    king,
                    Square::D1
                        | Square::E1
                        | Square::H4
                        | Square::H5
                        | Square::A4
                        | Square::A5
                        | Square::D8
                        | Square::E8
                ) {
                    res += 120;
                } else if matches!(
                    king,
                    Square::C1
                        | Square::F1
                        | Square::H3
                        | Square::H6
                        | Square::A3
                        | Square::A6
                        | Square::C8
                        | Square::F8
                ) {
                    res -= 10;
                } else {
                    res -= 120;
                }
            }
        }
    }
    Some(res)
}

/// The first pawn of `side` on the board, if any.
fn find_pawn(bd: &Board, side: Side) -> Option<Square> {
    for slot in 8..16 {
        if let Some(entry) = bd.pieces(side).alive(slot) {
            if entry.piece.is_pawn() {
                return Some(entry.square);
            }
        }
    }
    None
}

/// The bishop-and-knight corner table: how well the *winning* side has the
/// bare king herded, scored by the bare king's square.
///
/// With a dark-squared bishop the mating corners are a1/h8; the light table
/// is its left-right mirror.
fn kbn_corner(king: Square, dark_bishop: bool) -> Eval {
    let king = if dark_bishop {
        king
    } else {
        Square::from_file_rank(9 - king.file(), king.rank())
    };
    match king {
        // the corner triangle itself
        Square::A1 | Square::H8 | Square::B1 | Square::A2 | Square::H7 | Square::G8 => 900,
        Square::C1 | Square::B2 | Square::A3 | Square::H6 | Square::G7 | Square::F8 => 800,
        Square::D1
        | Square::C2
        | Square::B3
        | Square::A4
        | Square::H5
        | Square::G6
        | Square::F7
        | Square::E8 => 700,
        Square::E1
        | Square::D2
        | Square::C3
        | Square::B4
        | Square::A5
        | Square::H4
        | Square::G5
        | Square::F6
        | Square::E7
        | Square::D8 => 600,
        Square::F1
        | Square::E2
        | Square::D3
        | Square::C4
        | Square::B5
        | Square::A6
        | Square::H3
        | Square::G4
        | Square::F5
        | Square::E6
        | Square::D7
        | Square::C8 => 500,
        // the middle of the board, or the wrong-colour corner
        _ => -60,
    }
}

#[cfg(test)]
mod tests {
    use super::evaluate;
    use crate::board::Board;
    use crate::defs::Side;
    use crate::movegen::{generate_all, QuietOrdering};
    use crate::transposition_table::PawnTable;

    /// Evaluates after refreshing mobility, the way the search sees it.
    fn eval_of(text: &str) -> i32 {
        let mut bd = Board::from_position_text(text).expect("test position must parse");
        let _ = generate_all(&mut bd, Side::WHITE, &QuietOrdering::NONE);
        let _ = generate_all(&mut bd, Side::BLACK, &QuietOrdering::NONE);
        let mut pawn_tt = PawnTable::new(8);
        evaluate(&mut bd, &mut pawn_tt).0
    }

    #[test]
    fn mirrored_positions_negate() {
        let pairs = [
            (
                "white: Kg1 Rf1 Pf2 Pg2 Ph2 Nc3\nblack: Kg8 Rf8 Pf7 Pg7 Ph7 Pa5\n",
                "white: Kg1 Rf1 Pf2 Pg2 Ph2 Pa4\nblack: Kg8 Rf8 Pf7 Pg7 Ph7 Nc6\n",
            ),
            (
                "white: Kb1 Qd1 Pa2 Pb2 Pc3\nblack: Kg8 Qe7 Pf7 Pg6\n",
                "white: Kg1 Qe2 Pf2 Pg3\nblack: Kb8 Qd8 Pa7 Pb7 Pc6\n",
            ),
            (
                "white: Kd5 Pe4\nblack: Kf3 Pb6\n",
                "white: Kf6 Pb3\nblack: Kd4 Pe5\n",
            ),
            // a full middlegame, to run the shelter and development terms
            (
                "white: Kg1 Qd1 Ra1 Rf1 Bb2 Bc4 Nc3 Nf3 Pa2 Pb3 Pc2 Pd4 Pe4 Pf2 Pg2 Ph2\n\
                 black: Kb8 Qe7 Rd8 Rh8 Bg7 Bf5 Nd7 Ng4 Pa7 Pb7 Pc6 Pd6 Pe5 Pf7 Pg6 Ph5\n",
                "white: Kb1 Qe2 Rd1 Rh1 Bg2 Bf4 Nd2 Ng5 Pa2 Pb2 Pc3 Pd3 Pe4 Pf2 Pg3 Ph4\n\
                 black: Kg8 Qd8 Ra8 Rf8 Bb7 Bc5 Nc6 Nf6 Pa7 Pb6 Pc7 Pd5 Pe5 Pf7 Pg7 Ph7\n",
            ),
        ];
        for (position, mirrored) in pairs {
            assert_eq!(
                eval_of(position),
                -eval_of(mirrored),
                "mirror must negate for {position:?}"
            );
        }
    }

    #[test]
    fn insufficient_material_is_flagged() {
        let bare = [
            "white: Ke4\nblack: Kd6\n",
            "white: Ke4 Nc3\nblack: Kd6\n",
            "white: Ke4 Bc1\nblack: Kd6\n",
            // both bishops on dark squares
            "white: Ke4 Bc1\nblack: Kd6 Bf8\n",
        ];
        for text in bare {
            let mut bd = Board::from_position_text(text).unwrap();
            let mut pawn_tt = PawnTable::new(8);
            let (score, material) = evaluate(&mut bd, &mut pawn_tt);
            assert_eq!((score, material), (0, 0), "dead draw for {text:?}");
        }
        // opposite-coloured bishops can still (in theory) mate
        let mut bd = Board::from_position_text("white: Ke4 Bc1\nblack: Kd6 Be8\n").unwrap();
        let mut pawn_tt = PawnTable::new(8);
        assert_ne!(
            evaluate(&mut bd, &mut pawn_tt).1,
            0,
            "opposite bishops are not a dead draw"
        );
    }

    #[test]
    fn blockaded_pawn_endgame_is_drawn() {
        // the bare king squats on the pawn's path
        let mut bd = Board::from_position_text("white: Kd4\nblack: Kc8 Pd5\n").unwrap();
        let mut pawn_tt = PawnTable::new(8);
        assert_eq!(evaluate(&mut bd, &mut pawn_tt).0, 0, "blockade draws");

        // the bare king is far away: the pawn should count
        let mut bd = Board::from_position_text("white: Kh1\nblack: Kc7 Pd5\n").unwrap();
        let mut pawn_tt = PawnTable::new(8);
        assert!(
            evaluate(&mut bd, &mut pawn_tt).0 < 0,
            "a free pawn wins material"
        );
    }

    #[test]
    fn bishop_knight_mate_prefers_the_right_corner() {
        // white has a dark-squared bishop: black belongs in a dark corner
        let cornered = "white: Ke1 Nb1 Bc1\nblack: Ka2\n";
        let central = "white: Ke1 Nb1 Bc1\nblack: Kd5\n";
        let wrong_corner = "white: Ke1 Nb1 Bc1\nblack: Ka7\n";
        let score = |text: &str| {
            let mut bd = Board::from_position_text(text).unwrap();
            // arm the lone-king trigger the way a real game would
            let moves = generate_all(&mut bd, Side::WHITE, &QuietOrdering::NONE);
            bd.note_played_move(moves[0]);
            let _ = generate_all(&mut bd, Side::BLACK, &QuietOrdering::NONE);
            let mut pawn_tt = PawnTable::new(8);
            evaluate(&mut bd, &mut pawn_tt).0
        };
        assert!(
            score(cornered) > score(central),
            "herding towards a1 must pay"
        );
        assert!(
            score(cornered) > score(wrong_corner),
            "the light corner is the wrong one"
        );
    }
}
