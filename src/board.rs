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

use arrayvec::ArrayVec;

use crate::defs::{Eval, Piece, Side, Square, MAX_STACK};
use crate::movegen::Move;
use self::zobrist::Key;

/// Zobrist keys and hash folding.
pub mod zobrist;

/// One cell of the mailbox: a piece code plus the slot it occupies in its
/// side's piece list.
#[derive(Clone, Copy)]
struct Cell {
    /// The piece code, [`Piece::EMPTY`] or [`Piece::FENCE`].
    piece: Piece,
    /// Index into the owner's piece list; meaningless for empty cells.
    slot: u8,
}

/// One piece slot of a side.
///
/// `mobility` is transient scratch space: move generation leaves the move
/// count (normalised per piece kind) here, and for pawns the evaluator
/// re-uses it to hold the passed-pawn score.
#[derive(Clone, Copy)]
pub struct PieceEntry {
    /// The current piece code (promotions rewrite it).
    pub piece: Piece,
    /// Where the piece stands; [`Square::NONE`] while captured.
    pub square: Square,
    /// Scratch: mobility, or the passed-pawn score for pawns.
    pub mobility: Eval,
}

/// The sixteen piece slots of one side.
///
/// Slot 0 is always the king. Captured slots stay in place so unmake can
/// revive them; the `alive` mask says which slots are on the board, and
/// ascending-slot iteration visits king, queen, rooks, bishops, knights and
/// then pawns.
pub struct PieceList {
    /// The slots.
    pub entries: [PieceEntry; 16],
    /// One bit per slot; set while the piece is on the board.
    alive: u16,
}

/// The per-game flag word.
///
/// Bits 0..=5 record king/rook departures from their home squares (they gate
/// castling generation), bits 6..=7 remember that a side has castled (an
/// evaluation term), and bit 8 is the side to move. The hash folds in all
/// bits except the has-castled pair.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct GameFlags(pub u16);

/// What kind of stack unwinding a move needs beyond the plain piece shuffle.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Special {
    /// A regular move or capture.
    Normal,
    /// A castle; unmake also returns the rook.
    Castle,
    /// A promotion; unmake turns the piece back into a pawn.
    Promote,
}

/// One entry of the move stack.
#[derive(Clone, Copy)]
pub struct MoveRecord {
    /// The move that was made.
    pub mv: Move,
    /// How to unwind it.
    pub special: Special,
    /// The captured piece code, or [`Piece::EMPTY`].
    pub captured: Piece,
    /// The captured piece's slot.
    pub captured_slot: u8,
    /// Where the capture happened (differs from `mv.to` for en passant).
    pub capture_sq: Square,
    /// The position hash after the move.
    pub hash: Key,
    /// The pawn-only hash after the move.
    pub pawn_hash: Key,
    /// The material balance after the move.
    pub material: Eval,
}

/// One entry of the status stack: the state a move cannot recompute.
#[derive(Clone, Copy)]
struct StatusRecord {
    /// The flag word before the move.
    flags: GameFlags,
    /// The en-passant square before the move.
    ep: Square,
}

/// A chessboard together with its move and status stacks.
///
/// All search mutation goes through [`make_move`](Board::make_move) /
/// [`unmake_move`](Board::unmake_move), which keep the piece lists, king
/// caches, flags, hashes and material balance in lockstep. The lighter
/// [`try_move`](Board::try_move) / [`undo_try`](Board::undo_try) pair moves
/// pieces only and is used for quick legality probes.
pub struct Board {
    /// The 10×12 mailbox.
    cells: [Cell; Square::TOTAL],
    /// Piece lists, indexed by side.
    lists: [PieceList; 2],
    /// Cached king squares, indexed by side.
    kings: [Square; 2],
    /// Castling/side flags.
    flags: GameFlags,
    /// The en-passant target square, or [`Square::NONE`].
    ep: Square,
    /// Hash of the position the stacks grow from.
    base_hash: Key,
    /// Pawn hash of the stack-root position.
    base_pawn_hash: Key,
    /// Material balance of the stack-root position.
    base_material: Eval,
    /// The move stack.
    moves: ArrayVec<MoveRecord, MAX_STACK>,
    /// The status stack; always the same depth as the move stack.
    statuses: ArrayVec<StatusRecord, MAX_STACK>,
    /// Plies since the last capture or pawn move, in played-game terms.
    fifty: u32,
    /// Set once a side is down to a bare king standing on the board edge;
    /// arms the basic-mate evaluation terms.
    lone_king_edge: bool,
}

impl Cell {
    /// An empty playable cell.
    const EMPTY: Self = Self {
        piece: Piece::EMPTY,
        slot: 0,
    };
    /// An off-board cell.
    const FENCE: Self = Self {
        piece: Piece::FENCE,
        slot: 0,
    };
}

#[allow(clippy::missing_docs_in_private_items)]
impl GameFlags {
    const WK_MOVED: u16 = 1;
    const WRA_MOVED: u16 = 2;
    const WRH_MOVED: u16 = 4;
    const BK_MOVED: u16 = 8;
    const BRA_MOVED: u16 = 16;
    const BRH_MOVED: u16 = 32;
    const W_CASTLED: u16 = 64;
    const B_CASTLED: u16 = 128;
    const BLACK_TO_MOVE: u16 = 256;
    /// The bits folded into the position hash (everything but has-castled).
    pub const HASHED: u16 = 0b1_0011_1111;

    /// No flags set: starting-position rights, White to move.
    const fn new() -> Self {
        Self(0)
    }

    /// The king-departure bit of `side`.
    const fn king_bit(side: Side) -> u16 {
        if side.0 == Side::WHITE.0 {
            Self::WK_MOVED
        } else {
            Self::BK_MOVED
        }
    }

    /// The rook-departure bit of `side`, kingside or queenside.
    const fn rook_bit(side: Side, kingside: bool) -> u16 {
        let white = side.0 == Side::WHITE.0;
        match (white, kingside) {
            (true, true) => Self::WRH_MOVED,
            (true, false) => Self::WRA_MOVED,
            (false, true) => Self::BRH_MOVED,
            (false, false) => Self::BRA_MOVED,
        }
    }

    /// Has the king of `side` left its home square?
    pub const fn king_moved(self, side: Side) -> bool {
        self.0 & Self::king_bit(side) != 0
    }

    /// Has the relevant rook of `side` left its home square?
    pub const fn rook_moved(self, side: Side, kingside: bool) -> bool {
        self.0 & Self::rook_bit(side, kingside) != 0
    }

    /// Has `side` castled (or reached the castled shape by hand)?
    pub const fn has_castled(self, side: Side) -> bool {
        let bit = if side.0 == Side::WHITE.0 {
            Self::W_CASTLED
        } else {
            Self::B_CASTLED
        };
        self.0 & bit != 0
    }

    /// Is it Black's turn?
    pub const fn black_to_move(self) -> bool {
        self.0 & Self::BLACK_TO_MOVE != 0
    }

    /// Marks the king of `side` as having moved.
    fn set_king_moved(&mut self, side: Side) {
        self.0 |= Self::king_bit(side);
    }

    /// Marks a rook of `side` as having moved.
    fn set_rook_moved(&mut self, side: Side, kingside: bool) {
        self.0 |= Self::rook_bit(side, kingside);
    }

    /// Marks `side` as having castled.
    fn set_castled(&mut self, side: Side) {
        self.0 |= if side == Side::WHITE {
            Self::W_CASTLED
        } else {
            Self::B_CASTLED
        };
    }

    /// Sets the side to move.
    fn set_side_to_move(&mut self, side: Side) {
        if side == Side::BLACK {
            self.0 |= Self::BLACK_TO_MOVE;
        } else {
            self.0 &= !Self::BLACK_TO_MOVE;
        }
    }
}

impl PieceList {
    /// A fresh list: the classic slot layout, everything off the board.
    fn new() -> Self {
        let kinds: [u8; 16] = [7, 6, 5, 5, 4, 4, 3, 3, 2, 2, 2, 2, 2, 2, 2, 2];
        let mut entries = [PieceEntry {
            piece: Piece::EMPTY,
            square: Square::NONE,
            mobility: 0,
        }; 16];
        for (entry, &kind) in entries.iter_mut().zip(kinds.iter()) {
            entry.piece = Piece(kind);
        }
        Self {
            entries,
            alive: 0xffff,
        }
    }

    /// Recolours the default piece codes for `side`.
    fn colour(&mut self, side: Side) {
        for entry in &mut self.entries {
            entry.piece = Piece::from_rel(entry.piece.rel(), side);
        }
    }

    /// Checks whether `slot` is on the board.
    pub const fn is_alive(&self, slot: usize) -> bool {
        self.alive & (1 << slot) != 0
    }

    /// The entry at `slot`, if it is on the board.
    pub fn alive(&self, slot: usize) -> Option<&PieceEntry> {
        self.is_alive(slot).then(|| &self.entries[slot])
    }

    /// The number of pieces of this side on the board.
    pub const fn count(&self) -> usize {
        self.alive.count_ones() as usize
    }

    /// Takes `slot` off the board.
    fn kill(&mut self, slot: usize) {
        self.alive &= !(1 << slot);
    }

    /// Puts `slot` back on the board.
    fn revive(&mut self, slot: usize) {
        self.alive |= 1 << slot;
    }

    /// Drops slots that were never given a square during setup.
    fn prune_missing(&mut self) {
        for slot in 0..16 {
            if !self.entries[slot].square.is_some() {
                self.kill(slot);
            }
        }
    }
}

/// The home square of `side`'s king.
const fn king_home(side: Side) -> Square {
    if side.0 == Side::WHITE.0 {
        Square::E1
    } else {
        Square::E8
    }
}

/// The home square of a rook of `side`.
const fn rook_home(side: Side, kingside: bool) -> Square {
    let white = side.0 == Side::WHITE.0;
    match (white, kingside) {
        (true, true) => Square::H1,
        (true, false) => Square::A1,
        (false, true) => Square::H8,
        (false, false) => Square::A8,
    }
}

impl Board {
    /// Creates an empty board: fence ring, bare cells, all pieces parked.
    pub fn empty() -> Self {
        let mut cells = [Cell::FENCE; Square::TOTAL];
        for rank in 1..=8 {
            for file in 1..=8 {
                cells[Square::from_file_rank(file, rank).to_index()] = Cell::EMPTY;
            }
        }
        let mut white = PieceList::new();
        white.colour(Side::WHITE);
        let mut black = PieceList::new();
        black.colour(Side::BLACK);
        Self {
            cells,
            lists: [black, white],
            kings: [Square::NONE; 2],
            flags: GameFlags::new(),
            ep: Square::NONE,
            base_hash: 0,
            base_pawn_hash: 0,
            base_material: 0,
            moves: ArrayVec::new(),
            statuses: ArrayVec::new(),
            fifty: 0,
            lone_king_edge: false,
        }
    }

    /// Resets the board to empty, keeping nothing.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Sets up the standard starting position.
    pub fn startpos() -> Self {
        let mut bd = Self::empty();
        let back: [(u8, Square, Square); 8] = [
            (b'K', Square::E1, Square::E8),
            (b'Q', Square::D1, Square::D8),
            (b'R', Square::A1, Square::A8),
            (b'R', Square::H1, Square::H8),
            (b'B', Square::F1, Square::F8),
            (b'B', Square::C1, Square::C8),
            (b'N', Square::G1, Square::G8),
            (b'N', Square::B1, Square::B8),
        ];
        for (letter, white_sq, black_sq) in back {
            bd.place(letter, Side::WHITE, white_sq)
                .expect("starting position is well-formed");
            bd.place(letter, Side::BLACK, black_sq)
                .expect("starting position is well-formed");
        }
        for file in 1..=8 {
            bd.place(b'P', Side::WHITE, Square::from_file_rank(file, 2))
                .expect("starting position is well-formed");
            bd.place(b'P', Side::BLACK, Square::from_file_rank(file, 7))
                .expect("starting position is well-formed");
        }
        bd.finalize_setup()
            .expect("starting position is well-formed");
        bd
    }

    /// Places one piece during setup (position files, `edit` mode).
    ///
    /// `letter` is one of `KQRBNP`. Pieces beyond the classic complement
    /// reuse free pawn slots as promoted pieces. Errors are authoring
    /// errors and carry a printable message.
    pub fn place(&mut self, letter: u8, side: Side, square: Square) -> Result<(), String> {
        let colour = if side == Side::WHITE { "white" } else { "black" };
        if !self.cell(square).piece.is_empty() {
            return Err(format!("Illegal Position. Square {square} occupied twice."));
        }
        let (first, name): (&[usize], &str) = match letter {
            b'K' => (&[0], "kings"),
            b'Q' => (&[1], "queens"),
            b'R' => (&[2, 3], "rooks"),
            b'B' => (&[4, 5], "bishops"),
            b'N' => (&[6, 7], "knights"),
            b'P' => {
                if square.rank() == 1 || square.rank() == 8 {
                    return Err(format!("Illegal {colour} pawn on {square}."));
                }
                (&[], "pawns")
            }
            _ => return Err(format!("Unknown piece letter '{}'.", letter as char)),
        };
        let list = &mut self.lists[side.to_index()];
        let mut slot = None;
        for &candidate in first {
            if !list.entries[candidate].square.is_some() {
                slot = Some(candidate);
                break;
            }
        }
        if slot.is_none() && letter != b'K' {
            // overflow into a free pawn slot as a promoted piece
            slot = (8..16).find(|&candidate| !list.entries[candidate].square.is_some());
            if letter != b'P' {
                if let Some(candidate) = slot {
                    list.entries[candidate].piece =
                        Piece::from_rel(i32::from(letter_rel(letter)), side);
                }
            }
        }
        let Some(slot) = slot else {
            return Err(format!("Illegal Position. Too many {colour} {name}."));
        };
        list.entries[slot].square = square;
        if letter == b'K' {
            self.kings[side.to_index()] = square;
        }
        let piece = self.lists[side.to_index()].entries[slot].piece;
        self.cells[square.to_index()] = Cell {
            piece,
            slot: slot as u8,
        };
        Ok(())
    }

    /// Finishes a setup: prunes absent pieces, derives the castling flags
    /// from home squares, resets the stacks and game counters, and seeds
    /// the incremental hashes and material.
    pub fn finalize_setup(&mut self) -> Result<(), String> {
        if !self.kings[0].is_some() || !self.kings[1].is_some() {
            return Err("Illegal Position. King(s) missing.".to_owned());
        }
        for list in &mut self.lists {
            list.prune_missing();
        }
        let mut flags = GameFlags::new();
        for side in [Side::WHITE, Side::BLACK] {
            if self.kings[side.to_index()] != king_home(side) {
                flags.set_king_moved(side);
                flags.set_castled(side);
            }
            for kingside in [true, false] {
                if self.piece_on(rook_home(side, kingside)) != Piece::from_rel(5, side) {
                    flags.set_rook_moved(side, kingside);
                }
            }
        }
        flags.set_side_to_move(if self.flags.black_to_move() {
            Side::BLACK
        } else {
            Side::WHITE
        });
        self.flags = flags;
        self.ep = Square::NONE;
        self.moves.clear();
        self.statuses.clear();
        self.fifty = 0;
        self.lone_king_edge = false;
        self.reseed();
        Ok(())
    }

    /// Parses the two-section position text format:
    ///
    /// ```text
    /// white: Ke1 Ra1 Pe2, e4
    /// black: Ke8 Qd8
    /// ```
    ///
    /// A line containing `white`/`black` switches the section; pieces are
    /// `<Letter><square>` with the `P` optional for pawns.
    pub fn from_position_text(text: &str) -> Result<Self, String> {
        let mut bd = Self::empty();
        let mut side = None;
        for (number, line) in text.lines().enumerate() {
            let lowered = line.to_lowercase();
            if lowered.contains("white") {
                side = Some(Side::WHITE);
                continue;
            }
            if lowered.contains("black") {
                side = Some(Side::BLACK);
                continue;
            }
            let Some(side) = side else {
                continue;
            };
            bd.parse_piece_line(line, side)
                .map_err(|message| format!("Error in position line {}: {message}", number + 1))?;
        }
        bd.finalize_setup()?;
        Ok(bd)
    }

    /// Parses the piece entries of one section line.
    fn parse_piece_line(&mut self, line: &str, side: Side) -> Result<(), String> {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b' ' | b'\t' | b',' => i += 1,
                letter @ (b'K' | b'Q' | b'R' | b'B' | b'N' | b'P') => {
                    let square = parse_square_at(bytes, i + 1)
                        .ok_or_else(|| format!("bad square after '{}'", letter as char))?;
                    self.place(letter, side, square)?;
                    i += 3;
                }
                b'a'..=b'h' => {
                    let square =
                        parse_square_at(bytes, i).ok_or_else(|| "bad pawn square".to_owned())?;
                    self.place(b'P', side, square)?;
                    i += 2;
                }
                other => return Err(format!("unexpected character '{}'", other as char)),
            }
        }
        Ok(())
    }

    /// Recomputes the stack-root hashes and material from the board.
    fn reseed(&mut self) {
        let (hash, pawn_hash) = self.compute_hashes();
        self.base_hash = hash;
        self.base_pawn_hash = pawn_hash;
        self.base_material = self.compute_material();
    }

    /// Sums signed piece values from scratch.
    pub fn compute_material(&self) -> Eval {
        let mut material = 0;
        for list in &self.lists {
            for slot in 0..16 {
                if let Some(entry) = list.alive(slot) {
                    material += entry.piece.signed_value();
                }
            }
        }
        material
    }

    /// Sets the side to move of a freshly set up position.
    pub fn set_side_to_move(&mut self, side: Side) {
        debug_assert!(self.moves.is_empty(), "side is fixed once moves are on the stack");
        self.flags.set_side_to_move(side);
        self.reseed();
    }

    /// The side to move.
    pub const fn side_to_move(&self) -> Side {
        if self.flags.black_to_move() {
            Side::BLACK
        } else {
            Side::WHITE
        }
    }

    /// The cell at `square`.
    const fn cell(&self, square: Square) -> Cell {
        self.cells[square.to_index()]
    }

    /// Overwrites the cell at `square`.
    fn set_cell(&mut self, square: Square, cell: Cell) {
        self.cells[square.to_index()] = cell;
    }

    /// The piece code on `square` (possibly empty or fence).
    pub const fn piece_on(&self, square: Square) -> Piece {
        self.cells[square.to_index()].piece
    }

    /// The king square of `side`.
    pub const fn king(&self, side: Side) -> Square {
        self.kings[side.to_index()]
    }

    /// The en-passant target square, or [`Square::NONE`].
    pub const fn ep_square(&self) -> Square {
        self.ep
    }

    /// The flag word.
    pub const fn flags(&self) -> GameFlags {
        self.flags
    }

    /// The piece list of `side`.
    pub fn pieces(&self, side: Side) -> &PieceList {
        &self.lists[side.to_index()]
    }

    /// The piece list of `side`, mutably.
    pub fn pieces_mut(&mut self, side: Side) -> &mut PieceList {
        &mut self.lists[side.to_index()]
    }

    /// The current position hash.
    pub fn hash(&self) -> Key {
        self.moves.last().map_or(self.base_hash, |record| record.hash)
    }

    /// The current pawn-only hash.
    pub fn pawn_hash(&self) -> Key {
        self.moves
            .last()
            .map_or(self.base_pawn_hash, |record| record.pawn_hash)
    }

    /// The current material balance (positive is good for White).
    pub fn material(&self) -> Eval {
        self.moves
            .last()
            .map_or(self.base_material, |record| record.material)
    }

    /// The number of moves on the stack.
    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    /// The record of the most recent move, if any.
    pub fn last_record(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    /// Whether the lone-king-on-edge endgame terms are armed.
    pub const fn lone_king_edge(&self) -> bool {
        self.lone_king_edge
    }

    /// Plies since the last capture or pawn move in the played game.
    pub const fn fifty_moves(&self) -> u32 {
        self.fifty
    }

    /// Makes `mv` on the board, pushing one entry on each stack and updating
    /// the hashes, flags and material incrementally.
    ///
    /// The move must be pseudo-legal for the side whose piece stands on
    /// `mv.from`; leaving the own king in check is the caller's problem.
    pub fn make_move(&mut self, mv: Move) {
        self.statuses.push(StatusRecord {
            flags: self.flags,
            ep: self.ep,
        });
        let old_flags = self.flags;
        let old_ep = self.ep;
        let from = mv.from;
        let to = mv.to;
        let moving = self.cell(from);
        let moving_piece = moving.piece;
        let slot = moving.slot as usize;
        let side = moving_piece.side();
        let fwd = side.forward();
        let mut special = Special::Normal;
        let mut capture_sq = to;
        self.ep = Square::NONE;

        if moving_piece.is_pawn() {
            let diff = i16::from(to.0) - i16::from(from.0);
            if (diff == fwd - 1 || diff == fwd + 1) && self.piece_on(to).is_empty() {
                capture_sq = to.offset(-fwd);
            } else {
                if mv.promotion().is_some() {
                    special = Special::Promote;
                }
                if diff == 2 * fwd {
                    let enemy_pawn = Piece::pawn_of(side.flip());
                    if self.piece_on(to.offset(1)) == enemy_pawn
                        || self.piece_on(to.offset(-1)) == enemy_pawn
                    {
                        self.ep = from.offset(fwd);
                    }
                }
            }
        }

        let captured_cell = self.cell(capture_sq);
        let captured = captured_cell.piece;
        let captured_slot = captured_cell.slot;
        if !captured.is_empty() {
            let list = &mut self.lists[captured.side().to_index()];
            list.entries[captured_slot as usize].square = Square::NONE;
            list.kill(captured_slot as usize);
            self.set_cell(capture_sq, Cell::EMPTY);
        }

        let placed = if special == Special::Promote {
            Piece(mv.flag)
        } else {
            moving_piece
        };
        {
            let entry = &mut self.lists[side.to_index()].entries[slot];
            entry.square = to;
            entry.piece = placed;
        }
        self.set_cell(from, Cell::EMPTY);
        self.set_cell(
            to,
            Cell {
                piece: placed,
                slot: slot as u8,
            },
        );

        let mut rook_move = None;
        if moving_piece.is_king() {
            self.kings[side.to_index()] = to;
            let home = king_home(side);
            if from == home {
                self.flags.set_king_moved(side);
                if to == home.offset(2) {
                    let (rf, rt) = (rook_home(side, true), home.offset(1));
                    self.shift_piece(rf, rt);
                    rook_move = Some((rf, rt));
                    special = Special::Castle;
                    self.flags.set_castled(side);
                    self.flags.set_rook_moved(side, true);
                } else if to == home.offset(-2) {
                    let (rf, rt) = (rook_home(side, false), home.offset(-1));
                    self.shift_piece(rf, rt);
                    rook_move = Some((rf, rt));
                    special = Special::Castle;
                    self.flags.set_castled(side);
                    self.flags.set_rook_moved(side, false);
                }
            }
            // the castled shape reached by hand still counts for king safety
            if to == home.offset(2)
                && self.piece_on(home.offset(1)) == Piece::from_rel(5, side)
                && self.piece_on(rook_home(side, true)).is_empty()
            {
                self.flags.set_castled(side);
            }
        } else if moving_piece.rel() == 5 {
            if from == rook_home(side, false) {
                self.flags.set_rook_moved(side, false);
            } else if from == rook_home(side, true) {
                self.flags.set_rook_moved(side, true);
            }
        }
        self.flags.set_side_to_move(side.flip());

        let mut hash = self.hash();
        let mut pawn_hash = self.pawn_hash();
        let mut material = self.material();
        hash ^= zobrist::flags_key(old_flags) ^ zobrist::flags_key(self.flags);
        hash ^= zobrist::ep_key(old_ep) ^ zobrist::ep_key(self.ep);
        let out_key = zobrist::piece_square_key(moving_piece, from);
        hash ^= out_key;
        if moving_piece.is_pawn() {
            pawn_hash ^= out_key;
        }
        let in_key = zobrist::piece_square_key(placed, to);
        hash ^= in_key;
        if placed.is_pawn() {
            pawn_hash ^= in_key;
        }
        if special == Special::Promote {
            material += placed.signed_value() - moving_piece.signed_value();
        }
        if let Some((rf, rt)) = rook_move {
            let rook = Piece::from_rel(5, side);
            hash ^= zobrist::piece_square_key(rook, rf) ^ zobrist::piece_square_key(rook, rt);
        }
        if !captured.is_empty() {
            let cap_key = zobrist::piece_square_key(captured, capture_sq);
            hash ^= cap_key;
            if captured.is_pawn() {
                pawn_hash ^= cap_key;
            }
            material -= captured.signed_value();
        }

        self.moves.push(MoveRecord {
            mv,
            special,
            captured,
            captured_slot,
            capture_sq,
            hash,
            pawn_hash,
            material,
        });
    }

    /// Unmakes the most recent move, restoring the board bit-exactly.
    pub fn unmake_move(&mut self) {
        let record = self.moves.pop().expect("unmake with an empty move stack");
        self.retract(&record);
        let status = self
            .statuses
            .pop()
            .expect("status stack out of step with move stack");
        self.flags = status.flags;
        self.ep = status.ep;
    }

    /// Applies `mv` without touching flags, en passant, hashes or the alive
    /// mask. Cheap enough for pure legality probes; must be undone with
    /// [`undo_try`](Self::undo_try) before anything else happens.
    pub fn try_move(&mut self, mv: Move) {
        let from = mv.from;
        let to = mv.to;
        let moving = self.cell(from);
        let moving_piece = moving.piece;
        let slot = moving.slot as usize;
        let side = moving_piece.side();
        let fwd = side.forward();
        let mut special = Special::Normal;
        let mut capture_sq = to;

        if moving_piece.is_pawn() {
            let diff = i16::from(to.0) - i16::from(from.0);
            if (diff == fwd - 1 || diff == fwd + 1) && self.piece_on(to).is_empty() {
                capture_sq = to.offset(-fwd);
            } else if mv.promotion().is_some() {
                special = Special::Promote;
            }
        }

        let captured_cell = self.cell(capture_sq);
        let captured = captured_cell.piece;
        let captured_slot = captured_cell.slot;
        if !captured.is_empty() {
            self.lists[captured.side().to_index()].entries[captured_slot as usize].square =
                Square::NONE;
            self.set_cell(capture_sq, Cell::EMPTY);
        }
        let placed = if special == Special::Promote {
            Piece(mv.flag)
        } else {
            moving_piece
        };
        {
            let entry = &mut self.lists[side.to_index()].entries[slot];
            entry.square = to;
            entry.piece = placed;
        }
        self.set_cell(from, Cell::EMPTY);
        self.set_cell(
            to,
            Cell {
                piece: placed,
                slot: slot as u8,
            },
        );
        if moving_piece.is_king() {
            self.kings[side.to_index()] = to;
            let home = king_home(side);
            if from == home {
                if to == home.offset(2) {
                    self.shift_piece(rook_home(side, true), home.offset(1));
                    special = Special::Castle;
                } else if to == home.offset(-2) {
                    self.shift_piece(rook_home(side, false), home.offset(-1));
                    special = Special::Castle;
                }
            }
        }

        self.moves.push(MoveRecord {
            mv,
            special,
            captured,
            captured_slot,
            capture_sq,
            hash: self.hash(),
            pawn_hash: self.pawn_hash(),
            material: self.material(),
        });
    }

    /// Undoes a [`try_move`](Self::try_move).
    pub fn undo_try(&mut self) {
        let record = self.moves.pop().expect("undo_try with an empty move stack");
        self.retract(&record);
    }

    /// The piece-movement half of unmaking, shared by the full and the
    /// lightweight paths.
    fn retract(&mut self, record: &MoveRecord) {
        let from = record.mv.from;
        let to = record.mv.to;
        let cell = self.cell(to);
        let side = cell.piece.side();
        let slot = cell.slot as usize;
        let restored = if record.special == Special::Promote {
            Piece::pawn_of(side)
        } else {
            cell.piece
        };
        {
            let entry = &mut self.lists[side.to_index()].entries[slot];
            entry.square = from;
            entry.piece = restored;
        }
        self.set_cell(to, Cell::EMPTY);
        self.set_cell(
            from,
            Cell {
                piece: restored,
                slot: slot as u8,
            },
        );
        if !record.captured.is_empty() {
            let list = &mut self.lists[record.captured.side().to_index()];
            list.entries[record.captured_slot as usize].square = record.capture_sq;
            list.revive(record.captured_slot as usize);
            self.set_cell(
                record.capture_sq,
                Cell {
                    piece: record.captured,
                    slot: record.captured_slot,
                },
            );
        }
        if restored.is_king() {
            self.kings[side.to_index()] = from;
        }
        if record.special == Special::Castle {
            let home = king_home(side);
            if to == home.offset(2) {
                self.shift_piece(home.offset(1), rook_home(side, true));
            } else if to == home.offset(-2) {
                self.shift_piece(home.offset(-1), rook_home(side, false));
            } else {
                panic!("corrupt castle record: king {from}{to}");
            }
        }
    }

    /// Moves the piece on `from` to the empty square `to`, cells and piece
    /// list only.
    fn shift_piece(&mut self, from: Square, to: Square) {
        let cell = self.cell(from);
        self.lists[cell.piece.side().to_index()].entries[cell.slot as usize].square = to;
        self.set_cell(to, cell);
        self.set_cell(from, Cell::EMPTY);
    }

    /// Updates the played-game counters before `mv` is made: the fifty-move
    /// clock and the lone-king-on-edge trigger.
    pub fn note_played_move(&mut self, mv: Move) {
        self.fifty += 1;
        if self.piece_on(mv.from).is_pawn() || !self.piece_on(mv.to).is_empty() {
            self.fifty = 0;
        }
        for side in [Side::WHITE, Side::BLACK] {
            let king = self.kings[side.to_index()];
            if self.lists[side.to_index()].count() == 1
                && (king.rank() == 1 || king.rank() == 8 || king.file() == 1 || king.file() == 8)
            {
                self.lone_king_edge = true;
            }
        }
    }

    /// Counts how often the current position has occurred, the stack root
    /// and the current position itself included.
    pub fn repetitions(&self) -> usize {
        let current = self.hash();
        usize::from(self.base_hash == current)
            + self
                .moves
                .iter()
                .filter(|record| record.hash == current)
                .count()
    }

    /// The search's cheap repetition test: does the current position repeat
    /// an earlier same-side-to-move position with no capture or pawn move in
    /// between?
    pub fn repeated_since_irreversible(&self) -> bool {
        let Some(current) = self.moves.last().map(|record| record.hash) else {
            return false;
        };
        let mut index = self.moves.len() as i32 - 3;
        while index >= 0 {
            let record = &self.moves[index as usize];
            if !record.captured.is_empty() || record.mv.flag > 1 {
                return false;
            }
            if record.hash == current {
                return true;
            }
            index -= 2;
        }
        false
    }

    /// Prints the board to stderr, White at the bottom.
    pub fn pretty_print(&self) {
        eprintln!();
        for rank in (1..=8).rev() {
            let mut row = format!(" {rank}  ");
            for file in 1..=8 {
                let piece = self.piece_on(Square::from_file_rank(file, rank));
                row.push(if piece.is_empty() {
                    if Square::from_file_rank(file, rank).is_light() {
                        '.'
                    } else {
                        '-'
                    }
                } else {
                    piece.to_string().chars().next().unwrap_or('?')
                });
                row.push(' ');
            }
            eprintln!("{row}");
        }
        eprintln!();
        eprintln!("    a b c d e f g h");
        eprintln!();
    }
}

/// Decodes a two-byte algebraic square at `offset`, if present and valid.
fn parse_square_at(bytes: &[u8], offset: usize) -> Option<Square> {
    let file = *bytes.get(offset)?;
    let rank = *bytes.get(offset + 1)?;
    if (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank) {
        Some(Square::from_file_rank(file - b'a' + 1, rank - b'1' + 1))
    } else {
        None
    }
}

/// The colour-relative code of a setup letter.
const fn letter_rel(letter: u8) -> u8 {
    match letter {
        b'Q' => 6,
        b'R' => 5,
        b'B' => 4,
        b'N' => 3,
        _ => 2,
    }
}

#[cfg(test)]
impl Board {
    /// Checks every structural invariant; test support.
    pub fn assert_consistent(&self) {
        assert_eq!(
            self.moves.len(),
            self.statuses.len(),
            "move and status stacks out of step"
        );
        for side in [Side::WHITE, Side::BLACK] {
            let king = self.kings[side.to_index()];
            assert_eq!(
                self.piece_on(king),
                Piece::king_of(side),
                "king cache points at a non-king"
            );
            let list = self.pieces(side);
            assert!(list.is_alive(0), "a king can never be captured");
            for slot in 0..16 {
                if let Some(entry) = list.alive(slot) {
                    assert!(entry.square.is_some(), "alive piece without a square");
                    let cell = self.cell(entry.square);
                    assert_eq!(cell.piece, entry.piece, "cell/list piece mismatch");
                    assert_eq!(cell.slot as usize, slot, "cell/list slot mismatch");
                } else {
                    assert!(
                        !list.entries[slot].square.is_some(),
                        "captured piece still claims a square"
                    );
                }
            }
        }
        let (hash, pawn_hash) = self.compute_hashes();
        assert_eq!(self.hash(), hash, "incremental hash diverged");
        assert_eq!(self.pawn_hash(), pawn_hash, "incremental pawn hash diverged");
        assert_eq!(
            self.material(),
            self.compute_material(),
            "incremental material diverged"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::Board;
    use crate::defs::{Piece, Side, Square};
    use crate::movegen::{generate_all, in_check, Move, QuietOrdering};

    /// Finds the legal move going `from`→`to`, if any.
    fn find_move(bd: &mut Board, side: Side, from: Square, to: Square) -> Option<Move> {
        let moves = generate_all(bd, side, &QuietOrdering::NONE);
        for &mv in &moves {
            if mv.from == from && mv.to == to {
                bd.make_move(mv);
                let legal = !in_check(bd, side);
                bd.unmake_move();
                if legal {
                    return Some(mv);
                }
            }
        }
        None
    }

    /// Plays a sequence of coordinate moves, asserting each one is legal.
    fn play(bd: &mut Board, moves: &[(&str, &str)]) {
        let mut side = bd.side_to_move();
        for &(from, to) in moves {
            let from = from.parse().expect("test square must parse");
            let to = to.parse().expect("test square must parse");
            let mv = find_move(bd, side, from, to).expect("scripted move must be legal");
            bd.make_move(mv);
            side = side.flip();
        }
    }

    #[test]
    fn startpos_is_consistent() {
        let bd = Board::startpos();
        bd.assert_consistent();
        assert_eq!(bd.side_to_move(), Side::WHITE, "White starts");
        assert_eq!(bd.material(), 0, "balanced material at the start");
    }

    #[test]
    fn make_unmake_restores_everything() {
        let mut bd = Board::startpos();
        let before = (bd.hash(), bd.pawn_hash(), bd.material(), bd.flags());
        play(
            &mut bd,
            &[("e2", "e4"), ("d7", "d5"), ("e4", "d5"), ("d8", "d5")],
        );
        bd.assert_consistent();
        for _ in 0..4 {
            bd.unmake_move();
            bd.assert_consistent();
        }
        assert_eq!(bd.hash(), before.0, "hash must be restored");
        assert_eq!(bd.pawn_hash(), before.1, "pawn hash must be restored");
        assert_eq!(bd.material(), before.2, "material must be restored");
        assert!(bd.flags() == before.3, "flags must be restored");
    }

    #[test]
    fn en_passant_square_and_capture() {
        let mut bd = Board::startpos();
        play(
            &mut bd,
            &[("e2", "e4"), ("a7", "a6"), ("e4", "e5"), ("d7", "d5")],
        );
        assert_eq!(bd.ep_square(), Square::D6, "d6 is the en-passant square");
        let hash_before = bd.hash();
        let mv = find_move(&mut bd, Side::WHITE, Square::E5, Square::D6)
            .expect("exd6 en passant must be legal");
        bd.make_move(mv);
        bd.assert_consistent();
        assert!(
            bd.piece_on(Square::D5).is_empty(),
            "the d5 pawn is gone after exd6"
        );
        assert_eq!(bd.piece_on(Square::D6), Piece::WPAWN, "white pawn landed on d6");
        bd.unmake_move();
        bd.assert_consistent();
        assert_eq!(bd.hash(), hash_before, "unmake restores the hash");
        assert_eq!(bd.ep_square(), Square::D6, "unmake restores the ep square");
        assert_eq!(bd.piece_on(Square::D5), Piece::BPAWN, "the d5 pawn is back");
    }

    #[test]
    fn castling_moves_the_rook_and_back() {
        let mut bd =
            Board::from_position_text("white: Ke1 Ra1 Rh1 Pa2\nblack: Ke8 Pa7\n").unwrap();
        let mv = find_move(&mut bd, Side::WHITE, Square::E1, Square::G1)
            .expect("short castle must be legal");
        bd.make_move(mv);
        bd.assert_consistent();
        assert_eq!(bd.piece_on(Square::F1), Piece::WROOK, "rook hops to f1");
        assert!(bd.flags().has_castled(Side::WHITE), "castled flag set");
        bd.unmake_move();
        bd.assert_consistent();
        assert_eq!(bd.piece_on(Square::H1), Piece::WROOK, "rook back on h1");
        assert!(!bd.flags().has_castled(Side::WHITE), "castled flag cleared");
    }

    #[test]
    fn promotion_rewrites_and_restores_the_pawn() {
        let mut bd = Board::from_position_text("white: Kh1 Pa7\nblack: Kh8 Rb8\n").unwrap();
        let mv = find_move(&mut bd, Side::WHITE, Square::A7, Square::B8)
            .expect("axb8 promotion capture must be legal");
        // the generator emits the queen promotion first for this square pair
        assert_eq!(mv.promotion(), Some(Piece::WQUEEN), "queen promotion found");
        bd.make_move(mv);
        bd.assert_consistent();
        assert_eq!(bd.piece_on(Square::B8), Piece::WQUEEN, "queen on b8");
        bd.unmake_move();
        bd.assert_consistent();
        assert_eq!(bd.piece_on(Square::A7), Piece::WPAWN, "pawn back on a7");
        assert_eq!(bd.piece_on(Square::B8), Piece::BROOK, "rook restored on b8");
    }

    #[test]
    fn threefold_counts_the_root_position() {
        let mut bd = Board::startpos();
        play(
            &mut bd,
            &[
                ("g1", "f3"),
                ("g8", "f6"),
                ("f3", "g1"),
                ("f6", "g8"),
                ("g1", "f3"),
                ("g8", "f6"),
                ("f3", "g1"),
                ("f6", "g8"),
            ],
        );
        assert_eq!(
            bd.repetitions(),
            3,
            "start position seen three times: root plus two returns"
        );
    }

    #[test]
    fn random_walk_keeps_every_invariant() {
        let mut rng = oorandom::Rand64::new(0x5eed);
        let mut bd = Board::startpos();
        let mut side = Side::WHITE;
        let mut made = 0;
        for _ in 0..160 {
            let moves = generate_all(&mut bd, side, &QuietOrdering::NONE);
            let mut legal = Vec::new();
            for &mv in &moves {
                if bd.piece_on(mv.to).is_king() {
                    continue;
                }
                bd.make_move(mv);
                let ok = !in_check(&bd, side);
                bd.unmake_move();
                if ok {
                    legal.push(mv);
                }
            }
            if legal.is_empty() {
                break;
            }
            let pick = rng.rand_range(0..legal.len() as u64) as usize;
            bd.make_move(legal[pick]);
            bd.assert_consistent();
            side = side.flip();
            made += 1;
        }
        for _ in 0..made {
            bd.unmake_move();
        }
        bd.assert_consistent();
        let fresh = Board::startpos();
        assert_eq!(bd.hash(), fresh.hash(), "walk unwound to the start position");
    }
}
