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

use std::io::{self, BufRead, Write};
use std::process::exit;
use std::time::Duration;

use crate::board::Board;
use crate::book::Book;
use crate::defs::{Side, Square};
use crate::movegen::{generate_all, in_check, CoordMove, Move, MoveList, QuietOrdering};
use crate::search::{Post, SearchOutcome, Searcher};

/// Assumed game length for the time allocator.
const AVERAGE_MOVE_NO: u64 = 40;

/// The XBoard protocol loop.
///
/// The state machine is simple: while the side to move is the engine's, it
/// thinks and moves; otherwise it blocks on the next command. Game-ending
/// results drop the engine back into force mode.
pub fn xboard_loop(bd: &mut Board, searcher: &mut Searcher, book: &mut Book) {
    searcher.set_post(Post::Xboard);
    let mut side = Side::WHITE;
    let mut computer = Side::NONE;
    let mut max_time = Duration::from_secs(15);
    let mut move_no = AVERAGE_MOVE_NO;
    let mut incr: u64 = 0;
    let mut start_ply: usize = 0;
    let stdin = io::stdin();
    println!();

    loop {
        let _ = io::stdout().flush();
        if side == computer {
            engine_turn(bd, searcher, book, &mut side, &mut computer, max_time);
            continue;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end();
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            continue;
        };
        match command {
            "new" => {
                *bd = Board::startpos();
                book.reset();
                searcher.new_game();
                side = Side::WHITE;
                computer = Side::BLACK;
                start_ply = 0;
            }
            "quit" => return,
            "force" => computer = Side::NONE,
            "white" => {
                side = Side::WHITE;
                computer = Side::BLACK;
                if bd.ply() == 0 {
                    bd.set_side_to_move(Side::WHITE);
                }
                start_ply = bd.ply();
            }
            "black" => {
                side = Side::BLACK;
                computer = Side::WHITE;
                if bd.ply() == 0 {
                    bd.set_side_to_move(Side::BLACK);
                }
                start_ply = bd.ply();
            }
            "go" => {
                computer = side;
                start_ply = bd.ply();
            }
            "time" => {
                let centis: u64 = tokens
                    .next()
                    .and_then(|token| token.parse().ok())
                    .unwrap_or(0);
                let clock_ply = bd.ply() + usize::from(computer == Side::WHITE);
                if move_no != 0 {
                    // classical: divide what is left over the moves left
                    if clock_ply != 0 && clock_ply % (2 * move_no as usize) == 0 {
                        start_ply = clock_ply;
                    }
                    let played = clock_ply.saturating_sub(start_ply) / 2;
                    let remaining = move_no.saturating_sub(played as u64);
                    let divisor = if remaining > 0 {
                        remaining
                    } else {
                        AVERAGE_MOVE_NO - 10
                    };
                    max_time = Duration::from_millis(centis * 10 / divisor);
                } else if incr != 0 {
                    // increment games fall back to the increment late on
                    if clock_ply > (2 * AVERAGE_MOVE_NO as usize) - 10 {
                        max_time = Duration::from_secs(incr);
                    }
                } else if clock_ply > (3 * AVERAGE_MOVE_NO as usize) - 10 {
                    max_time = Duration::from_millis(centis * 10 / (AVERAGE_MOVE_NO / 2));
                }
            }
            "level" => {
                let m: u64 = tokens
                    .next()
                    .and_then(|token| token.parse().ok())
                    .unwrap_or(0);
                // minutes may arrive as "M" or "M:SS"; the seconds are noise
                let t: u64 = tokens
                    .next()
                    .and_then(|token| token.split(':').next())
                    .and_then(|minutes| minutes.parse().ok())
                    .unwrap_or(0);
                let i: u64 = tokens
                    .next()
                    .and_then(|token| token.parse().ok())
                    .unwrap_or(0);
                move_no = m;
                incr = i;
                max_time = if m != 0 {
                    Duration::from_millis(t * 60_000 / m)
                } else if i != 0 {
                    Duration::from_millis(t * 60_000 / AVERAGE_MOVE_NO + i * 1_000)
                } else {
                    Duration::from_millis(t * 60_000 / (2 * AVERAGE_MOVE_NO))
                };
            }
            "post" => searcher.set_post(Post::Xboard),
            "nopost" => searcher.set_post(Post::Quiet),
            "hint" => {
                let legal = legal_moves(bd, side);
                let hinted = book.consult(&legal, side).or_else(|| {
                    match searcher.search_best(bd, side, max_time) {
                        SearchOutcome::Move { mv, .. } => Some(mv),
                        _ => None,
                    }
                });
                if let Some(mv) = hinted {
                    println!("Hint: {mv}");
                }
            }
            "undo" => {
                if bd.ply() > 0 {
                    bd.unmake_move();
                    side = side.flip();
                }
            }
            "remove" => {
                if bd.ply() > 1 {
                    bd.unmake_move();
                    bd.unmake_move();
                }
            }
            "edit" => {
                edit_position(bd, &stdin);
                book.deactivate();
                searcher.new_game();
                start_ply = 0;
            }
            "protover" => println!("feature time=1 done=1"),
            other => {
                let legal = legal_moves(bd, side);
                if let Some(mv) = CoordMove::parse(other).and_then(|written| written.find_in(&legal))
                {
                    searcher.note_opponent_move(mv);
                    apply_played_move(bd, searcher, book, mv);
                    side = side.flip();
                    report_draws(bd, searcher);
                    report_mate(bd, side);
                } else if CoordMove::parse(other).is_some() {
                    println!("Illegal move: {other}");
                } else {
                    println!("Error (unknown command): {other}");
                }
            }
        }
    }
}

/// Thinks and plays one engine move, or reports the game result and drops
/// back to force mode.
fn engine_turn(
    bd: &mut Board,
    searcher: &mut Searcher,
    book: &mut Book,
    side: &mut Side,
    computer: &mut Side,
    max_time: Duration,
) {
    let mover = *side;
    let legal = legal_moves(bd, mover);
    if let Some(mv) = book.consult(&legal, mover) {
        println!("move {mv}");
        apply_played_move(bd, searcher, book, mv);
        *side = mover.flip();
        report_draws(bd, searcher);
        report_mate(bd, *side);
        return;
    }
    match searcher.search_best(bd, mover, max_time) {
        SearchOutcome::Move { mv, resign, .. } => {
            if resign {
                println!(
                    "{}",
                    if mover == Side::WHITE {
                        "0-1 {White resigns}"
                    } else {
                        "1-0 {Black resigns}"
                    }
                );
                *computer = Side::NONE;
                return;
            }
            println!("move {mv}");
            apply_played_move(bd, searcher, book, mv);
            *side = mover.flip();
            report_draws(bd, searcher);
            report_mate(bd, *side);
        }
        SearchOutcome::Mated => {
            println!(
                "{}",
                if mover == Side::WHITE {
                    "0-1 {Black Mates}"
                } else {
                    "1-0 {White Mates}"
                }
            );
            *computer = Side::NONE;
        }
        SearchOutcome::Stalemate => {
            println!("1/2-1/2 {{Draw. Stalemate.}}");
            *computer = Side::NONE;
        }
        SearchOutcome::InsufficientMaterial => {
            println!("1/2-1/2 {{Draw. Not enough material.}}");
            *computer = Side::NONE;
        }
    }
}

/// Applies a played (as opposed to searched) move: game counters first,
/// heuristics reset, then the move itself and the book line.
fn apply_played_move(bd: &mut Board, searcher: &mut Searcher, book: &mut Book, mv: Move) {
    bd.note_played_move(mv);
    searcher.reset_heuristics();
    bd.make_move(mv);
    book.record_move(mv);
}

/// Generates the fully legal moves of `side`.
pub fn legal_moves(bd: &mut Board, side: Side) -> MoveList {
    let moves = generate_all(bd, side, &QuietOrdering::NONE);
    let mut legal = MoveList::new();
    for mv in moves {
        if bd.piece_on(mv.to).is_king() {
            continue;
        }
        bd.make_move(mv);
        if !in_check(bd, side) {
            legal.push(mv);
        }
        bd.unmake_move();
    }
    legal
}

/// Announces the automatic draws, if any apply.
fn report_draws(bd: &mut Board, searcher: &mut Searcher) {
    let (_, material) = searcher.static_eval(bd);
    if material == 0 {
        println!("1/2-1/2 {{Draw. Not enough material.}}");
    } else if bd.repetitions() >= 3 {
        println!("1/2-1/2 {{Draw by repetition}}");
    } else if bd.fifty_moves() >= 100 {
        println!("1/2-1/2 {{Draw by fifty moves rule}}");
    }
}

/// Announces mate or stalemate against the side to move, if either applies.
fn report_mate(bd: &mut Board, side: Side) {
    if !legal_moves(bd, side).is_empty() {
        return;
    }
    if in_check(bd, side) {
        println!(
            "{}",
            if side == Side::WHITE {
                "0-1 {Black Checkmates}"
            } else {
                "1-0 {White Checkmates}"
            }
        );
    } else {
        println!("1/2-1/2 {{Stalemate}}");
    }
}

/// The `edit` sub-mode: `#` clears the board, `c` switches the colour being
/// placed, `<Letter><square>` places a piece, `.` leaves.
fn edit_position(bd: &mut Board, stdin: &io::Stdin) {
    let mut colour = Side::WHITE;
    loop {
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let token = line.trim();
        match token {
            "" | "." => break,
            "#" => bd.clear(),
            "c" => colour = colour.flip(),
            _ => {
                let bytes = token.as_bytes();
                let (letter, square_at) = if bytes[0].is_ascii_uppercase() {
                    (bytes[0], 1)
                } else {
                    (b'P', 0)
                };
                let Some(square) = token
                    .get(square_at..square_at + 2)
                    .and_then(|text| text.parse::<Square>().ok())
                else {
                    continue;
                };
                if let Err(message) = bd.place(letter, colour, square) {
                    eprintln!("{message}");
                    exit(1);
                }
            }
        }
    }
    if let Err(message) = bd.finalize_setup() {
        eprintln!("{message}");
        exit(1);
    }
}
