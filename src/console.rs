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
use std::time::Duration;

use crate::board::Board;
use crate::book::Book;
use crate::defs::Side;
use crate::movegen::{in_check, CoordMove};
use crate::search::{Post, SearchOutcome, Searcher};
use crate::xboard::legal_moves;

/// Where the native-console game stands.
enum State {
    /// Waiting for the human to move for `Side`.
    Awaiting(Side),
    /// The engine is to move for `Side`.
    Thinking(Side),
    /// The game ended; leave the loop.
    GameOver,
}

impl State {
    /// The state for `side` to move, given who the engine plays.
    fn turn_of(side: Side, computer: Side) -> Self {
        if side == computer {
            Self::Thinking(side)
        } else {
            Self::Awaiting(side)
        }
    }
}

/// The native console play loop.
pub fn play_loop(bd: &mut Board, searcher: &mut Searcher, book: &mut Book) {
    searcher.set_post(Post::Console);
    let stdin = io::stdin();
    bd.pretty_print();
    let mut computer = prompt_side(&stdin);
    let mut max_time = Duration::from_secs(15);
    if computer != Side::NONE {
        max_time = prompt_seconds(&stdin);
    }
    eprintln!("Game begins!");

    let mut state = State::turn_of(bd.side_to_move(), computer);
    loop {
        state = match state {
            State::GameOver => break,
            State::Thinking(side) => {
                think(bd, searcher, book, side, computer, max_time)
            }
            State::Awaiting(side) => await_move(
                bd,
                searcher,
                book,
                side,
                &mut computer,
                &mut max_time,
                &stdin,
            ),
        };
    }
}

/// Checks the game-end conditions before a move; announces and returns true
/// when the game is over.
fn finished_before_move(
    bd: &mut Board,
    searcher: &mut Searcher,
    side: Side,
) -> bool {
    let (_, material) = searcher.static_eval(bd);
    if material == 0 {
        println!("Draw. Not enough material.  GAME OVER  (1/2 - 1/2)");
        return true;
    }
    if legal_moves(bd, side).is_empty() {
        bd.pretty_print();
        if in_check(bd, side) {
            if side == Side::WHITE {
                println!("Black Checkmates !!  GAME OVER  (0 - 1)");
            } else {
                println!("White Checkmates !!  GAME OVER  (1 - 0)");
            }
        } else {
            println!("Stalemate.  GAME OVER  (1/2 - 1/2)");
        }
        return true;
    }
    false
}

/// Checks the draw counters after a move; announces and returns true when
/// the game is over.
fn finished_after_move(bd: &Board) -> bool {
    if bd.repetitions() >= 3 {
        println!("1/2-1/2 {{Draw by repetition}}");
        return true;
    }
    if bd.fifty_moves() >= 100 {
        println!("1/2-1/2 {{Draw by fifty moves rule}}");
        return true;
    }
    false
}

/// Plays one engine move.
fn think(
    bd: &mut Board,
    searcher: &mut Searcher,
    book: &mut Book,
    side: Side,
    computer: Side,
    max_time: Duration,
) -> State {
    if finished_before_move(bd, searcher, side) {
        return State::GameOver;
    }
    eprintln!("Board before the engine starts thinking:");
    bd.pretty_print();
    let legal = legal_moves(bd, side);
    let mv = if let Some(book_move) = book.consult(&legal, side) {
        book_move
    } else {
        match searcher.search_best(bd, side, max_time) {
            SearchOutcome::Move { mv, resign, .. } => {
                if resign {
                    if side == Side::WHITE {
                        println!("White resigns.  GAME OVER  (0 - 1)");
                    } else {
                        println!("Black resigns.  GAME OVER  (1 - 0)");
                    }
                    return State::GameOver;
                }
                mv
            }
            // legal moves and material were checked above
            _ => return State::GameOver,
        }
    };
    println!("Engine plays: {mv}");
    bd.note_played_move(mv);
    searcher.reset_heuristics();
    bd.make_move(mv);
    book.record_move(mv);
    if finished_after_move(bd) {
        return State::GameOver;
    }
    State::turn_of(side.flip(), computer)
}

/// Prompts the human until a legal move (or a command) comes in.
fn await_move(
    bd: &mut Board,
    searcher: &mut Searcher,
    book: &mut Book,
    side: Side,
    computer: &mut Side,
    max_time: &mut Duration,
    stdin: &io::Stdin,
) -> State {
    if finished_before_move(bd, searcher, side) {
        return State::GameOver;
    }
    bd.pretty_print();
    loop {
        print!("Give move (q=quit) : ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            return State::GameOver;
        }
        let token = line.trim();
        match token {
            "q" | "quit" | "bye" | "resign" => {
                println!("Thank you for playing!");
                return State::GameOver;
            }
            "r" | "retract" => {
                // take back a full move pair
                if bd.ply() > 1 {
                    bd.unmake_move();
                    bd.unmake_move();
                }
                bd.pretty_print();
            }
            "go" => {
                if *computer == Side::NONE {
                    *max_time = prompt_seconds(stdin);
                }
                *computer = side;
                return State::Thinking(side);
            }
            _ => {
                let legal = legal_moves(bd, side);
                let Some(mv) =
                    CoordMove::parse(token).and_then(|written| written.find_in(&legal))
                else {
                    continue;
                };
                searcher.note_opponent_move(mv);
                bd.note_played_move(mv);
                searcher.reset_heuristics();
                bd.make_move(mv);
                book.record_move(mv);
                if finished_after_move(bd) {
                    return State::GameOver;
                }
                return State::turn_of(side.flip(), *computer);
            }
        }
    }
}

/// Prompts for which side the engine plays.
fn prompt_side(stdin: &io::Stdin) -> Side {
    loop {
        eprint!("Give Computer Side (White = 1, Black = 2, None = 3) : ");
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            return Side::NONE;
        }
        match line.trim() {
            "1" => return Side::WHITE,
            "2" => return Side::BLACK,
            "3" => return Side::NONE,
            _ => {}
        }
    }
}

/// Prompts for the per-move thinking time.
fn prompt_seconds(stdin: &io::Stdin) -> Duration {
    loop {
        eprint!("Give Computer Time (seconds per move) : ");
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            return Duration::from_secs(15);
        }
        if let Ok(seconds) = line.trim().parse::<u64>() {
            return Duration::from_secs(seconds.max(1));
        }
    }
}
