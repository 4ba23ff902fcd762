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

use std::time::{Duration, Instant};

use super::{Line, Post, Searcher};
use crate::board::Board;
use crate::defs::{
    Eval, Side, FUTILITY_MARGINS, INF_EVAL, MATE_CUTOFF, MAX_DEPTH, PV_CHANGE_THRESH, RESIGN_EVAL,
    START_DEPTH, THREAT_DEPTH, THREAT_THRESH,
};
use crate::evaluation::evaluate;
use crate::movegen::{generate_all, in_check, sort_moves, Move, MoveList};

/// What a root search concluded.
pub enum SearchOutcome {
    /// The engine found a move to play.
    Move {
        /// The chosen move.
        mv: Move,
        /// Its score, from the mover's point of view.
        score: Eval,
        /// The score is hopeless; the front-end should resign.
        resign: bool,
    },
    /// The side to move has no legal move and is in check.
    Mated,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can ever mate.
    InsufficientMaterial,
}

impl Searcher {
    /// Searches the position with iterative deepening and returns the best
    /// move found within `budget`.
    ///
    /// The committed principal variation is left in [`self.pv`](Self::pv)
    /// for the caller to print or follow.
    pub fn search_best(&mut self, bd: &mut Board, side: Side, budget: Duration) -> SearchOutcome {
        self.start = Instant::now();
        self.budget = budget;
        self.nodes = 0;
        self.time_up = false;
        self.root_ply = bd.ply();

        let mut root_moves = generate_all(bd, side, &self.ordering(side, None));
        let mut legal = 0;
        let mut only = Move::null();
        for index in 0..root_moves.len() {
            let mv = root_moves[index];
            if bd.piece_on(mv.to).is_king() {
                // an illegal hand-built position: take the king and be done
                self.pv.load_single(mv);
                self.best_score = INF_EVAL - 1;
                return SearchOutcome::Move {
                    mv,
                    score: self.best_score,
                    resign: false,
                };
            }
            bd.make_move(mv);
            if in_check(bd, side) {
                root_moves[index].flag = 0;
                root_moves[index].key = -126;
            } else {
                legal += 1;
                only = mv;
            }
            bd.unmake_move();
        }
        if legal == 0 {
            return if in_check(bd, side) {
                SearchOutcome::Mated
            } else {
                SearchOutcome::Stalemate
            };
        }
        if legal > 1 {
            sort_moves(&mut root_moves);
        }

        let (_, material) = evaluate(bd, &mut self.pawn_tt);
        if material == 0 {
            return SearchOutcome::InsufficientMaterial;
        }
        if legal == 1 {
            self.pv.load_single(only);
            return SearchOutcome::Move {
                mv: only,
                score: self.best_score,
                resign: false,
            };
        }

        let in_chk = in_check(bd, side);
        let mut threat = Move::null();
        if !in_chk {
            // what would the opponent do if we passed? A shallow probe gives
            // the search a reply to watch out for
            let opponent = side.flip();
            let mut replies = generate_all(bd, opponent, &self.ordering(opponent, None));
            let mut actual = 0;
            for index in 0..replies.len() {
                let mv = replies[index];
                bd.make_move(mv);
                if in_check(bd, opponent) {
                    replies[index].flag = 0;
                    replies[index].key = -126;
                } else {
                    actual += 1;
                }
                bd.unmake_move();
            }
            sort_moves(&mut replies);
            if actual > THREAT_THRESH {
                let best = self.shuffle(bd, &mut replies, side, THREAT_DEPTH, 1);
                if best != 0 {
                    threat = replies[0];
                    if self.post == Post::Console {
                        println!(
                            "opponent's threat is {threat} (found in {:.2} seconds)",
                            self.start.elapsed().as_secs_f64()
                        );
                    }
                }
            }
        }

        // order the root list by a very shallow search of every move
        let root_move_count = root_moves.len();
        let sort_max = self.shuffle(bd, &mut root_moves, side.flip(), THREAT_DEPTH + 1, root_move_count);
        if self.post == Post::Console {
            println!("initial eval: {sort_max}");
            println!("depth  eval  seconds  principal variation");
        }

        // if the opponent answered along our previous PV, our prepared
        // reply goes first
        if !self.opponent_move.is_null()
            && self
                .pv
                .get(1)
                .is_some_and(|pv| pv.matches(self.opponent_move))
        {
            if let Some(prepared) = self.pv.get(2) {
                promote_to_front(&mut root_moves, prepared);
                if self.post == Post::Console {
                    println!("previous PV followed");
                }
            }
        }

        self.time_up = false;
        let mut line = Line::new();
        let mut committed = false;
        for depth in START_DEPTH..=MAX_DEPTH {
            self.danger = false;
            if depth > START_DEPTH {
                if let Some(first) = self.pv.get(0) {
                    promote_to_front(&mut root_moves, first);
                }
            }
            let (score, best) = self.negascout(
                bd,
                false,
                1,
                &mut line,
                &mut root_moves,
                depth,
                -INF_EVAL,
                INF_EVAL,
                side,
                true,
                usize::from(in_chk),
                threat,
                true,
            );
            if self.time_up && !self.danger {
                break;
            }
            if let Some(best) = best {
                self.best_score = score;
                self.pv.load(root_moves[best], &line);
                committed = true;
                let exclaim = depth > START_DEPTH && score - sort_max > PV_CHANGE_THRESH;
                self.print_progress(depth, exclaim);
            }
            if (self.best_score > MATE_CUTOFF || self.best_score < -MATE_CUTOFF)
                && depth > FUTILITY_MARGINS.len() as i32
            {
                break;
            }
        }

        let mv = if committed {
            self.pv.get(0).unwrap_or(only)
        } else {
            // never finished a depth: fall back to the best pre-sorted move
            let fallback = root_moves
                .iter()
                .find(|mv| !mv.is_null())
                .copied()
                .unwrap_or(only);
            self.pv.load_single(fallback);
            fallback
        };
        SearchOutcome::Move {
            mv,
            score: self.best_score,
            resign: self.best_score <= -RESIGN_EVAL,
        }
    }

    /// Scores every legal move in `moves` with a shallow negamax and
    /// selection-sorts the best `front` of them to the front. Returns the
    /// best score found.
    fn shuffle(
        &mut self,
        bd: &mut Board,
        moves: &mut MoveList,
        next: Side,
        depth: i32,
        front: usize,
    ) -> Eval {
        let mut scores = [0; crate::defs::MAX_MOVES];
        for index in 0..moves.len() {
            scores[index] = if moves[index].is_null() {
                -INF_EVAL
            } else {
                bd.make_move(moves[index]);
                let value = -self.negalight(bd, depth - 1, -INF_EVAL, INF_EVAL, next);
                bd.unmake_move();
                value
            };
        }
        for sorted in 0..front.min(moves.len()) {
            let mut best = sorted;
            for index in sorted + 1..moves.len() {
                if scores[index] > scores[best] {
                    best = index;
                }
            }
            if best != sorted {
                moves.swap(sorted, best);
                scores.swap(sorted, best);
            }
        }
        if moves.is_empty() {
            -INF_EVAL
        } else {
            scores[0]
        }
    }
}

/// Swaps the move matching `key` (by squares) to the front, if present.
fn promote_to_front(moves: &mut MoveList, key: Move) {
    if key.is_null() || moves.is_empty() || moves[0].same_squares(key) {
        return;
    }
    if let Some(found) = moves.iter().position(|mv| mv.same_squares(key)) {
        moves.swap(0, found);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::SearchOutcome;
    use crate::board::Board;
    use crate::defs::{Eval, Side, MATE_CUTOFF, QUEEN_V};
    use crate::evaluation::evaluate;
    use crate::movegen::{generate_all, QuietOrdering};
    use crate::search::Searcher;
    use crate::transposition_table::PawnTable;

    fn searcher() -> Searcher {
        Searcher::new(14, 10)
    }

    #[test]
    fn finds_the_back_rank_mate() {
        // Ra8 is mate in one
        let mut bd =
            Board::from_position_text("white: Kg1 Ra1 Pf2 Pg2 Ph2\nblack: Kg8 Pf7 Pg7 Ph7\n")
                .unwrap();
        let mut searcher = searcher();
        let outcome = searcher.search_best(&mut bd, Side::WHITE, Duration::from_millis(2_000));
        let SearchOutcome::Move { mv, score, .. } = outcome else {
            panic!("a mating move must be found");
        };
        assert_eq!(mv.to_string(), "a1a8", "the rook mates on a8");
        assert!(score > MATE_CUTOFF, "mate must carry a mate score");
    }

    #[test]
    fn takes_the_hanging_king_in_an_illegal_position() {
        // not reachable by legal play: the queen simply takes the king
        let mut bd = Board::from_position_text("white: Ke1 Qh5\nblack: Ke8\n").unwrap();
        let mut searcher = searcher();
        let outcome = searcher.search_best(&mut bd, Side::WHITE, Duration::from_millis(300));
        let SearchOutcome::Move { mv, score, .. } = outcome else {
            panic!("the king capture must be chosen");
        };
        assert_eq!(mv.to_string(), "h5e8", "the queen takes on e8");
        assert!(score >= MATE_CUTOFF, "a dead king scores as mate");
    }

    #[test]
    fn reports_stalemate_not_mate() {
        let mut bd = Board::from_position_text("white: Ka1\nblack: Kc3 Qc2\n").unwrap();
        let mut searcher = searcher();
        let outcome = searcher.search_best(&mut bd, Side::WHITE, Duration::from_millis(100));
        assert!(
            matches!(outcome, SearchOutcome::Stalemate),
            "a1 king has no moves but is not in check"
        );
    }

    #[test]
    fn quiescence_banks_the_hanging_queen() {
        // white to move wins the undefended queen on d8
        let mut bd =
            Board::from_position_text("white: Kg1 Rd1 Pf2 Pg2 Ph2\nblack: Kg8 Qd8 Pf7 Pg7 Ph7\n")
                .unwrap();
        let refresh = |bd: &mut Board| {
            let _ = generate_all(bd, Side::WHITE, &QuietOrdering::NONE);
            let _ = generate_all(bd, Side::BLACK, &QuietOrdering::NONE);
        };
        refresh(&mut bd);
        let mut pawn_tt = PawnTable::new(8);
        let static_eval = evaluate(&mut bd, &mut pawn_tt).0;
        let mut searcher = searcher();
        searcher.root_ply = bd.ply();
        let score: Eval = searcher.quiescence(&mut bd, -9_999, 9_999, Side::WHITE);
        assert!(
            score >= static_eval + QUEEN_V - 300,
            "quiescence must bank most of the queen: {score} vs {static_eval}"
        );
    }

    #[test]
    fn time_cutoff_returns_cleanly() {
        let mut bd = Board::startpos();
        let mut searcher = searcher();
        let outcome = searcher.search_best(&mut bd, Side::WHITE, Duration::from_millis(50));
        assert!(
            matches!(outcome, SearchOutcome::Move { .. }),
            "a short budget still yields a move"
        );
        bd.assert_consistent();
        assert_eq!(bd.ply(), 0, "the search must unwind the stacks");
    }

    #[test]
    fn search_is_deterministic_with_fresh_tables() {
        use crate::defs::INF_EVAL;
        use crate::movegen::{Move, MoveList};
        use crate::search::Line;

        let run = || {
            let mut bd = Board::from_position_text(
                "white: Ke1 Ra1 Rh1 Pa2 Pb2 Pc2\nblack: Ke8 Ra8 Pa7 Pb7 Pc7\n",
            )
            .unwrap();
            let mut searcher = searcher();
            let mut line = Line::new();
            let mut moves = MoveList::new();
            let (score, best) = searcher.negascout(
                &mut bd,
                true,
                2,
                &mut line,
                &mut moves,
                5,
                -INF_EVAL,
                INF_EVAL,
                Side::WHITE,
                true,
                0,
                Move::null(),
                false,
            );
            (score, best.map(|index| moves[index].to_string()))
        };
        // identical parameters and identical (fresh) hash tables must give
        // identical results
        assert_eq!(run(), run(), "the search must be reproducible");
    }
}
