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

use super::{Line, Searcher};
use crate::board::Board;
use crate::defs::{
    Eval, Piece, Side, ADAPT_NULL_LIMIT, FUTILITY_MARGINS, IID_DEPTH, INF_EVAL, LMR_DEPTH_LIMIT,
    LMR_MOVES, MAX_DEPTH, PV_CHANGE_THRESH, START_DEPTH, THREAT_DEPTH,
};
use crate::evaluation::evaluate;
use crate::movegen::{
    check_info, generate_all, generate_evasions, in_check, sort_moves, Move, MoveList,
};
use crate::transposition_table::Bound;

impl Searcher {
    /// The principal-variation search.
    ///
    /// `ply` is 1 at the root. `moves` carries pre-generated moves (the root
    /// list, or the evasions the parent generated on giving check) and is
    /// filled in here otherwise; re-searches of the same node reuse it.
    /// `in_check_hint` is the number of checkers the parent found, and
    /// `threat` is the opponent reply its null-move search suggested.
    ///
    /// Returns the score and the index of the best move in `moves` (`None`
    /// at terminal and cutoff-from-table nodes).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn negascout(
        &mut self,
        bd: &mut Board,
        can_null: bool,
        ply: usize,
        pline: &mut Line,
        moves: &mut MoveList,
        depth: i32,
        alpha: Eval,
        beta: Eval,
        side: Side,
        is_pv: bool,
        in_check_hint: usize,
        threat: Move,
        following_pv: bool,
    ) -> (Eval, Option<usize>) {
        pline.clear();
        if depth == 0 {
            return (self.quiescence(bd, alpha, beta, side), None);
        }
        self.nodes += 1;
        if (bd.ply() - self.root_ply) as i32 > MAX_DEPTH {
            return (self.quiescence(bd, alpha, beta, side), None);
        }

        let hash = bd.hash();
        let mut hash_best = Move::null();
        if is_pv {
            if ply > 1 {
                let probe = self.tt[ply & 1].probe_pv(hash, depth);
                hash_best = probe.best;
                if let Some(value) = probe.score {
                    if !hash_best.is_null() {
                        pline.load_single(hash_best);
                    }
                    return (value, None);
                }
            }
        } else {
            let probe = self.tt[ply & 1].probe_cut(hash, depth, alpha, beta);
            hash_best = probe.best;
            if let Some(value) = probe.score {
                if !hash_best.is_null() {
                    pline.load_single(hash_best);
                }
                return (value, None);
            }
        }

        let (raw_eval, material) = evaluate(bd, &mut self.pawn_tt);
        let static_eval = if side == Side::WHITE { raw_eval } else { -raw_eval };
        let next = side.flip();
        let in_chk = in_check_hint > 0;
        let mut null_best = Move::null();

        if !in_chk {
            // reverse futility: a quiet, already-winning position at low
            // depth will not sink back under beta
            if material > 7 && !is_pv {
                let came_quietly = bd
                    .last_record()
                    .is_some_and(|record| i32::from(record.mv.key) < 0);
                if came_quietly
                    && depth < FUTILITY_MARGINS.len() as i32
                    && static_eval - FUTILITY_MARGINS[depth as usize] >= beta
                {
                    return (static_eval, None);
                }
            }

            // adaptive null move: hand the opponent a free shot; if we still
            // clear beta, the node is a cutoff. The reply it finds doubles
            // as a threat hint for the children's ordering.
            let mut null_reduction = THREAT_DEPTH;
            if depth > ADAPT_NULL_LIMIT {
                null_reduction += 1;
            }
            if can_null && depth > null_reduction && material > 5 {
                let next_depth = depth - 1 - null_reduction;
                let mut null_moves = MoveList::new();
                if next_depth > 0 {
                    null_moves = generate_all(bd, next, &self.ordering(next, Some(ply)));
                    sort_moves(&mut null_moves);
                }
                let mut null_line = Line::new();
                let (value, reply) = self.negascout(
                    bd,
                    false,
                    ply + 1,
                    &mut null_line,
                    &mut null_moves,
                    next_depth,
                    -beta,
                    -alpha,
                    next,
                    false,
                    0,
                    Move::null(),
                    false,
                );
                let value = -value;
                if let Some(index) = reply {
                    null_best = null_moves[index];
                }
                if value >= beta {
                    return (value, None);
                }
            }
        }

        let mut should_iid = true;
        if moves.is_empty() {
            *moves = generate_all(bd, side, &self.ordering(side, Some(ply - 1)));
            let pv_move = if following_pv { self.pv.get(ply - 1) } else { None };
            for mv in moves.iter_mut() {
                if pv_move.is_some_and(|pv| mv.same_squares(pv)) {
                    mv.key = Move::PV_KEY;
                    should_iid = false;
                } else if !hash_best.is_null() && mv.same_squares(hash_best) {
                    mv.key = Move::HASH_KEY;
                    should_iid = false;
                } else if !threat.is_null() && mv.same_squares(threat) {
                    mv.key = Move::THREAT_KEY;
                }
            }
            sort_moves(moves);
        }

        let mut legality_checked = ply == 1;
        if ply > 1 && should_iid && !in_chk && depth > IID_DEPTH {
            // nothing useful to try first: run a shallow pre-search to pick
            // a front move, weeding out illegal moves while we are at it
            legality_checked = true;
            let mut legal = 0;
            for index in 0..moves.len() {
                bd.try_move(moves[index]);
                if in_check(bd, side) {
                    moves[index].flag = 0;
                } else {
                    legal += 1;
                }
                bd.undo_try();
            }
            if legal == 0 {
                let score = if in_chk {
                    -INF_EVAL + (bd.ply() - self.root_ply) as Eval
                } else {
                    0
                };
                return (score, None);
            }
            self.iid_front(bd, moves, next, depth / 3, alpha, beta);
        }

        let mut a = alpha;
        let mut best_index = None;
        let mut ngmoves = 0usize;
        for index in 0..moves.len() {
            if self.out_of_time() {
                self.time_up = true;
            }
            let mv = moves[index];
            if mv.is_null() {
                continue;
            }

            let mut t;
            let mut child_best = Move::null();
            let mut child_line = Line::new();
            let mut quiet = false;
            let mut moved_piece = Piece::EMPTY;

            if bd.piece_on(mv.to).is_king() {
                // a capturable king means the position was illegal to begin
                // with; treat it as mate on the spot
                t = INF_EVAL - (bd.ply() - self.root_ply) as Eval - 1;
            } else {
                if legality_checked {
                    bd.make_move(mv);
                } else {
                    bd.make_move(mv);
                    if in_check(bd, side) {
                        bd.unmake_move();
                        continue;
                    }
                }

                if bd.repeated_since_irreversible() {
                    t = 0;
                } else {
                    let info = check_info(bd, next);
                    let gives_check = info.attackers > 0;
                    let mut child_moves = MoveList::new();
                    let next_depth;
                    let mut can_reduct = false;
                    if gives_check {
                        // keep the full depth when checking, and hand the
                        // child its evasions right away
                        next_depth = depth;
                        child_moves =
                            generate_evasions(bd, next, &info, &self.ordering(next, None));
                        sort_moves(&mut child_moves);
                    } else {
                        next_depth = depth - 1;
                        can_reduct =
                            material > 7 && !is_pv && !in_chk && i32::from(mv.key) < 0;
                        if can_reduct
                            && next_depth < FUTILITY_MARGINS.len() as i32
                            && static_eval + FUTILITY_MARGINS[next_depth as usize] < a
                        {
                            bd.unmake_move();
                            continue;
                        }
                    }

                    let follows_pv = following_pv
                        && self.pv.get(ply - 1).is_some_and(|pv| pv.same_squares(mv));

                    let mut iret = None;
                    if ngmoves == 0 {
                        // first move: full window, expected to be the PV
                        let (value, reply) = self.negascout(
                            bd,
                            true,
                            ply + 1,
                            &mut child_line,
                            &mut child_moves,
                            next_depth,
                            -beta,
                            -a,
                            next,
                            true,
                            info.attackers,
                            null_best,
                            follows_pv,
                        );
                        t = -value;
                        iret = reply;
                    } else {
                        if can_reduct && ngmoves >= LMR_MOVES && depth > LMR_DEPTH_LIMIT {
                            // late move reduction: scout two plies shallower
                            let (value, reply) = self.negascout(
                                bd,
                                true,
                                ply + 1,
                                &mut child_line,
                                &mut child_moves,
                                depth - 2,
                                -a - 1,
                                -a,
                                next,
                                false,
                                info.attackers,
                                null_best,
                                follows_pv,
                            );
                            t = -value;
                            iret = reply;
                        } else {
                            t = a + 1;
                        }
                        if t > a {
                            // scout at full depth
                            let (value, reply) = self.negascout(
                                bd,
                                true,
                                ply + 1,
                                &mut child_line,
                                &mut child_moves,
                                next_depth,
                                -a - 1,
                                -a,
                                next,
                                false,
                                info.attackers,
                                null_best,
                                follows_pv,
                            );
                            t = -value;
                            iret = reply;
                            if t > a && t < beta {
                                // it surprised us: re-search with the full
                                // window
                                let (value, reply) = self.negascout(
                                    bd,
                                    true,
                                    ply + 1,
                                    &mut child_line,
                                    &mut child_moves,
                                    next_depth,
                                    -beta,
                                    -a,
                                    next,
                                    true,
                                    info.attackers,
                                    null_best,
                                    follows_pv,
                                );
                                t = -value;
                                iret = reply;
                            }
                        }
                    }
                    if let Some(reply) = iret {
                        child_best = child_moves[reply];
                        if ply == 1
                            && depth > START_DEPTH + 1
                            && self.pv.get(0).is_some_and(|pv| pv.matches(mv))
                            && t < self.best_score - PV_CHANGE_THRESH
                        {
                            // the move we believed in is collapsing
                            self.danger = true;
                            self.print_danger(depth, t, child_best);
                        }
                    }
                }

                moved_piece = bd.piece_on(mv.to);
                bd.unmake_move();
                quiet = bd.piece_on(mv.to).is_empty();
            }

            if self.time_up && !self.danger {
                return (a, best_index);
            }

            if t > a {
                a = t;
                best_index = Some(index);
                if child_best.is_null() {
                    pline.clear();
                } else {
                    pline.load(child_best, &child_line);
                }
                if a >= beta {
                    if quiet {
                        self.insert_killer(side, ply - 1, mv);
                    }
                    self.tt[ply & 1].store(hash, depth, a, Bound::Lower, mv);
                    return (a, best_index);
                }
                if quiet {
                    self.bump_history(side, moved_piece, mv.to, depth);
                }
            }
            ngmoves += 1;
        }

        if ngmoves == 0 {
            a = if in_chk {
                -INF_EVAL + (bd.ply() - self.root_ply) as Eval
            } else {
                0
            };
            best_index = None;
        }

        if a > alpha {
            let stored = best_index.map_or(Move::null(), |index| moves[index]);
            self.tt[ply & 1].store(hash, depth, a, Bound::Exact, stored);
        } else {
            self.tt[ply & 1].store(hash, depth, a, Bound::Upper, Move::null());
        }
        (a, best_index)
    }

    /// Bubbles the best move of a shallow pre-search to the front of the
    /// list. Illegal moves are expected to be flagged out already.
    fn iid_front(
        &mut self,
        bd: &mut Board,
        moves: &mut MoveList,
        next: Side,
        depth: i32,
        mut a: Eval,
        b: Eval,
    ) {
        let mut best = None;
        for index in 0..moves.len() {
            if moves[index].is_null() {
                continue;
            }
            bd.make_move(moves[index]);
            let t = -self.negalight(bd, depth - 1, -b, -a, next);
            bd.unmake_move();
            if t > a {
                a = t;
                best = Some(index);
                if a >= b {
                    break;
                }
            }
        }
        if let Some(index) = best {
            moves.swap(0, index);
        }
    }

    /// A plain fixed-depth negamax with quiescence leaves; cheap enough for
    /// the IID pre-pass and the root shuffle.
    pub(super) fn negalight(
        &mut self,
        bd: &mut Board,
        depth: i32,
        mut alpha: Eval,
        beta: Eval,
        side: Side,
    ) -> Eval {
        if depth == 0 {
            return self.quiescence(bd, alpha, beta, side);
        }
        let mut list = generate_all(bd, side, &self.ordering(side, None));
        sort_moves(&mut list);
        let next = side.flip();
        let mut actual = 0;
        for mv in list {
            if bd.piece_on(mv.to).is_king() {
                return INF_EVAL - (bd.ply() - self.root_ply) as Eval;
            }
            bd.make_move(mv);
            if in_check(bd, side) {
                bd.unmake_move();
                continue;
            }
            let value = -self.negalight(bd, depth - 1, -beta, -alpha, next);
            bd.unmake_move();
            if value > alpha {
                alpha = value;
            }
            if alpha >= beta {
                return alpha;
            }
            actual += 1;
        }
        if actual == 0 {
            return if in_check(bd, side) {
                -INF_EVAL + (bd.ply() - self.root_ply) as Eval
            } else {
                0
            };
        }
        alpha
    }
}
