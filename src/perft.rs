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

use std::time::Instant;

use crate::board::Board;
use crate::defs::Side;
use crate::movegen::{generate_all, in_check, QuietOrdering};

/// Counts and returns the number of leaf nodes `depth` legal moves ahead.
///
/// If `IS_TIMED`, it also prints the time taken and the nodes per second;
/// if `SHOULD_PRINT`, the count of every root move is printed.
pub fn perft<const SHOULD_PRINT: bool, const IS_TIMED: bool>(
    bd: &mut Board,
    side: Side,
    depth: u32,
) -> u64 {
    if IS_TIMED {
        let clock = Instant::now();
        let result = perft::<SHOULD_PRINT, false>(bd, side, depth);
        let elapsed_us = clock.elapsed().as_micros().max(1) as u64;
        let nps = 1_000_000 * result / elapsed_us;
        println!("Time taken: {} ms; NPS: {nps}", elapsed_us / 1_000);
        return result;
    }

    if depth == 0 {
        return 1;
    }

    let moves = generate_all(bd, side, &QuietOrdering::NONE);
    let mut total = 0;
    for mv in moves {
        bd.make_move(mv);
        if in_check(bd, side) {
            bd.unmake_move();
            continue;
        }
        let nodes = perft::<false, false>(bd, side.flip(), depth - 1);
        bd.unmake_move();
        total += nodes;

        if SHOULD_PRINT {
            println!("{mv}: {nodes}");
        }
    }
    if SHOULD_PRINT {
        println!("Total: {total}");
    }
    total
}
