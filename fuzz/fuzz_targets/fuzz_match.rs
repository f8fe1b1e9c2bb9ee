#![no_main]

//! Plays arbitrary move sequences on small boards and checks the board
//! invariants after every accepted move.

use chain_reaction_server::GameSession;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&shape, moves)) = data.split_first() else {
        return;
    };
    let rows = usize::from(shape % 5) + 2;
    let cols = usize::from((shape / 5) % 5) + 2;
    let players = ["a", "b", "c", "d"];
    let count = usize::from(shape % 3) + 2;
    let roster: Vec<String> = players.iter().take(count).map(|p| p.to_string()).collect();
    let mut session = GameSession::new(roster.clone(), rows, cols, 200);

    for pair in moves.chunks_exact(2) {
        let (x, y) = (i64::from(pair[0] % 8) - 1, i64::from(pair[1] % 8) - 1);
        let player = &roster[session.turn()];
        let before = session.move_count();
        if session.apply_move(player, x, y).is_err() {
            assert_eq!(session.move_count(), before);
            continue;
        }

        let grid = session.grid();
        for cell in grid.cells() {
            assert_eq!(cell.owner.is_none(), cell.count == 0);
            if let Some(owner) = cell.owner {
                assert!(owner < roster.len());
            }
        }
        assert_eq!(session.eliminated().len(), roster.len());
        if session.is_over() {
            assert!(session.winner().is_some());
            break;
        }
        assert!(!session.eliminated()[session.turn()]);
    }
});
