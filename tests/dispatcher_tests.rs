#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for room lifecycle and match flow.
//!
//! Each test drives one or more simulated connections through the
//! [`Dispatcher`](chain_reaction_server::Dispatcher) with the exact JSON a
//! browser client sends, then checks what every connection received.

mod common;

use chain_reaction_server::grid::Cell;
use chain_reaction_server::{ErrorCode, ServerConfig, ServerMessage};

use common::{
    create_room_json, dispatcher, join_room_json, leave_room_json, lobby, move_json,
    start_game_json, TestClient,
};

fn names(players: &[&str]) -> Vec<String> {
    players.iter().map(|p| (*p).to_string()).collect()
}

fn cell(owner: Option<usize>, count: u32) -> Cell {
    Cell { owner, count }
}

// ════════════════════════════════════════════════════════════════════
// Room creation
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_room_uses_requested_grid() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);

    alice.send(create_room_json("alice", Some((5, 7)))).await;

    let messages = alice.drain();
    let [ServerMessage::RoomCreated {
        room_code,
        player_id,
        grid_rows,
        grid_cols,
    }] = messages.as_slice()
    else {
        panic!("expected RoomCreated, got {messages:?}");
    };
    assert_eq!(room_code.len(), 6);
    assert!(room_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(player_id, "alice");
    assert_eq!((*grid_rows, *grid_cols), (5, 7));
    assert!(dispatcher.registry().lookup(room_code).await.is_some());
}

#[tokio::test]
async fn create_room_defaults_to_six_by_nine() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);

    alice.send(create_room_json("alice", None)).await;

    let messages = alice.drain();
    let [ServerMessage::RoomCreated {
        grid_rows,
        grid_cols,
        ..
    }] = messages.as_slice()
    else {
        panic!("expected RoomCreated, got {messages:?}");
    };
    assert_eq!((*grid_rows, *grid_cols), (6, 9));
}

#[tokio::test]
async fn negative_grid_is_clamped_to_minimum() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);

    alice
        .send(r#"{"type":"create_room","playerId":"alice","gridRows":-3,"gridCols":4}"#)
        .await;

    let messages = alice.drain();
    let [ServerMessage::RoomCreated {
        room_code,
        grid_rows,
        grid_cols,
        ..
    }] = messages.as_slice()
    else {
        panic!("expected RoomCreated, got {messages:?}");
    };
    assert_eq!((*grid_rows, *grid_cols), (2, 4));
    assert!(dispatcher.registry().lookup(room_code).await.is_some());
}

#[tokio::test]
async fn oversized_grid_is_clamped() {
    let dispatcher = chain_reaction_server::Dispatcher::new(
        ServerConfig::default().with_max_grid_dimension(10),
    );
    let mut alice = TestClient::new(&dispatcher);

    alice.send(create_room_json("alice", Some((500, 1)))).await;

    let messages = alice.drain();
    let [ServerMessage::RoomCreated {
        grid_rows,
        grid_cols,
        ..
    }] = messages.as_slice()
    else {
        panic!("expected RoomCreated, got {messages:?}");
    };
    assert_eq!((*grid_rows, *grid_cols), (10, 2));
}

// ════════════════════════════════════════════════════════════════════
// Joining
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_notifies_joiner_and_room() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let mut bob = TestClient::new(&dispatcher);
    let code = alice.create("alice").await;

    bob.send(join_room_json(&code, "bob")).await;

    assert_eq!(
        bob.drain(),
        vec![
            ServerMessage::RoomJoined {
                room_code: code.clone(),
                player_id: "bob".into(),
                players: names(&["alice", "bob"]),
                grid_rows: 6,
                grid_cols: 9,
            },
            ServerMessage::PlayerJoined {
                players: names(&["alice", "bob"]),
            },
        ]
    );
    assert_eq!(
        alice.drain(),
        vec![ServerMessage::PlayerJoined {
            players: names(&["alice", "bob"]),
        }]
    );
}

#[tokio::test]
async fn join_unknown_room_is_rejected() {
    let dispatcher = dispatcher();
    let mut bob = TestClient::new(&dispatcher);

    bob.send(join_room_json("NOPE00", "bob")).await;

    assert_eq!(
        bob.drain(),
        vec![ServerMessage::Error {
            message: "Room not found".into(),
            error_code: Some(ErrorCode::RoomNotFound),
        }]
    );
    assert_eq!(bob.conn.room_code(), None);
}

#[tokio::test]
async fn fifth_player_is_turned_away() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["a", "b", "c", "d"]).await;
    let mut eve = TestClient::new(&dispatcher);

    eve.send(join_room_json(&code, "eve")).await;

    assert_eq!(
        eve.drain(),
        vec![ServerMessage::rejection(ErrorCode::RoomFull)]
    );
    for client in &mut clients {
        assert!(client.drain().is_empty(), "room members must not hear about a rejected join");
    }
}

#[tokio::test]
async fn join_after_start_is_rejected() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;
    clients[0].send(start_game_json(&code, "alice")).await;
    let mut carol = TestClient::new(&dispatcher);

    carol.send(join_room_json(&code, "carol")).await;

    assert_eq!(
        carol.drain(),
        vec![ServerMessage::Error {
            message: "Game already started".into(),
            error_code: Some(ErrorCode::GameAlreadyStarted),
        }]
    );
}

#[tokio::test]
async fn duplicate_player_id_is_rejected() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let mut impostor = TestClient::new(&dispatcher);
    let code = alice.create("alice").await;

    impostor.send(join_room_json(&code, "alice")).await;

    assert_eq!(
        impostor.drain(),
        vec![ServerMessage::rejection(ErrorCode::AlreadyInRoom)]
    );
    assert!(alice.drain().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Starting
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn host_starts_match_for_everyone() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob", "carol"]).await;

    clients[0].send(start_game_json(&code, "alice")).await;

    let expected = ServerMessage::GameStart {
        players: names(&["alice", "bob", "carol"]),
        grid_rows: 6,
        grid_cols: 9,
    };
    for client in &mut clients {
        assert_eq!(client.drain(), vec![expected.clone()]);
    }
}

#[tokio::test]
async fn non_host_start_is_ignored() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;

    clients[1].send(start_game_json(&code, "bob")).await;

    for client in &mut clients {
        assert!(client.drain().is_empty());
    }
    let handle = dispatcher.registry().lookup(&code).await.unwrap();
    assert!(!handle.lock().await.is_started());
}

#[tokio::test]
async fn solo_host_cannot_start() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let code = alice.create("alice").await;

    alice.send(start_game_json(&code, "alice")).await;

    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn second_start_is_ignored() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;
    clients[0].send(start_game_json(&code, "alice")).await;
    clients[0].drain();

    clients[0].send(start_game_json(&code, "alice")).await;

    assert!(clients[0].drain().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Moves
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn two_by_two_match_resolves_cascade() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let mut bob = TestClient::new(&dispatcher);
    alice.send(create_room_json("alice", Some((2, 2)))).await;
    let code = alice.conn.room_code().unwrap().to_string();
    bob.send(join_room_json(&code, "bob")).await;
    alice.send(start_game_json(&code, "alice")).await;
    alice.drain();
    bob.drain();

    alice.send(move_json(&code, "alice", 0, 0)).await;
    let state = bob.last_state().unwrap();
    assert_eq!(state.grid.cell(0, 0), Some(&cell(Some(0), 1)));
    assert_eq!(state.turn, 1);
    assert_eq!(state.move_count, 1);

    bob.send(move_json(&code, "bob", 1, 1)).await;
    let state = alice.last_state().unwrap();
    assert_eq!(state.grid.cell(1, 1), Some(&cell(Some(1), 1)));
    assert_eq!(state.turn, 0);

    alice.send(move_json(&code, "alice", 0, 0)).await;
    let state = alice.last_state().unwrap();
    assert_eq!(state.grid.cell(0, 0), Some(&cell(None, 0)));
    assert_eq!(state.grid.cell(0, 1), Some(&cell(Some(0), 1)));
    assert_eq!(state.grid.cell(1, 0), Some(&cell(Some(0), 1)));
    assert_eq!(state.grid.cell(1, 1), Some(&cell(Some(1), 1)));
    assert_eq!(state.turn, 1);
    assert_eq!(state.move_count, 3);
    assert_eq!(state.eliminated, vec![false, false]);
    assert!(!state.game_over);
    assert_eq!(state, bob.last_state().unwrap());
}

#[tokio::test]
async fn illegal_moves_are_silent() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;
    clients[0].send(start_game_json(&code, "alice")).await;
    clients[0].send(move_json(&code, "alice", 0, 0)).await;
    for client in &mut clients {
        client.drain();
    }

    // Out of turn.
    clients[0].send(move_json(&code, "alice", 1, 0)).await;
    // Off the board.
    clients[1].send(move_json(&code, "bob", -1, 0)).await;
    clients[1].send(move_json(&code, "bob", 9, 0)).await;
    // Opponent's cell.
    clients[1].send(move_json(&code, "bob", 0, 0)).await;
    // Not a member.
    clients[1].send(move_json(&code, "mallory", 3, 3)).await;
    // No such room.
    clients[1].send(move_json("NOPE00", "bob", 3, 3)).await;

    for client in &mut clients {
        assert!(client.drain().is_empty());
    }

    clients[1].send(move_json(&code, "bob", 8, 5)).await;
    let state = clients[0].last_state().unwrap();
    assert_eq!(state.move_count, 2);
    assert_eq!(state.grid.cell(8, 5), Some(&cell(Some(1), 1)));
}

#[tokio::test]
async fn move_before_start_is_silent() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;

    clients[0].send(move_json(&code, "alice", 0, 0)).await;

    for client in &mut clients {
        assert!(client.drain().is_empty());
    }
}

#[tokio::test]
async fn capturing_every_orb_wins_the_match() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let mut bob = TestClient::new(&dispatcher);
    alice.send(create_room_json("alice", Some((2, 2)))).await;
    let code = alice.conn.room_code().unwrap().to_string();
    bob.send(join_room_json(&code, "bob")).await;
    alice.send(start_game_json(&code, "alice")).await;

    alice.send(move_json(&code, "alice", 0, 0)).await;
    bob.send(move_json(&code, "bob", 1, 0)).await;
    // (0,0) bursts into (1,0), which then holds 2 orbs and bursts too,
    // converting every orb on the board to alice.
    alice.send(move_json(&code, "alice", 0, 0)).await;
    let state = bob.last_state().unwrap();

    assert!(state.game_over);
    assert_eq!(state.winner, Some(0));
    assert_eq!(state.eliminated, vec![false, true]);
    assert!(state
        .grid
        .cells()
        .all(|c| c.owner.is_none() || c.owner == Some(0)));

    alice.drain();
    bob.send(move_json(&code, "bob", 1, 1)).await;
    assert!(alice.drain().is_empty(), "no moves after the match ends");
    assert!(bob.drain().is_empty(), "no moves after the match ends");
    let handle = dispatcher.registry().lookup(&code).await.unwrap();
    assert_eq!(
        handle.lock().await.session().map(|s| s.snapshot().move_count),
        Some(3)
    );
}

// ════════════════════════════════════════════════════════════════════
// Leaving and disconnecting
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn last_player_leaving_deletes_room() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);
    let code = alice.create("alice").await;

    alice.send(leave_room_json(&code, "alice")).await;

    assert!(dispatcher.registry().lookup(&code).await.is_none());
    assert_eq!(alice.conn.room_code(), None);

    let mut bob = TestClient::new(&dispatcher);
    bob.send(join_room_json(&code, "bob")).await;
    assert_eq!(
        bob.drain(),
        vec![ServerMessage::rejection(ErrorCode::RoomNotFound)]
    );
}

#[tokio::test]
async fn host_leaving_promotes_next_player() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob", "carol"]).await;

    clients[0].send(leave_room_json(&code, "alice")).await;

    let expected = ServerMessage::PlayerLeft {
        players: names(&["bob", "carol"]),
    };
    assert_eq!(clients[1].drain(), vec![expected.clone()]);
    assert_eq!(clients[2].drain(), vec![expected]);
    assert!(clients[0].drain().is_empty());

    let handle = dispatcher.registry().lookup(&code).await.unwrap();
    assert_eq!(handle.lock().await.host(), "bob");

    // The new host can start the match.
    clients[1].send(start_game_json(&code, "bob")).await;
    assert!(matches!(
        clients[2].drain().as_slice(),
        [ServerMessage::GameStart { .. }]
    ));
}

#[tokio::test]
async fn disconnect_behaves_like_leave() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;

    clients[1].disconnect().await;

    assert_eq!(
        clients[0].drain(),
        vec![ServerMessage::PlayerLeft {
            players: names(&["alice"]),
        }]
    );

    clients[0].disconnect().await;
    assert!(dispatcher.registry().lookup(&code).await.is_none());
    assert!(dispatcher.registry().is_empty().await);
}

#[tokio::test]
async fn stale_connection_does_not_kick_reclaimed_player() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;
    let mut new_bob = TestClient::new(&dispatcher);

    // Another connection removes bob by name, then rejoins under that name.
    new_bob.send(leave_room_json(&code, "bob")).await;
    new_bob.send(join_room_json(&code, "bob")).await;
    assert_eq!(new_bob.conn.player(), Some("bob"));
    clients[0].drain();
    new_bob.drain();

    clients[1].disconnect().await;

    assert!(clients[0].drain().is_empty());
    assert!(new_bob.drain().is_empty());
    let handle = dispatcher.registry().lookup(&code).await.unwrap();
    assert_eq!(handle.lock().await.players().to_vec(), names(&["alice", "bob"]));
}

#[tokio::test]
async fn leaving_mid_match_forfeits_and_hands_over_the_turn() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob", "carol"]).await;
    clients[0].send(start_game_json(&code, "alice")).await;
    clients[0].send(move_json(&code, "alice", 0, 0)).await;
    for client in &mut clients {
        client.drain();
    }

    // Bob holds the turn and walks away.
    clients[1].disconnect().await;

    let messages = clients[2].drain();
    let [ServerMessage::PlayerLeft { players }, ServerMessage::GameState { state }] =
        messages.as_slice()
    else {
        panic!("expected PlayerLeft then GameState, got {messages:?}");
    };
    assert_eq!(players, &names(&["alice", "carol"]));
    assert_eq!(state.eliminated, vec![false, true, false]);
    assert_eq!(state.turn, 2);
    assert!(!state.game_over);

    // Carol plays on; indices stay tied to the starting order.
    clients[2].send(move_json(&code, "carol", 8, 5)).await;
    let state = clients[0].last_state().unwrap();
    assert_eq!(state.grid.cell(8, 5), Some(&cell(Some(2), 1)));
    assert_eq!(state.turn, 0);
}

#[tokio::test]
async fn last_player_standing_wins_by_forfeit() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;
    clients[0].send(start_game_json(&code, "alice")).await;
    clients[1].drain();

    clients[0].send(leave_room_json(&code, "alice")).await;

    let state = clients[1].last_state().unwrap();
    assert!(state.game_over);
    assert_eq!(state.winner, Some(1));
}

#[tokio::test]
async fn leave_for_unknown_room_or_player_is_ignored() {
    let dispatcher = dispatcher();
    let (code, mut clients) = lobby(&dispatcher, &["alice", "bob"]).await;

    clients[0].send(leave_room_json("NOPE00", "alice")).await;
    clients[0].send(leave_room_json(&code, "mallory")).await;

    for client in &mut clients {
        assert!(client.drain().is_empty());
    }
    assert_eq!(clients[0].conn.room_code(), Some(code.as_str()));
}

#[tokio::test]
async fn unknown_message_types_are_dropped() {
    let dispatcher = dispatcher();
    let mut alice = TestClient::new(&dispatcher);

    alice.send(r#"{"type":"chat","text":"hi"}"#).await;
    alice.send(r#"{"type":"move","roomCode":"X"}"#).await;
    alice.send("[]").await;

    assert!(alice.drain().is_empty());
    assert!(dispatcher.registry().is_empty().await);
}

// ════════════════════════════════════════════════════════════════════
// Concurrency
// ════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overfill_a_room() {
    let dispatcher = dispatcher();
    let mut host = TestClient::new(&dispatcher);
    let code = host.create("host").await;

    let mut tasks = Vec::new();
    for i in 0..12 {
        let dispatcher = dispatcher.clone();
        let code = code.clone();
        tasks.push(tokio::spawn(async move {
            let mut client = TestClient::new(&dispatcher);
            client.send(join_room_json(&code, &format!("p{i}"))).await;
            client
                .drain()
                .first()
                .is_some_and(|m| matches!(m, ServerMessage::RoomJoined { .. }))
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if tokio_test::assert_ok!(task.await) {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);

    let handle = dispatcher.registry().lookup(&code).await.unwrap();
    assert_eq!(handle.lock().await.players().len(), 4);
}
