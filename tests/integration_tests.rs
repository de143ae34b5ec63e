//! Integration tests for the lobby server
//!
//! These tests drive the dispatcher with whole event sequences and exercise a
//! real WebSocket round trip against a running server.

use server::dispatcher::Dispatcher;
use server::protocol::{Outbound, ServerEvent};
use server::world::World;
use shared::{ClientEvent, Direction, ErrorKind, RoomStatus, SessionId, AVATAR_ORIGIN, GRID_SIZE};

const ALICE: SessionId = 1;
const BOB: SessionId = 2;
const CAROL: SessionId = 3;

fn dispatcher_with(players: &[(SessionId, &str)]) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(World::with_seed(2024));
    for (id, name) in players {
        let outbound = dispatcher.handle_event(
            *id,
            ClientEvent::Login {
                display_name: name.to_string(),
            },
            0,
        );
        assert!(matches!(outbound[0].event, ServerEvent::LoggedIn { .. }));
    }
    dispatcher
}

fn create_arena(dispatcher: &mut Dispatcher, host: SessionId, max_players: usize) -> Vec<Outbound> {
    dispatcher.handle_event(
        host,
        ClientEvent::CreateRoom {
            name: "Arena".to_string(),
            max_players: Some(max_players),
            game_type: None,
            game_duration_seconds: None,
        },
        0,
    )
}

fn events_for(outbound: &[Outbound], session_id: SessionId) -> Vec<&'static str> {
    outbound
        .iter()
        .filter(|o| o.is_for(session_id))
        .map(|o| o.event.name())
        .collect()
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    /// Tests that lobby chat reaches every logged-in session
    #[test]
    fn lobby_chat_reaches_everyone() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);

        let outbound = dispatcher.handle_event(
            BOB,
            ClientEvent::LobbyChat {
                text: "hi all".to_string(),
            },
            10,
        );

        assert_eq!(events_for(&outbound, ALICE), vec!["lobby-new-message"]);
        assert_eq!(events_for(&outbound, BOB), vec!["lobby-new-message"]);
    }

    /// Tests that a connection without a session cannot chat
    #[test]
    fn anonymous_chat_is_dropped() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice")]);

        let outbound = dispatcher.handle_event(
            CAROL,
            ClientEvent::LobbyChat {
                text: "psst".to_string(),
            },
            0,
        );

        assert!(outbound.is_empty());
        assert!(dispatcher.world().lobby_chat().is_empty());
    }

    /// Tests that the snapshot reflects players, rooms and recent chat
    #[test]
    fn lobby_snapshot_is_read_only() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(
            BOB,
            ClientEvent::LobbyChat {
                text: "hello".to_string(),
            },
            0,
        );

        let outbound = dispatcher.handle_event(BOB, ClientEvent::RequestLobby, 0);
        match &outbound[0].event {
            ServerEvent::LobbySnapshot {
                players,
                messages,
                rooms,
            } => {
                assert_eq!(players.len(), 2);
                assert_eq!(messages.len(), 1);
                assert_eq!(rooms.len(), 1);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert_eq!(dispatcher.world().rooms().len(), 1);
    }
}

/// ROOM LIFECYCLE TESTS
mod room_tests {
    use super::*;

    /// Tests the sole member leaving: one room-deleted broadcast, room gone
    #[test]
    fn sole_member_leaving_deletes_room() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 4);

        let outbound = dispatcher.handle_event(ALICE, ClientEvent::LeaveRoom, 0);

        let deleted: Vec<&Outbound> = outbound
            .iter()
            .filter(|o| matches!(o.event, ServerEvent::RoomDeleted { room_id: 1 }))
            .collect();
        assert_eq!(deleted.len(), 1);

        match dispatcher.world().lobby_snapshot() {
            ServerEvent::LobbySnapshot { rooms, .. } => assert!(rooms.is_empty()),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    /// Tests that a full room rejects further joins with a join error
    #[test]
    fn full_room_rejects_joiner() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol")]);
        create_arena(&mut dispatcher, ALICE, 2);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let outbound = dispatcher.handle_event(CAROL, ClientEvent::JoinRoom { room_id: 1 }, 0);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].recipients, vec![CAROL]);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::RoomJoinError {
                kind: ErrorKind::RoomFull,
                ..
            }
        ));
        assert_eq!(dispatcher.world().rooms().get(1).unwrap().members.len(), 2);
    }

    /// Tests host hand-over when the host disconnects
    #[test]
    fn host_disconnect_hands_over() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let outbound = dispatcher.handle_disconnect(ALICE);

        assert!(events_for(&outbound, BOB).contains(&"room-player-left"));
        assert!(events_for(&outbound, BOB).contains(&"lobby-player-left"));
        let room = dispatcher.world().rooms().get(1).unwrap();
        assert_eq!(room.host_session_id, BOB);

        let outbound = dispatcher.handle_event(BOB, ClientEvent::StartGame, 0);
        assert_eq!(events_for(&outbound, BOB)[0], "game-started");
    }

    /// Tests that room chat stays inside the room
    #[test]
    fn room_chat_is_scoped() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let outbound = dispatcher.handle_event(
            BOB,
            ClientEvent::RoomChat {
                text: "gl hf".to_string(),
            },
            0,
        );

        assert_eq!(events_for(&outbound, ALICE), vec!["room-new-message"]);
        assert_eq!(events_for(&outbound, BOB), vec!["room-new-message"]);
        assert!(events_for(&outbound, CAROL).is_empty());
        assert_eq!(dispatcher.world().rooms().get(1).unwrap().chat.len(), 1);

        for outbound in dispatcher.lobby_tick() {
            let text = serde_json::to_string(&outbound.event).unwrap();
            assert!(!text.contains("gl hf"));
        }
        let outbound = dispatcher.handle_event(CAROL, ClientEvent::RequestLobby, 0);
        let text = serde_json::to_string(&outbound[0].event).unwrap();
        assert!(!text.contains("gl hf"));
    }
}

/// GAME ROUND TESTS
mod game_tests {
    use super::*;

    /// Full arena scenario: create, join, start, move, auto-end
    #[test]
    fn arena_round_scenario() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 2);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let room = dispatcher.world().rooms().get(1).unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.members.len(), 2);

        let outbound = dispatcher.handle_event(ALICE, ClientEvent::StartGame, 1_000);
        match &outbound[0].event {
            ServerEvent::GameStarted { room, game } => {
                assert_eq!(room.status, RoomStatus::Playing);
                assert_eq!(game.per_player.len(), 2);
                assert!(game.per_player.values().all(|p| p.score == 0));
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        let mut last_head = AVATAR_ORIGIN;
        for _ in 0..3 {
            let outbound =
                dispatcher.handle_event(ALICE, ClientEvent::move_to(Direction::Right), 2_000);
            match &outbound[0].event {
                ServerEvent::GameStateUpdate { game, .. } => {
                    last_head = game.per_player[&ALICE].avatar_body[0];
                }
                other => panic!("Unexpected event: {:?}", other),
            }
        }
        assert_eq!(last_head.y, AVATAR_ORIGIN.y);
        assert!(last_head.x > AVATAR_ORIGIN.x);
        assert!(last_head.x <= (AVATAR_ORIGIN.x + 3).min(GRID_SIZE - 1));

        assert!(dispatcher.expiry_sweep(30_000).is_empty());
        let outbound = dispatcher.expiry_sweep(61_000);
        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound[0].recipients, vec![ALICE, BOB]);
        assert!(matches!(outbound[0].event, ServerEvent::GameEnded { .. }));
        assert_eq!(outbound[1].event.name(), "lobby-state-update");
        assert_eq!(
            dispatcher.world().rooms().get(1).unwrap().status,
            RoomStatus::Finished
        );
    }

    /// A member who is not the host cannot start the round
    #[test]
    fn non_host_cannot_start() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let outbound = dispatcher.handle_event(BOB, ClientEvent::StartGame, 0);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].recipients, vec![BOB]);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::Error {
                kind: ErrorKind::NotHost,
                ..
            }
        ));
        assert_eq!(
            dispatcher.world().rooms().get(1).unwrap().status,
            RoomStatus::Waiting
        );
    }

    /// Someone outside the room is refused like any other non-host
    #[test]
    fn outsider_cannot_start() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol")]);
        create_arena(&mut dispatcher, ALICE, 2);
        dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);

        let outbound = dispatcher.handle_event(CAROL, ClientEvent::StartGame, 0);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].recipients, vec![CAROL]);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::Error {
                kind: ErrorKind::NotHost,
                ..
            }
        ));

        let outbound = dispatcher.handle_event(CAROL, ClientEvent::EndGame, 0);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::Error {
                kind: ErrorKind::NotHost,
                ..
            }
        ));
        assert_eq!(
            dispatcher.world().rooms().get(1).unwrap().status,
            RoomStatus::Waiting
        );
    }

    /// Late joiners are locked out of the running round
    #[test]
    fn late_joiner_cannot_play() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice"), (BOB, "Bob")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(ALICE, ClientEvent::StartGame, 0);

        let outbound = dispatcher.handle_event(BOB, ClientEvent::JoinRoom { room_id: 1 }, 0);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::RoomJoinError {
                kind: ErrorKind::RoomNotJoinable,
                ..
            }
        ));

        let outbound = dispatcher.handle_event(BOB, ClientEvent::move_to(Direction::Up), 0);
        assert!(outbound.is_empty());
    }

    /// Finished rooms can be restarted by the host
    #[test]
    fn finished_room_restarts() {
        let mut dispatcher = dispatcher_with(&[(ALICE, "Alice")]);
        create_arena(&mut dispatcher, ALICE, 4);
        dispatcher.handle_event(ALICE, ClientEvent::StartGame, 0);

        let outbound = dispatcher.handle_event(ALICE, ClientEvent::EndGame, 5_000);
        assert_eq!(
            events_for(&outbound, ALICE),
            vec!["game-ended", "lobby-state-update"]
        );

        let outbound = dispatcher.handle_event(ALICE, ClientEvent::EndGame, 5_000);
        assert!(matches!(
            outbound[0].event,
            ServerEvent::Error {
                kind: ErrorKind::InvalidState,
                ..
            }
        ));

        let outbound = dispatcher.handle_event(ALICE, ClientEvent::StartGame, 6_000);
        assert_eq!(events_for(&outbound, ALICE)[0], "game-started");
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use server::config::ServerConfig;
    use server::network::Server;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::assert_ok;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    /// Tests a real WebSocket login round trip
    #[tokio::test]
    async fn websocket_login_round_trip() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let mut server = Server::bind(config, World::with_seed(1)).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move {
            server.run().await;
        });

        let url = format!("ws://{}", addr);
        let (mut ws, _) = assert_ok!(connect_async(url.as_str()).await);

        let login = serde_json::to_string(&ClientEvent::Login {
            display_name: "Ann".to_string(),
        })
        .unwrap();
        assert_ok!(ws.send(Message::Text(login)).await);

        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("no reply from server")
            .expect("stream closed")
            .expect("websocket error");

        match frame {
            Message::Text(text) => {
                let json: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(json["event"], "logged-in");
                assert_eq!(json["data"]["session"]["displayName"], "Ann");
                assert_eq!(json["data"]["session"]["status"], "online");
            }
            other => panic!("Unexpected frame: {:?}", other),
        }

        let garbage = Message::Text("{\"event\":\"teleport\"}".to_string());
        assert_ok!(ws.send(garbage).await);

        let mut saw_error = false;
        while let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_secs(2), ws.next()).await
        {
            let json: serde_json::Value = serde_json::from_str(&text).unwrap();
            if json["event"] == "error" {
                assert_eq!(json["data"]["kind"], "validation-error");
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }
}
