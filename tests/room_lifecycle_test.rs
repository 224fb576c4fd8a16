use std::time::Duration;

use parlor::config::EngineConfig;
use parlor::core::connection::{event_channel, EventReceiver, EventSender};
use parlor::core::room::RoomConfig;
use parlor::core::{ServerEvent, SessionEngine};
use parlor::error::ParlorError;
use parlor::games::{GameMove, GameType, Outcome};

fn test_config() -> EngineConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    EngineConfig {
        grace_period: Duration::from_millis(100),
        reap_timeout: Duration::from_millis(150),
        max_rooms: 16,
        rps_rounds: 3,
    }
}

/// Skip unrelated events until the predicate matches or the timeout hits
async fn wait_for<F>(rx: &mut EventReceiver, pred: F) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn join(
    engine: &SessionEngine,
    code: &str,
    id: &str,
) -> (EventSender, EventReceiver) {
    let (tx, rx) = event_channel();
    engine
        .join_room(code, id.to_string(), id.to_string(), None, tx.clone())
        .await
        .unwrap();
    (tx, rx)
}

#[tokio::test]
async fn test_full_roster_triggers_game_start() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::TicTacToe, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    let (_tx1, mut rx1) = join(&engine, &info.code, "alice").await;
    let (_tx2, mut rx2) = join(&engine, &info.code, "bob").await;

    let start = wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameStart { .. })).await;
    match start {
        ServerEvent::GameStart { game, turn_owner, .. } => {
            assert_eq!(game, GameType::TicTacToe);
            assert_eq!(turn_owner.as_deref(), Some("alice"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    wait_for(&mut rx2, |e| matches!(e, ServerEvent::GameStart { .. })).await;

    let rooms = engine.list_rooms().await;
    assert_eq!(rooms[0].status, "active");
    assert_eq!(rooms[0].player_count, 2);
}

#[tokio::test]
async fn test_third_join_rejected_when_full() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::Battleship, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    join(&engine, &info.code, "a").await;
    join(&engine, &info.code, "b").await;

    let (tx, _rx) = event_channel();
    let result = engine
        .join_room(&info.code, "c".to_string(), "c".to_string(), None, tx)
        .await;
    assert_eq!(result.unwrap_err(), ParlorError::RoomFull);
}

#[tokio::test]
async fn test_leave_during_active_forfeits() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::TicTacToe, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    let (_tx1, mut rx1) = join(&engine, &info.code, "alice").await;
    let (_tx2, _rx2) = join(&engine, &info.code, "bob").await;
    wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameStart { .. })).await;

    engine.leave_room(&info.code, "bob".to_string()).await.unwrap();

    let over = wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameOver { .. })).await;
    match over {
        ServerEvent::GameOver { outcome, .. } => {
            assert_eq!(
                outcome,
                Outcome::Forfeit {
                    winner: Some("alice".to_string()),
                    left: "bob".to_string(),
                }
            );
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_grace_expiry_counts_as_leave() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::TicTacToe, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    let (_tx1, mut rx1) = join(&engine, &info.code, "alice").await;
    let (_tx2, _rx2) = join(&engine, &info.code, "bob").await;
    wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameStart { .. })).await;

    engine
        .player_disconnected(&info.code, "bob".to_string())
        .await
        .unwrap();

    wait_for(&mut rx1, |e| {
        matches!(e, ServerEvent::PlayerDisconnected { player_id, .. } if player_id == "bob")
    })
    .await;

    // Grace timer runs out; the drop becomes a forfeit
    let over = wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameOver { .. })).await;
    match over {
        ServerEvent::GameOver { outcome, .. } => {
            assert!(matches!(outcome, Outcome::Forfeit { left, .. } if left == "bob"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_reconnect_within_grace_resyncs() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::TicTacToe, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    let (_tx1, mut rx1) = join(&engine, &info.code, "alice").await;
    let (_tx2, _rx2) = join(&engine, &info.code, "bob").await;
    wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameStart { .. })).await;

    engine
        .player_disconnected(&info.code, "bob".to_string())
        .await
        .unwrap();

    let (tx2b, mut rx2b) = event_channel();
    engine
        .player_reconnected(&info.code, "bob".to_string(), tx2b)
        .await
        .unwrap();

    let resync = wait_for(&mut rx2b, |e| matches!(e, ServerEvent::Resync { .. })).await;
    match resync {
        ServerEvent::Resync { status, outcome, .. } => {
            assert_eq!(status, "active");
            assert_eq!(outcome, None);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // The stale grace expiry must not end the game
    tokio::time::sleep(Duration::from_millis(300)).await;
    let rooms = engine.list_rooms().await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].status, "active");
    assert_eq!(rooms[0].player_count, 2);
}

#[tokio::test]
async fn test_finished_room_is_reaped() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::TicTacToe, None);
    config.seed = Some(1);
    let info = engine.create_room(config).await.unwrap();

    let (tx1, mut rx1) = join(&engine, &info.code, "alice").await;
    let (tx2, _rx2) = join(&engine, &info.code, "bob").await;
    wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameStart { .. })).await;

    // Alice wins the top row
    for (mover, cell) in [("alice", 0), ("bob", 3), ("alice", 1), ("bob", 4), ("alice", 2)] {
        let tx = if mover == "alice" { &tx1 } else { &tx2 };
        engine
            .submit_move(&info.code, mover.to_string(), GameMove::Place { cell }, tx.clone())
            .await
            .unwrap();
    }
    wait_for(&mut rx1, |e| matches!(e, ServerEvent::GameOver { .. })).await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(engine.list_rooms().await.is_empty());
    assert_eq!(engine.room_count().await, 0);
}

#[tokio::test]
async fn test_empty_waiting_room_is_reaped() {
    let engine = SessionEngine::new(test_config());
    let mut config = RoomConfig::new(GameType::Uno, Some(4));
    config.seed = Some(1);
    engine.create_room(config).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.room_count().await, 0);
}
