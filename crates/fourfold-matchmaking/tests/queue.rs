//! Integration tests for the matchmaking actor.
//!
//! Time is paused, so the sweep's one-second ticks and the ten-second
//! wait limit pass instantly while the runtime is idle.

use std::time::Duration;

use fourfold_matchmaking::{MatchmakingQueue, Pairing, QueueConfig, QueueError};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Callbacks report into these channels so tests can observe them.
struct Callbacks {
    matched: mpsc::UnboundedReceiver<(String, Pairing)>,
    timed_out: mpsc::UnboundedReceiver<String>,
    match_tx: mpsc::UnboundedSender<(String, Pairing)>,
    timeout_tx: mpsc::UnboundedSender<String>,
}

impl Callbacks {
    fn new() -> Self {
        let (match_tx, matched) = mpsc::unbounded_channel();
        let (timeout_tx, timed_out) = mpsc::unbounded_channel();
        Self {
            matched,
            timed_out,
            match_tx,
            timeout_tx,
        }
    }

    async fn add(&self, queue: &MatchmakingQueue, username: &str) {
        let me = username.to_string();
        let match_tx = self.match_tx.clone();
        let timeout_tx = self.timeout_tx.clone();
        queue
            .add_player(
                username,
                move |pairing| async move {
                    let _ = match_tx.send((me, pairing));
                },
                move |name| async move {
                    let _ = timeout_tx.send(name);
                },
            )
            .await
            .expect("queue should accept");
    }
}

#[tokio::test(start_paused = true)]
async fn test_add_player_first_entrant_waits_at_position_one() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let callbacks = Callbacks::new();

    callbacks.add(&queue, "alice").await;

    assert_eq!(queue.position("alice").await.unwrap(), 1);
    assert_eq!(queue.size().await.unwrap(), 1);
    assert_eq!(queue.position("nobody").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_add_player_pairs_oldest_with_newcomer() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let mut callbacks = Callbacks::new();

    callbacks.add(&queue, "alice").await;
    callbacks.add(&queue, "bob").await;

    let expected = Pairing {
        seat_one: "alice".into(),
        seat_two: "bob".into(),
    };
    let mut notified = vec![
        callbacks.matched.recv().await.unwrap(),
        callbacks.matched.recv().await.unwrap(),
    ];
    notified.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(notified[0], ("alice".to_string(), expected.clone()));
    assert_eq!(notified[1], ("bob".to_string(), expected));
    assert_eq!(queue.size().await.unwrap(), 0);
    assert_eq!(queue.position("bob").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_add_player_fifo_across_several_arrivals() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let mut callbacks = Callbacks::new();

    for name in ["a", "b", "c", "d", "e"] {
        callbacks.add(&queue, name).await;
    }

    let mut pairings = Vec::new();
    for _ in 0..4 {
        let (_, pairing) = callbacks.matched.recv().await.unwrap();
        if !pairings.contains(&pairing) {
            pairings.push(pairing);
        }
    }
    pairings.sort_by(|x, y| x.seat_one.cmp(&y.seat_one));

    assert_eq!(pairings.len(), 2);
    assert_eq!((pairings[0].seat_one.as_str(), pairings[0].seat_two.as_str()), ("a", "b"));
    assert_eq!((pairings[1].seat_one.as_str(), pairings[1].seat_two.as_str()), ("c", "d"));
    assert_eq!(queue.position("e").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_add_player_duplicate_leaves_queue_unchanged() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let mut callbacks = Callbacks::new();

    callbacks.add(&queue, "alice").await;
    callbacks.add(&queue, "alice").await;

    assert_eq!(queue.size().await.unwrap(), 1);
    assert_eq!(queue.position("alice").await.unwrap(), 1);
    assert!(callbacks.matched.try_recv().is_err(), "no self-match");
}

#[tokio::test(start_paused = true)]
async fn test_remove_player_takes_entry_out() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let mut callbacks = Callbacks::new();

    callbacks.add(&queue, "alice").await;
    queue.remove_player("alice").await.unwrap();
    queue.remove_player("ghost").await.unwrap();

    assert_eq!(queue.size().await.unwrap(), 0);

    // Nothing left to time out.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(callbacks.timed_out.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_sweep_times_out_after_match_timeout() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());
    let mut callbacks = Callbacks::new();

    let start = Instant::now();
    callbacks.add(&queue, "carol").await;

    let name = callbacks.timed_out.recv().await.unwrap();
    let waited = start.elapsed();

    assert_eq!(name, "carol");
    assert!(waited >= Duration::from_secs(10), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(11), "waited {waited:?}");
    assert_eq!(queue.size().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_respects_custom_timeout() {
    let queue = MatchmakingQueue::spawn(QueueConfig {
        match_timeout: Duration::from_secs(3),
        ..QueueConfig::default()
    });
    let mut callbacks = Callbacks::new();

    callbacks.add(&queue, "dave").await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(callbacks.timed_out.try_recv().is_err(), "too early");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(callbacks.timed_out.recv().await.unwrap(), "dave");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_handle_unavailable() {
    let queue = MatchmakingQueue::spawn(QueueConfig::default());

    queue.shutdown().await.unwrap();
    // Let the actor observe the command and drop its receiver.
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(matches!(queue.size().await, Err(QueueError::Unavailable)));
}
