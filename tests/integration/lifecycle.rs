use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;

use vigil_core::control::{SessionState, KILL_TOKEN};
use vigil_ctl::{StartOutcome, Supervisor};
use vigil_watch::send::EvidenceSender;
use vigild::notify::{ChannelNotifier, Posted, SessionCommand};

use crate::*;

async fn wait_for_state(rx: &mut watch::Receiver<SessionState>, target: SessionState) {
    within("state transition", async {
        loop {
            if *rx.borrow_and_update() == target {
                return;
            }
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
}

/// Full lifecycle, no state skipped: Idle → start → Handshaking → Active
/// → front-end begin → evidence flows → front-end end → Ending →
/// teardown → Idle. The relay runs in-process; OS stand-ins cover the
/// supervised child processes.
#[tokio::test]
async fn full_lifecycle_idle_to_idle() {
    let config = localhost_config().await;
    let (notifier, cmd_tx, mut posts) = ChannelNotifier::new();

    let relay_config = config.clone();
    let relay_task = tokio::spawn(async move {
        // give the supervisor a beat to bind its listener
        tokio::time::sleep(Duration::from_millis(150)).await;
        vigild::run(relay_config, Box::new(notifier)).await
    });

    let mut sup = Supervisor::new(config.clone());
    let mut state_rx = sup.state();
    assert_eq!(sup.current_state(), SessionState::Idle);

    assert_eq!(sup.start().await.unwrap(), StartOutcome::Started);
    assert_eq!(sup.current_state(), SessionState::Active);

    // a second start while a session exists is rejected, state untouched
    assert_eq!(sup.start().await.unwrap(), StartOutcome::AlreadyRunning);
    assert_eq!(sup.current_state(), SessionState::Active);

    // front-end begins the session
    cmd_tx.send(SessionCommand::Begin).await.unwrap();
    assert_eq!(
        within("starting post", posts.recv()).await.unwrap(),
        Posted::Text("Starting...".into())
    );

    // the watcher's kill-link connection, stood in by the test
    let mut watcher_side = TcpStream::connect(config.endpoints.kill_addr)
        .await
        .unwrap();

    // evidence flows edge → relay → notifier, byte-identical
    let mut sender = EvidenceSender::connect(config.endpoints.image_addr, Duration::ZERO)
        .await
        .unwrap();
    let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    sender.transmit(&payload).await.unwrap();
    match within("evidence post", posts.recv()).await.unwrap() {
        Posted::Evidence { image, source } => {
            assert_eq!(&image[..], &payload[..]);
            assert!(source.starts_with("127.0.0.1"));
        }
        other => panic!("expected evidence, got {other:?}"),
    }

    // front-end ends the session: relay signals stopping upstream,
    // fires the kill link, reaps its watcher
    cmd_tx.send(SessionCommand::End).await.unwrap();
    assert_eq!(
        within("stopping post", posts.recv()).await.unwrap(),
        Posted::Text("Stopping...".into())
    );

    let mut token = [0u8; 4];
    within("kill token", watcher_side.read_exact(&mut token))
        .await
        .unwrap();
    assert_eq!(&token, KILL_TOKEN);

    assert_eq!(
        within("stopped post", posts.recv()).await.unwrap(),
        Posted::Text("Stopped.".into())
    );

    // the supervisor observed the relay's stopping signal
    wait_for_state(&mut state_rx, SessionState::Ending).await;

    // and completes the teardown
    sup.stop().await.unwrap();
    assert_eq!(sup.current_state(), SessionState::Idle);

    let relay_result = within("relay exit", relay_task).await.unwrap();
    assert!(relay_result.is_ok(), "{relay_result:?}");
}

/// A supervisor-initiated stop while the session is streaming also tears
/// the whole pipeline down: the relay reaps its watcher on the way out.
#[tokio::test]
async fn supervisor_stop_while_streaming() {
    let config = localhost_config().await;
    let (notifier, cmd_tx, mut posts) = ChannelNotifier::new();

    let relay_config = config.clone();
    let relay_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        vigild::run(relay_config, Box::new(notifier)).await
    });

    let mut sup = Supervisor::new(config.clone());
    assert_eq!(sup.start().await.unwrap(), StartOutcome::Started);

    cmd_tx.send(SessionCommand::Begin).await.unwrap();
    assert_eq!(
        within("starting post", posts.recv()).await.unwrap(),
        Posted::Text("Starting...".into())
    );
    let mut watcher_side = TcpStream::connect(config.endpoints.kill_addr)
        .await
        .unwrap();

    // stop from the supervisor side, mid-session
    sup.stop().await.unwrap();
    assert_eq!(sup.current_state(), SessionState::Idle);

    // the relay fired the kill link during its shutdown
    let mut token = [0u8; 4];
    within("kill token", watcher_side.read_exact(&mut token))
        .await
        .unwrap();
    assert_eq!(&token, KILL_TOKEN);

    let relay_result = within("relay exit", relay_task).await.unwrap();
    assert!(relay_result.is_ok(), "{relay_result:?}");
}
