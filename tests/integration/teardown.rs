use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use vigil_core::control::{ControlMsg, SessionState};
use vigil_core::process::{ChildState, ChildSupervisor};
use vigil_ctl::{StartOutcome, Supervisor};

use crate::*;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// A child that ignores SIGTERM is force-killed once the grace period
/// runs out; stop returns within grace + a small epsilon, never hangs.
#[tokio::test]
async fn stubborn_child_is_force_killed_within_bound() {
    let mut sup = ChildSupervisor::spawn(
        &argv(&["sh", "-c", "trap '' TERM; sleep 30"]),
        Duration::from_secs(1),
        Duration::from_millis(50),
    )
    .unwrap();
    // give the shell a beat to install the trap
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let state = sup.stop().await;
    let elapsed = started.elapsed();

    assert_eq!(state, ChildState::Killed);
    assert!(elapsed >= Duration::from_secs(1), "escalated early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "unbounded stop: {elapsed:?}");
}

/// A cooperative child never costs the full grace period.
#[tokio::test]
async fn cooperative_child_exits_well_within_grace() {
    let mut sup = ChildSupervisor::spawn(
        &argv(&["sleep", "30"]),
        Duration::from_secs(5),
        Duration::from_millis(50),
    )
    .unwrap();

    let started = Instant::now();
    let state = sup.stop().await;

    assert!(matches!(state, ChildState::Exited(_)), "got {state:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// The whole supervisor stop sequence stays bounded even when the relay
/// ignores both the stop token and SIGTERM.
#[tokio::test]
async fn supervisor_stop_is_bounded_when_relay_ignores_everything() {
    let mut config = localhost_config().await;
    config.commands.relay = vec![
        "sh".to_string(),
        "-c".to_string(),
        "trap '' TERM; sleep 300".to_string(),
    ];
    let control_addr = config.endpoints.control_addr;

    // scripted relay peer: reports ready, then ignores everything
    let peer = tokio::spawn(async move {
        let mut stream = loop {
            match TcpStream::connect(control_addr).await {
                Ok(s) => break s,
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        };
        stream.write_all(ControlMsg::Ready.token()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let mut sup = Supervisor::new(config);
    assert_eq!(sup.start().await.unwrap(), StartOutcome::Started);

    let started = Instant::now();
    sup.stop().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(sup.current_state(), SessionState::Idle);
    // reader drain bound + escalation grace + epsilon
    assert!(elapsed < Duration::from_secs(6), "stop took {elapsed:?}");
    peer.abort();
}
