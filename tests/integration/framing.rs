use std::time::Duration;

use tokio::net::UdpSocket;

use vigil_watch::send::EvidenceSender;
use vigild::receive::EvidenceReceiver;

use crate::*;

/// The canonical end-to-end scenario: a 3000-byte payload crosses the
/// image link as 1024 + 1024 + 952 + sentinel and reassembles
/// byte-identical.
#[tokio::test]
async fn end_to_end_payload_round_trip() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let mut receiver = EvidenceReceiver::new(socket);

    let mut sender = EvidenceSender::connect(addr, Duration::ZERO).await.unwrap();
    let payload: Vec<u8> = (0..3000u32).map(|i| (i.wrapping_mul(7) % 256) as u8).collect();
    sender.transmit(&payload).await.unwrap();

    let (received, from) = within("payload", receiver.recv_payload()).await.unwrap();
    assert_eq!(received.len(), 3000);
    assert_eq!(&received[..], &payload[..]);
    assert!(from.ip().is_loopback());
}

/// Cancelling an in-flight receive (a control command won the race)
/// discards the partial buffer: the next receive yields only the next
/// payload, never a merged one.
#[tokio::test]
async fn cancelled_receive_discards_partial_payload() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let mut receiver = EvidenceReceiver::new(socket);

    let feeder = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // two data frames, no sentinel — the payload never completes
    feeder.send_to(&[0xaa; 100], addr).await.unwrap();
    feeder.send_to(&[0xaa; 100], addr).await.unwrap();

    // let the receive attempt consume the partial frames, then cancel it
    tokio::select! {
        _ = receiver.recv_payload() => panic!("incomplete payload must not complete"),
        _ = tokio::time::sleep(Duration::from_millis(300)) => {}
    }

    // a fresh payload arrives after the cancellation
    let payload = vec![0xbb; 300];
    for chunk in payload.chunks(1024) {
        feeder.send_to(chunk, addr).await.unwrap();
    }
    feeder.send_to(&[], addr).await.unwrap();

    let (received, _) = within("fresh payload", receiver.recv_payload())
        .await
        .unwrap();
    assert_eq!(received.len(), 300, "partial frames leaked into the next payload");
    assert!(received.iter().all(|b| *b == 0xbb));
}

/// Rate gating is enforced on the sender across the real wire: a burst
/// of attempts inside the interval produces exactly one payload.
#[tokio::test]
async fn rate_gate_limits_wire_traffic() {
    use vigil_core::gate::SendOutcome;
    use vigil_watch::capture::Frame;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let mut receiver = EvidenceReceiver::new(socket);

    let mut sender = EvidenceSender::connect(addr, Duration::from_secs(60))
        .await
        .unwrap();

    let frame = Frame::filled(16, 16, 200);
    let mut sent = 0;
    for _ in 0..4 {
        if sender.send_if_due(&frame).await.unwrap() == SendOutcome::Sent {
            sent += 1;
        }
    }
    assert_eq!(sent, 1);

    // exactly one payload on the wire
    let (first, _) = within("first payload", receiver.recv_payload())
        .await
        .unwrap();
    assert!(!first.is_empty());

    let extra = tokio::time::timeout(Duration::from_millis(300), receiver.recv_payload()).await;
    assert!(extra.is_err(), "throttled attempts must not transmit");
}
