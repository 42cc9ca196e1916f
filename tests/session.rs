//! P2P session against a fake peer on a loopback socket

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wavescache::network::session::{ProtocolSession, SessionConfig, SessionState};
use wavescache::network::wire::{build_score_frame, Handshake};
use wavescache::network_type::NetworkType;
use wavescache::observer::RecordingObserver;

const TRANSFER_FRAME_HEX: &str = concat!(
    "000000a5123456781900000098a1d3f948040c2b4f19b50923f4e5a6605ca38b",
    "e3900da83940c656fd77d710182c7a0fa4b76cb789ac1a374f2b95e8ff2db726",
    "70bfc896992575e4e6f1f4d5cfcf5a87b18f04a9d59feec551438cc7437e39cd",
    "75328bc0c345bfc8fc918843c2548772ba2640000000000164155457a5000000",
    "003b9aca0000000000000186a001548d98afe734f1c188ca06fb6c1fc02b49fb",
    "0c2a2ae30713e90000",
);
const SENDER: &str = "3NBVqYXrapgJP9atQccdBPAgJPwHDKkh6A8";
const RECIPIENT: &str = "3N2pmxrbGk8B1qkiA4UhwNeFoMHfctnyBFe";

fn config(peer_addr: String) -> SessionConfig {
    SessionConfig {
        peer_addr,
        network: NetworkType::Testnet,
        node_name: "wavescache".to_string(),
        version: (0, 13, 2),
        keepalive_interval: Duration::from_secs(3600),
        reconnect_backoff: Duration::from_millis(50),
        recv_buffer_size: 64 * 1024,
        verify_checksums: false,
    }
}

/// Bytes the session writes right after connecting: handshake and first keepalive
fn opening_len() -> usize {
    Handshake::local(0, NetworkType::Testnet, "wavescache", (0, 13, 2))
        .encode()
        .len()
        + build_score_frame(0).len()
}

#[tokio::test]
async fn test_handshake_transfer_and_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut opening = vec![0u8; opening_len()];
        socket.read_exact(&mut opening).await.unwrap();

        let handshake = Handshake::decode(&opening).expect("session sent a handshake");
        assert_eq!(handshake.network, NetworkType::Testnet);
        assert_eq!(handshake.node_name, "wavescache");
        assert_eq!(handshake.declared_address, 0x7f00_0001);
        assert_ne!(handshake.declared_port, 0);
        assert!(opening.ends_with(&build_score_frame(0)));

        let mut reply = Handshake::local(6863, NetworkType::Testnet, "testnode", (1, 4, 6)).encode();
        reply.extend_from_slice(&hex::decode(TRANSFER_FRAME_HEX).unwrap());
        socket.write_all(&reply).await.unwrap();
        // Closing the socket ends the session
    });

    let observer = Arc::new(RecordingObserver::new());
    let session = ProtocolSession::new(
        config(addr.to_string()),
        observer.clone(),
        CancellationToken::new(),
    );
    tokio::time::timeout(Duration::from_secs(5), session.run())
        .await
        .expect("session did not end after peer close");
    peer.await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(
        observer.transfers(),
        vec![(SENDER.to_string(), RECIPIENT.to_string())]
    );
}

#[tokio::test]
async fn test_connect_retries_until_peer_is_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = Arc::new(ProtocolSession::new(
        config(addr.to_string()),
        Arc::new(RecordingObserver::new()),
        CancellationToken::new(),
    ));
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run().await })
    };

    // Let a few attempts fail first
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_ne!(session.state(), SessionState::Active);

    let listener = TcpListener::bind(addr).await.unwrap();
    let (mut socket, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("session never reconnected")
        .unwrap();
    let mut opening = vec![0u8; opening_len()];
    socket.read_exact(&mut opening).await.unwrap();
    assert_eq!(session.state(), SessionState::Active);

    drop(socket);
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("session did not end")
        .unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_stop_while_active() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let session = Arc::new(ProtocolSession::new(
        config(addr.to_string()),
        Arc::new(RecordingObserver::new()),
        CancellationToken::new(),
    ));
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run().await })
    };

    let (mut socket, _) = listener.accept().await.unwrap();
    let mut opening = vec![0u8; opening_len()];
    socket.read_exact(&mut opening).await.unwrap();

    session.stop();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("session ignored stop")
        .unwrap();

    // Our side closed the socket
    let mut rest = Vec::new();
    socket.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(session.state(), SessionState::Disconnected);
}
