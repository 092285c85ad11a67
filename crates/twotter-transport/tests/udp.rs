//! Integration tests for the UDP transport.
//!
//! These bind real sockets on the loopback interface and check that
//! datagrams flow both ways with their boundaries and source addresses
//! intact.

use std::time::Duration;

use twotter_transport::{MAX_DATAGRAM_SIZE, Transport, UdpTransport};

#[tokio::test]
async fn test_udp_send_and_receive_both_ways() {
    let a = UdpTransport::bind("127.0.0.1:0").await.expect("bind a");
    let b = UdpTransport::bind("127.0.0.1:0").await.expect("bind b");
    let a_addr = a.local_addr().unwrap();
    let b_addr = b.local_addr().unwrap();

    a.send_to(b"hello from a", b_addr).await.expect("send a→b");
    let (data, from) = b.recv_from().await.expect("recv at b");
    assert_eq!(data, b"hello from a");
    assert_eq!(from, a_addr);

    b.send_to(b"hello from b", a_addr).await.expect("send b→a");
    let (data, from) = a.recv_from().await.expect("recv at a");
    assert_eq!(data, b"hello from b");
    assert_eq!(from, b_addr);
}

#[tokio::test]
async fn test_udp_preserves_datagram_boundaries() {
    let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let b_addr = b.local_addr().unwrap();

    a.send_to(&[1; 10], b_addr).await.unwrap();
    a.send_to(&[2; 20], b_addr).await.unwrap();

    let (first, _) = b.recv_from().await.unwrap();
    let (second, _) = b.recv_from().await.unwrap();
    assert_eq!(first, vec![1; 10]);
    assert_eq!(second, vec![2; 20]);
}

#[tokio::test]
async fn test_udp_oversized_datagram_is_truncated_to_buffer() {
    let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let b_addr = b.local_addr().unwrap();

    a.send_to(&vec![7; MAX_DATAGRAM_SIZE + 100], b_addr)
        .await
        .unwrap();

    let (data, _) = tokio::time::timeout(Duration::from_secs(2), b.recv_from())
        .await
        .expect("datagram should arrive")
        .unwrap();
    assert_eq!(data.len(), MAX_DATAGRAM_SIZE);
}

#[tokio::test]
async fn test_udp_bind_reports_os_assigned_port() {
    let t = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    assert_ne!(t.local_addr().unwrap().port(), 0);
}
