//! Wire-level tests for stitch-net over real sockets

use smol::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use smol::net::{TcpListener, TcpStream};
use stitch_net::*;

// ============================================================================
// REQUEST PARSING
// ============================================================================

#[test]
fn test_request_over_tcp() {
    smol::block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = smol::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /blog/ HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream.clone());
        let request = Request::read_from(&mut reader).await.unwrap();
        assert_eq!(request.path, "/blog/");

        let mut writer = stream;
        Response::text(200, "hello").write_to(&mut writer).await.unwrap();
        drop(writer);
        drop(reader);

        let response = client.await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("hello"));
    });
}

#[test]
fn test_oversized_head_rejected() {
    let mut raw = String::from("GET / HTTP/1.1\r\n");
    for i in 0..2000 {
        raw.push_str(&format!("X-Filler-{i}: aaaaaaaaaaaaaaaa\r\n"));
    }
    raw.push_str("\r\n");

    let result = smol::block_on(async {
        let mut reader = BufReader::new(raw.as_bytes());
        Request::read_from(&mut reader).await
    });
    assert!(matches!(result, Err(NetError::HeadTooLarge)));
}

#[test]
fn test_endless_request_line_rejected_while_connection_open() {
    smol::block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (done, finished) = smol::channel::bounded::<()>(1);

        let client = smol::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut line = b"GET /".to_vec();
            line.resize(MAX_HEAD_BYTES * 2, b'a');
            stream.write_all(&line).await.unwrap();
            // No line end and no EOF until the server gives up
            let _ = finished.recv().await;
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);
        let result = smol::future::or(async { Some(Request::read_from(&mut reader).await) }, async {
            smol::Timer::after(std::time::Duration::from_secs(10)).await;
            None
        })
        .await;
        assert!(matches!(result, Some(Err(NetError::HeadTooLarge))), "{result:?}");

        done.send(()).await.unwrap();
        client.await;
    });
}

#[test]
fn test_head_at_limit_accepted() {
    let mut raw = String::from("GET / HTTP/1.1\r\nX-Pad: ");
    let pad = MAX_HEAD_BYTES - raw.len() - "\r\n\r\n".len();
    raw.push_str(&"p".repeat(pad));
    raw.push_str("\r\n\r\n");
    assert_eq!(raw.len(), MAX_HEAD_BYTES);

    let result = smol::block_on(async {
        let mut reader = BufReader::new(raw.as_bytes());
        Request::read_from(&mut reader).await
    });
    assert_eq!(result.unwrap().header("x-pad").map(str::len), Some(pad));
}

#[test]
fn test_headers_without_final_blank_line() {
    let result = smol::block_on(async {
        let mut reader = BufReader::new(&b"GET /a HTTP/1.0\r\nHost: x\r\n"[..]);
        Request::read_from(&mut reader).await
    });
    let request = result.unwrap();
    assert_eq!(request.version, HttpVersion::Http10);
    assert_eq!(request.header("HOST"), Some("x"));
}

// ============================================================================
// RELOAD HUB
// ============================================================================

#[test]
fn test_hub_over_tcp_drops_closed_client() {
    smol::block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub: ReloadHub<TcpStream> = ReloadHub::new();

        let staying = TcpStream::connect(addr).await.unwrap();
        let (server_a, _) = listener.accept().await.unwrap();
        let leaving = TcpStream::connect(addr).await.unwrap();
        let (server_b, _) = listener.accept().await.unwrap();

        hub.register(server_a);
        let b = hub.register(server_b);
        drop(leaving);
        hub.remove(b);

        assert_eq!(hub.broadcast(&SseEvent::message("reload")).await, 1);

        let mut buf = [0u8; 14];
        let mut staying = staying;
        staying.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"data: reload\n\n");
    });
}

#[test]
fn test_reason_phrases() {
    assert_eq!(reason_phrase(200), "OK");
    assert_eq!(reason_phrase(405), "Method Not Allowed");
    assert_eq!(reason_phrase(799), "");
}
