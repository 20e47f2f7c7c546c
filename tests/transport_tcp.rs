// tests/transport_tcp.rs

mod common;

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mux_rpc::protocol::{read_frame, split_method, write_frame};
use mux_rpc::{
    //
    Frame,
    Result,
    RpcClient,
    RpcConfig,
    RpcError,
    CMD_RPC_METHOD,
    DEFAULT_MAX_BODY_LEN,
};

use common::{init_logging, wait_until};

const LONG: Duration = Duration::from_secs(2);

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct EchoRequest {
    text: String,
}

/// Accepts one connection and serves it: "Echo" returns the payload, any
/// other method gets an error reply. Stops after `max_calls` calls by
/// dropping the connection.
async fn spawn_server(max_calls: usize) -> std::io::Result<(String, JoinHandle<()>)> {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();

    let handle = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (mut reader, mut writer) = stream.into_split();

        let mut served = 0;
        while served < max_calls {
            let frame = match read_frame(&mut reader, DEFAULT_MAX_BODY_LEN).await {
                Ok(Some(frame)) => frame,
                _ => return,
            };
            if frame.cmd != CMD_RPC_METHOD {
                continue;
            }
            served += 1;

            let reply = match split_method(&frame.body) {
                Some((payload, method)) if method == "Echo" => Frame::reply(frame.seq, payload),
                Some((_, method)) => {
                    Frame::error_reply(frame.seq, &format!("unknown method {method}"))
                }
                None => Frame::error_reply(frame.seq, "malformed call"),
            };

            if write_frame(&mut writer, &reply).await.is_err() {
                return;
            }
        }
    });

    Ok((addr, handle))
}

fn config(addr: &str, id: &str) -> RpcConfig {
    RpcConfig::tcp(addr, id).with_keepalive(None)
}

#[tokio::test]
async fn test_tcp_echo() -> Result<()> {
    // ---
    init_logging();

    let (addr, server) = spawn_server(usize::MAX).await?;
    let client = RpcClient::connect(&config(&addr, "tcp_echo")).await?;

    let req = EchoRequest {
        text: "over the wire".into(),
    };
    let rsp: EchoRequest = client.call("Echo", &req, LONG).await?;
    assert_eq!(rsp, req);

    let err = client
        .call::<_, EchoRequest>("Missing", &req, LONG)
        .await
        .expect_err("unknown method must fail");
    assert!(matches!(err, RpcError::Remote(ref m) if m == "unknown method Missing"));

    client.close().await?;
    tokio::time::timeout(LONG, server)
        .await
        .expect("server did not stop")
        .expect("server task panicked");

    Ok(())
}

#[tokio::test]
async fn test_tcp_server_drop_releases_calls() -> Result<()> {
    // ---
    init_logging();

    // the server answers nothing and hangs up after the first call
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let (mut reader, _writer) = stream.into_split();
            let _ = read_frame(&mut reader, DEFAULT_MAX_BODY_LEN).await;
        }
    });

    let client = RpcClient::connect(&config(&addr, "tcp_drop")).await?;

    let result = client
        .call_raw(42, Bytes::from_static(b"anyone there?"))
        .await;
    assert!(matches!(result, Err(RpcError::ClientDisconnected)));

    wait_until(|| !client.is_running()).await;
    server.await.expect("server task panicked");

    Ok(())
}

#[tokio::test]
async fn test_tcp_connect_refused() -> Result<()> {
    // ---
    init_logging();

    // grab a free port, then release it
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.to_string()
    };

    let result = RpcClient::connect(&config(&addr, "tcp_refused")).await;
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_tcp_requires_address() {
    // ---
    let result = RpcClient::connect(&RpcConfig::memory("no_addr")).await;
    assert!(matches!(result, Err(RpcError::Transport(_))));
}
