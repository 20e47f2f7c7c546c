use std::time::Duration;

use mux_rpc::protocol::{read_frame, split_method, write_frame};
use mux_rpc::{Frame, Result, RpcClient, RpcConfig, CMD_RPC_METHOD, DEFAULT_MAX_BODY_LEN};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Debug, Serialize, Deserialize)]
struct EchoRequest {
    text: String,
}

/// Accept one connection and echo every named-method call back.
async fn serve(listener: TcpListener) -> Result<()> {
    // ---
    let (stream, peer) = listener.accept().await?;
    println!("server: connection from {peer}");

    let (mut reader, mut writer) = stream.into_split();
    while let Some(frame) = read_frame(&mut reader, DEFAULT_MAX_BODY_LEN).await? {
        if frame.cmd != CMD_RPC_METHOD {
            // keepalive or unknown traffic
            continue;
        }
        let reply = match split_method(&frame.body) {
            Some((payload, _method)) => Frame::reply(frame.seq, payload),
            None => Frame::error_reply(frame.seq, "malformed call"),
        };
        write_frame(&mut writer, &reply).await?;
    }

    println!("server: client went away");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let server = tokio::spawn(serve(listener));

    let config = RpcConfig::tcp(&addr, "echo-client").with_keepalive(Some(Duration::from_secs(5)));
    let client = RpcClient::connect(&config).await?;

    let mut calls = Vec::new();
    for i in 0..4 {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            let req = EchoRequest {
                text: format!("hello #{i}"),
            };
            client
                .call::<_, EchoRequest>("Echo", &req, Duration::from_secs(1))
                .await
        }));
    }

    for call in calls {
        match call.await {
            Ok(Ok(rsp)) => println!("echo: {}", rsp.text),
            Ok(Err(err)) => println!("call failed: {err}"),
            Err(err) => println!("call task failed: {err}"),
        }
    }

    client.close().await?;
    match server.await {
        Ok(result) => result?,
        Err(err) => println!("server task failed: {err}"),
    }
    Ok(())
}
