use std::time::Duration;

use mux_rpc::protocol::split_method;
use mux_rpc::{create_memory_pair, Frame, Result, RpcClient, RpcConfig, Transport, CMD_RPC_METHOD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RpcConfig::memory("math");
    let (local, remote) = create_memory_pair(&config)?;

    // the peer answers "Add" and rejects everything else
    let mut inbound = remote.take_inbound()?;
    let server = tokio::spawn(async move {
        while let Some(frame) = inbound.inbox.recv().await {
            if frame.cmd != CMD_RPC_METHOD {
                continue;
            }
            let reply = match split_method(&frame.body) {
                Some((payload, method)) if method == "Add" => {
                    match serde_json::from_slice::<AddRequest>(&payload) {
                        Ok(req) => {
                            let rsp = AddResponse { sum: req.a + req.b };
                            match serde_json::to_vec(&rsp) {
                                Ok(body) => Frame::reply(frame.seq, body),
                                Err(err) => Frame::error_reply(frame.seq, &err.to_string()),
                            }
                        }
                        Err(err) => Frame::error_reply(frame.seq, &err.to_string()),
                    }
                }
                Some((_, method)) => Frame::error_reply(frame.seq, &format!("no method {method}")),
                None => Frame::error_reply(frame.seq, "malformed call"),
            };
            if remote.send(reply).await.is_err() {
                break;
            }
        }
    });

    let client = RpcClient::with_transport(local, &config)?;
    client.on_close("report", || println!("client closed"));

    let resp: AddResponse = client
        .call("Add", &AddRequest { a: 20, b: 3 }, Duration::from_secs(1))
        .await?;
    println!("20 + 3 = {}", resp.sum);

    match client
        .call::<_, AddResponse>("Sub", &AddRequest { a: 1, b: 1 }, Duration::from_secs(1))
        .await
    {
        Ok(_) => println!("unexpected success"),
        Err(err) => println!("Sub failed as expected: {err}"),
    }

    client.close().await?;
    let _ = server.await;
    Ok(())
}
