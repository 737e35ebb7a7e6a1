//! Two tether peers in one process, talking over a real localhost socket.
//!
//! The "server" peer publishes `add` and `describe`; the "client" peer
//! publishes `whoami` so the server can call back. Either side can call the
//! other — a channel has no fixed client/server role.

use anyhow::Result;
use argh::FromArgs;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use tether_channel::{Channel, FunctionDef, Sendable};
use tether_common::transport::TcpTransport;

#[derive(FromArgs)]
/// Run a pair of tether peers over a localhost TCP socket.
struct Args {
    /// address to bind the listening peer to
    #[argh(option, short = 'b', default = "\"127.0.0.1:0\".into()")]
    bind: String,
}

fn server_functions() -> Vec<FunctionDef> {
    vec![
        FunctionDef::new(
            "add",
            vec![Sendable::Number, Sendable::Number],
            Sendable::Number,
            |args: Vec<Value>| async move {
                let a = args[0].as_f64().unwrap_or(0.0);
                let b = args[1].as_f64().unwrap_or(0.0);
                Ok(Some(json!(a + b)))
            },
        ),
        FunctionDef::new(
            "describe",
            vec![Sendable::VariableArray {
                elem: Box::new(Sendable::Number),
            }],
            Sendable::String,
            |args: Vec<Value>| async move {
                let count = args[0].as_array().map(Vec::len).unwrap_or(0);
                Ok(Some(json!(format!("{count} numbers received"))))
            },
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Args = argh::from_env();

    let listener = TcpListener::bind(&args.bind).await?;
    let addr = listener.local_addr()?;
    tracing::info!("listening peer bound to {}", addr);

    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("accepted peer from {}", peer);
        let channel = Channel::open_with(TcpTransport::from_stream(stream), server_functions())?;

        // Call back into the connecting peer.
        let name = channel.call("whoami", vec![]).await?;
        println!("server learned the peer is {}", name);
        anyhow::Ok(channel)
    });

    let transport = TcpTransport::connect(&addr.to_string()).await?;
    let client = Channel::open_with(
        transport,
        vec![FunctionDef::new(
            "whoami",
            vec![],
            Sendable::String,
            |_args: Vec<Value>| async { Ok(Some(json!("calc-pair client"))) },
        )],
    )?;

    let sum = client.call("add", vec![json!(19), json!(23)]).await?;
    println!("add(19, 23) = {}", sum);

    let described = client
        .call("describe", vec![json!([1, 2, 3, 5, 8])])
        .await?;
    println!("describe([1,2,3,5,8]) = {}", described);

    let server_channel = server.await??;
    server_channel.close();
    client.close();

    Ok(())
}
