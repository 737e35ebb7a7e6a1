//! End-to-end channel tests over in-process transports.
//!
//! Two styles: real channel pairs (both ends are engines) and scripted
//! peers (one end is an engine, the test drives the raw transport and
//! asserts on the exact wire traffic).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use tether_channel::{CallError, Channel, FunctionDef, Sendable, TetherError};
use tether_common::protocol::WireMessage;
use tether_common::transport::{memory, Transport};

fn channel_pair() -> (Channel, Channel) {
    let (left, right) = memory::pair();
    (Channel::open(left), Channel::open(right))
}

fn add_def() -> FunctionDef {
    FunctionDef::new(
        "add",
        vec![Sendable::Number, Sendable::Number],
        Sendable::Number,
        |args: Vec<Value>| async move {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            Ok(Some(json!(a + b)))
        },
    )
}

async fn recv_wire(wire: &mut mpsc::UnboundedReceiver<WireMessage>) -> WireMessage {
    timeout(Duration::from_secs(1), wire.recv())
        .await
        .expect("timed out waiting for a wire message")
        .expect("transport ended unexpectedly")
}

async fn assert_no_wire(wire: &mut mpsc::UnboundedReceiver<WireMessage>) {
    let quiet = timeout(Duration::from_millis(100), wire.recv()).await;
    assert!(quiet.is_err(), "unexpected wire message: {:?}", quiet);
}

// ============================================================================
// Round trips over a real pair
// ============================================================================

#[tokio::test]
async fn test_publish_then_call_round_trip() {
    let (caller, server) = channel_pair();
    server.publish(add_def()).unwrap();

    let sum = caller.call("add", vec![json!(3), json!(5)]).await.unwrap();
    assert_eq!(sum, json!(8));
}

#[tokio::test]
async fn test_call_before_publish_suspends_until_published() {
    let (caller, server) = channel_pair();

    let pending = tokio::spawn({
        let caller = caller.clone();
        async move { caller.call("add", vec![json!(2), json!(4)]).await }
    });

    // The call is queued behind the expectation; publishing releases it.
    sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());

    server.publish(add_def()).unwrap();
    assert_eq!(pending.await.unwrap().unwrap(), json!(6));
}

#[tokio::test]
async fn test_invalid_arguments_never_invoke_implementation() {
    let (caller, server) = channel_pair();

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    server
        .publish(FunctionDef::new(
            "tick",
            vec![],
            Sendable::None,
            move |_args: Vec<Value>| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            },
        ))
        .unwrap();

    // One argument against a zero-argument signature.
    let err = caller.call("tick", vec![json!(1)]).await.unwrap_err();
    assert_eq!(err, CallError::Remote("Invalid Arguments".into()));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    // The correct arity goes through.
    let value = caller.call("tick", vec![]).await.unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mistyped_argument_rejected() {
    let (caller, server) = channel_pair();
    server.publish(add_def()).unwrap();

    let err = caller
        .call("add", vec![json!("three"), json!(5)])
        .await
        .unwrap_err();
    assert_eq!(err, CallError::Remote("Invalid Arguments".into()));
}

#[tokio::test]
async fn test_invalid_return_rejected_on_caller_only() {
    let (caller, server) = channel_pair();

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    server
        .publish(FunctionDef::new(
            "shout",
            vec![],
            Sendable::String,
            // Typed to return a string but completes void.
            move |_args: Vec<Value>| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            },
        ))
        .unwrap();

    let err = caller.call("shout", vec![]).await.unwrap_err();
    assert_eq!(err, CallError::InvalidReturn("shout".into()));
    assert_eq!(err.to_string(), "invalid return value from rpc shout");

    // The implementation completed normally and is never informed.
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(server.is_open());
}

#[tokio::test]
async fn test_remote_exception_surfaces_textually() {
    let (caller, server) = channel_pair();
    server
        .publish(FunctionDef::new(
            "boom",
            vec![],
            Sendable::None,
            |_args: Vec<Value>| async { Err(anyhow::anyhow!("kaput")) },
        ))
        .unwrap();

    let err = caller.call("boom", vec![]).await.unwrap_err();
    assert_eq!(err, CallError::Remote("Exception: kaput".into()));
}

#[tokio::test]
async fn test_duplicate_publication_is_an_error() {
    let (_caller, server) = channel_pair();
    server.publish(add_def()).unwrap();

    let err = server.publish(add_def()).unwrap_err();
    assert!(matches!(err, TetherError::DuplicatePublication(name) if name == "add"));
}

#[tokio::test]
async fn test_open_with_initial_publications() {
    let (left, right) = memory::pair();
    let caller = Channel::open(left);
    let _server = Channel::open_with(right, vec![add_def()]).unwrap();

    let sum = caller.call("add", vec![json!(20), json!(22)]).await.unwrap();
    assert_eq!(sum, json!(42));
}

#[tokio::test]
async fn test_remote_function_handle() {
    let (caller, server) = channel_pair();
    server.publish(add_def()).unwrap();

    let add = caller.remote("add");
    assert_eq!(add.name(), "add");
    assert_eq!(add.call(vec![json!(1), json!(2)]).await.unwrap(), json!(3));
    assert_eq!(add.call(vec![json!(3), json!(4)]).await.unwrap(), json!(7));
}

// ============================================================================
// Wire-level behavior against a scripted peer
// ============================================================================

#[tokio::test]
async fn test_expect_negotiation_and_single_expect_per_name() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    let first = tokio::spawn({
        let channel = channel.clone();
        async move { channel.call("add", vec![json!(1), json!(2)]).await }
    });

    // The unknown name produces an expect, and nothing else until the
    // publication arrives.
    assert_eq!(recv_wire(&mut wire).await, WireMessage::Expect { name: "add".into() });
    assert_no_wire(&mut wire).await;

    right
        .send(WireMessage::Publish {
            name: "add".into(),
            args: vec![Sendable::Number, Sendable::Number],
            returns: Sendable::Number,
        })
        .unwrap();

    let WireMessage::Call { nonce, name, args } = recv_wire(&mut wire).await else {
        panic!("expected a call after publish");
    };
    assert_eq!(name, "add");
    assert_eq!(args, vec![json!(1), json!(2)]);
    assert_eq!(nonce, 1);

    right
        .send(WireMessage::Result {
            nonce,
            value: json!(3),
        })
        .unwrap();
    assert_eq!(first.await.unwrap().unwrap(), json!(3));

    // The name is known now: a second call emits no further expect.
    let second = tokio::spawn({
        let channel = channel.clone();
        async move { channel.call("add", vec![json!(4), json!(5)]).await }
    });
    let WireMessage::Call { nonce, name, .. } = recv_wire(&mut wire).await else {
        panic!("expected a direct call for a known name");
    };
    assert_eq!(name, "add");
    assert_eq!(nonce, 2);

    right
        .send(WireMessage::Result {
            nonce,
            value: json!(9),
        })
        .unwrap();
    assert_eq!(second.await.unwrap().unwrap(), json!(9));
}

#[tokio::test]
async fn test_queued_callers_share_one_expect_and_all_release() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            tokio::spawn({
                let channel = channel.clone();
                async move { channel.call("f", vec![json!(i)]).await }
            })
        })
        .collect();

    // Exactly one expect for the three queued callers.
    assert_eq!(recv_wire(&mut wire).await, WireMessage::Expect { name: "f".into() });
    assert_no_wire(&mut wire).await;

    right
        .send(WireMessage::Publish {
            name: "f".into(),
            args: vec![Sendable::Number],
            returns: Sendable::Number,
        })
        .unwrap();

    // All three proceed to the call phase; echo each argument back.
    for _ in 0..3 {
        let WireMessage::Call { nonce, args, .. } = recv_wire(&mut wire).await else {
            panic!("expected a call");
        };
        right
            .send(WireMessage::Result {
                nonce,
                value: args[0].clone(),
            })
            .unwrap();
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), json!(i));
    }
}

#[tokio::test]
async fn test_out_of_order_completion_integrity() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    let tasks: Vec<_> = (1..=4)
        .map(|i| {
            tokio::spawn({
                let channel = channel.clone();
                async move { (i, channel.call("echo", vec![json!(i)]).await) }
            })
        })
        .collect();

    assert_eq!(recv_wire(&mut wire).await, WireMessage::Expect { name: "echo".into() });
    right
        .send(WireMessage::Publish {
            name: "echo".into(),
            args: vec![Sendable::Number],
            returns: Sendable::Number,
        })
        .unwrap();

    let mut calls = Vec::new();
    for _ in 0..4 {
        let WireMessage::Call { nonce, args, .. } = recv_wire(&mut wire).await else {
            panic!("expected a call");
        };
        calls.push((nonce, args[0].as_i64().unwrap()));
    }

    // Nonces are fresh and monotonically assigned starting at 1.
    let mut nonces: Vec<_> = calls.iter().map(|(nonce, _)| *nonce).collect();
    nonces.sort_unstable();
    assert_eq!(nonces, vec![1, 2, 3, 4]);

    // Complete in reverse order; each caller must get its own answer.
    for (nonce, arg) in calls.iter().rev() {
        right
            .send(WireMessage::Result {
                nonce: *nonce,
                value: json!(arg * 10),
            })
            .unwrap();
    }

    for task in tasks {
        let (i, result) = task.await.unwrap();
        assert_eq!(result.unwrap(), json!(i * 10));
    }
}

#[tokio::test]
async fn test_call_to_unpublished_function_rejected() {
    let (left, mut right) = memory::pair();
    let _channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    right
        .send(WireMessage::Call {
            nonce: 9,
            name: "missing".into(),
            args: vec![],
        })
        .unwrap();

    assert_eq!(
        recv_wire(&mut wire).await,
        WireMessage::Error {
            nonce: 9,
            message: "Unpublished Function: missing".into(),
        }
    );
}

#[tokio::test]
async fn test_expect_for_published_name_reannounces() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    channel.publish(add_def()).unwrap();
    let announcement = recv_wire(&mut wire).await;
    assert_eq!(announcement.kind(), "publish");

    // A racing peer asks again; the same announcement is re-emitted.
    right.send(WireMessage::Expect { name: "add".into() }).unwrap();
    assert_eq!(recv_wire(&mut wire).await, announcement);
}

#[tokio::test]
async fn test_expect_for_unknown_name_is_silent() {
    let (left, mut right) = memory::pair();
    let _channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    right.send(WireMessage::Expect { name: "nope".into() }).unwrap();
    assert_no_wire(&mut wire).await;
}

#[tokio::test]
async fn test_duplicate_inbound_publish_first_wins() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    // First announcement types the result as Number; the conflicting second
    // one is ignored without an error message.
    right
        .send(WireMessage::Publish {
            name: "f".into(),
            args: vec![],
            returns: Sendable::Number,
        })
        .unwrap();
    right
        .send(WireMessage::Publish {
            name: "f".into(),
            args: vec![],
            returns: Sendable::String,
        })
        .unwrap();

    let task = tokio::spawn({
        let channel = channel.clone();
        async move { channel.call("f", vec![]).await }
    });
    let WireMessage::Call { nonce, .. } = recv_wire(&mut wire).await else {
        panic!("expected a call");
    };
    right
        .send(WireMessage::Result {
            nonce,
            value: json!(5),
        })
        .unwrap();

    // 5 validates against the first announcement's Number, not the
    // second's String.
    assert_eq!(task.await.unwrap().unwrap(), json!(5));
    assert_no_wire(&mut wire).await;
}

#[tokio::test]
async fn test_unknown_nonce_completions_discarded() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    right
        .send(WireMessage::Result {
            nonce: 77,
            value: json!(1),
        })
        .unwrap();
    right
        .send(WireMessage::Error {
            nonce: 78,
            message: "stale".into(),
        })
        .unwrap();

    // Logged and discarded; the channel keeps working.
    channel.publish(add_def()).unwrap();
    assert_eq!(recv_wire(&mut wire).await.kind(), "publish");
    assert!(channel.is_open());
}

// ============================================================================
// Close semantics
// ============================================================================

#[tokio::test]
async fn test_close_fails_all_pending_calls() {
    let (caller, server) = channel_pair();
    server
        .publish(FunctionDef::new(
            "stall",
            vec![Sendable::Number],
            Sendable::Number,
            |_args: Vec<Value>| async {
                std::future::pending::<()>().await;
                Ok(None)
            },
        ))
        .unwrap();

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            tokio::spawn({
                let caller = caller.clone();
                async move { caller.call("stall", vec![json!(i)]).await }
            })
        })
        .collect();
    sleep(Duration::from_millis(50)).await;

    caller.close();
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, CallError::Closed);
        assert_eq!(err.to_string(), "Connection Closed");
    }

    assert!(!caller.is_open());
    assert_eq!(
        caller.call("stall", vec![json!(0)]).await.unwrap_err(),
        CallError::Closed
    );
    assert!(matches!(
        caller.publish(add_def()),
        Err(TetherError::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_close_releases_expectation_waiters() {
    let (caller, _server) = channel_pair();

    let pending = tokio::spawn({
        let caller = caller.clone();
        async move { caller.call("never_published", vec![]).await }
    });
    sleep(Duration::from_millis(50)).await;

    caller.close();
    assert_eq!(pending.await.unwrap().unwrap_err(), CallError::Closed);
}

#[tokio::test]
async fn test_completions_after_close_are_not_processed() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    let pending = tokio::spawn({
        let channel = channel.clone();
        async move { channel.call("f", vec![]).await }
    });
    assert_eq!(recv_wire(&mut wire).await, WireMessage::Expect { name: "f".into() });
    right
        .send(WireMessage::Publish {
            name: "f".into(),
            args: vec![],
            returns: Sendable::Number,
        })
        .unwrap();
    let WireMessage::Call { nonce, .. } = recv_wire(&mut wire).await else {
        panic!("expected a call");
    };

    channel.close();
    assert_eq!(pending.await.unwrap().unwrap_err(), CallError::Closed);

    // A straggling result changes nothing.
    right
        .send(WireMessage::Result {
            nonce,
            value: json!(1),
        })
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(!channel.is_open());
}

#[tokio::test]
async fn test_serving_side_drops_results_after_close() {
    let (left, mut right) = memory::pair();
    let channel = Channel::open(left);
    let mut wire = right.subscribe_inbound();

    let gate = Arc::new(tokio::sync::Notify::new());
    let release = Arc::clone(&gate);
    channel
        .publish(FunctionDef::new(
            "gated",
            vec![],
            Sendable::None,
            move |_args: Vec<Value>| {
                let gate = Arc::clone(&release);
                async move {
                    gate.notified().await;
                    Ok(None)
                }
            },
        ))
        .unwrap();
    assert_eq!(recv_wire(&mut wire).await.kind(), "publish");

    right
        .send(WireMessage::Call {
            nonce: 1,
            name: "gated".into(),
            args: vec![],
        })
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    // The implementation completes only after the channel has closed; its
    // result never reaches the wire.
    channel.close();
    gate.notify_one();
    assert_no_wire(&mut wire).await;
}

#[tokio::test]
async fn test_transport_drop_closes_channel() {
    let (left, right) = memory::pair();
    let channel = Channel::open(left);

    let pending = tokio::spawn({
        let channel = channel.clone();
        async move { channel.call("f", vec![]).await }
    });
    sleep(Duration::from_millis(50)).await;

    // The peer endpoint going away ends the inbound stream, which the
    // engine treats as the close notification.
    drop(right);
    assert_eq!(pending.await.unwrap().unwrap_err(), CallError::Closed);
    assert!(!channel.is_open());
}
