//! Push and pull through real relay pools against in-process relays.

mod common;

use clap::Parser;
use common::init_tracing;
use emperor::cli::{self, Cli};
use emperor::{
    EmperorConfig, EmperorError, Nip04Cipher, Payload, PublishOptions, PullOptions, Pulled,
    get_or_create_identity, publish, pull,
};
use nostr::Keys;
use nostr_client::{RelayConfig, RelayPool, TestRelay};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn relay_config() -> RelayConfig {
    RelayConfig {
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn publish_options() -> PublishOptions {
    PublishOptions {
        retry_backoff: Duration::from_millis(100),
        settle: Duration::from_millis(100),
    }
}

fn pull_options(output_dir: &Path) -> PullOptions {
    PullOptions {
        retry_backoff: Duration::from_millis(100),
        settle: Duration::from_millis(500),
        output_dir: output_dir.to_path_buf(),
    }
}

#[tokio::test]
async fn test_message_through_relay() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();
    let alice = Keys::generate();
    let bob = Keys::generate();
    let dir = tempfile::tempdir().unwrap();

    // A dead relay next to a live one must not matter.
    let endpoints = ["ws://127.0.0.1:1".to_string(), relay.url()];

    let session = RelayPool::open(&endpoints, relay_config()).await;
    let receipt = publish(
        &session,
        &alice,
        &Nip04Cipher,
        bob.public_key(),
        &Payload::Message(serde_json::json!({"hello": "world"})),
        &publish_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(session.connected_count(), 0);
    assert_eq!(relay.stored_events().len(), 1);

    let session = RelayPool::open(&endpoints, relay_config()).await;
    let pulled = pull(
        &session,
        &bob,
        &Nip04Cipher,
        alice.public_key(),
        Some(&receipt.publish_id),
        &pull_options(dir.path()),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        pulled,
        Pulled::Message {
            publish_id: receipt.publish_id,
            text: r#"{"hello":"world"}"#.to_string(),
        }
    );
}

#[tokio::test]
async fn test_file_through_relay() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();
    let alice = Keys::generate();
    let bob = Keys::generate();
    let dir = tempfile::tempdir().unwrap();
    let bytes = b"0123456789".to_vec();

    let session = RelayPool::open([relay.url()], relay_config()).await;
    let receipt = publish(
        &session,
        &alice,
        &Nip04Cipher,
        bob.public_key(),
        &Payload::File(bytes.clone()),
        &publish_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let session = RelayPool::open([relay.url()], relay_config()).await;
    let pulled = pull(
        &session,
        &bob,
        &Nip04Cipher,
        alice.public_key(),
        Some(&receipt.publish_id),
        &pull_options(dir.path()),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let Pulled::File { path, size, .. } = pulled else {
        panic!("expected a file, got {:?}", pulled);
    };
    assert_eq!(size, bytes.len());
    assert_eq!(std::fs::read(path).unwrap(), bytes);
}

#[tokio::test]
async fn test_wrong_recipient_finds_nothing() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();
    let alice = Keys::generate();
    let bob = Keys::generate();
    let eve = Keys::generate();
    let dir = tempfile::tempdir().unwrap();

    let session = RelayPool::open([relay.url()], relay_config()).await;
    let receipt = publish(
        &session,
        &alice,
        &Nip04Cipher,
        bob.public_key(),
        &Payload::File(vec![7; 64]),
        &publish_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let session = RelayPool::open([relay.url()], relay_config()).await;
    let result = pull(
        &session,
        &eve,
        &Nip04Cipher,
        alice.public_key(),
        Some(&receipt.publish_id),
        &pull_options(dir.path()),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(EmperorError::NotFound { .. })));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cli_push_and_pull() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();
    let home = tempfile::tempdir().unwrap();

    let config_path = home.path().join("config.toml");
    EmperorConfig {
        relays: vec![relay.url()],
        retry_backoff_ms: 100,
        publish_settle_secs: 1,
        subscribe_settle_secs: 1,
        data_dir: Some(home.path().join("data")),
        download_dir: Some(home.path().join("downloads")),
        ..Default::default()
    }
    .save(&config_path)
    .unwrap();

    let config_arg = config_path.to_string_lossy().into_owned();
    let run = |args: &[&str]| {
        let mut argv = vec!["emperor".to_string(), "--config".to_string(), config_arg.clone()];
        argv.extend(args.iter().map(|arg| arg.to_string()));
        cli::run(Cli::try_parse_from(argv).unwrap(), CancellationToken::new())
    };

    run(&["whoami"]).await.unwrap();
    let keyfile = home.path().join("data").join(emperor::KEYFILE_NAME);
    let me = get_or_create_identity(&keyfile).unwrap();

    // Send to ourselves, then look the envelope up on the relay.
    let to = me.npub().unwrap();
    run(&["push", "--to", to.as_str(), "--message", "note to self"])
        .await
        .unwrap();
    let stored = relay.stored_events();
    assert_eq!(stored.len(), 1);

    let from = me.public_key_hex();
    run(&["pull", "--id", stored[0].id.as_str(), "--from", from.as_str()])
        .await
        .unwrap();

    let shouted = format!(" {} ", stored[0].id.to_uppercase());
    run(&["pull", "--id", shouted.as_str(), "--from", from.as_str()])
        .await
        .unwrap();

    let err = run(&["pull", "--id", "not-an-id", "--from", from.as_str()])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EmperorError>(),
        Some(EmperorError::InvalidPublishId(_))
    ));

    let unknown = "ab".repeat(32);
    assert!(
        run(&["pull", "--id", unknown.as_str(), "--from", from.as_str()])
            .await
            .is_err()
    );
}

/// Accepts TCP connections but never answers the websocket handshake.
async fn silent_listener() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (url, task)
}

#[tokio::test]
async fn test_cli_cancel_while_connecting() {
    init_tracing();
    let (url, listener) = silent_listener().await;
    let home = tempfile::tempdir().unwrap();

    let config_path = home.path().join("config.toml");
    EmperorConfig {
        relays: vec![url],
        connect_timeout_secs: 4,
        data_dir: Some(home.path().join("data")),
        ..Default::default()
    }
    .save(&config_path)
    .unwrap();
    let config_arg = config_path.to_string_lossy().into_owned();
    let to = Keys::generate().npub().unwrap();

    let cli = Cli::try_parse_from([
        "emperor",
        "--config",
        config_arg.as_str(),
        "push",
        "--to",
        to.as_str(),
        "--message",
        "hi",
    ])
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = cli::run(cli, cancel).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err.downcast_ref::<EmperorError>(),
        Some(EmperorError::Cancelled)
    ));
    listener.abort();
}
