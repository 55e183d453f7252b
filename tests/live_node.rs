//! Live Node Integration Tests
//!
//! These tests require a WebSocket-enabled Ethereum node (e.g. Anvil) at
//! ws://127.0.0.1:8545. They are marked with #[ignore] for CI environments.
//!
//! To run them:
//! 1. Start Anvil: `anvil --port 8545`
//! 2. Run tests: `cargo test --test live_node -- --ignored`

use ethpush::{Engine, EngineConfig, EngineError, SubscriberState};

const NODE_WS_URL: &str = "ws://127.0.0.1:8545";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config() -> EngineConfig {
    EngineConfig {
        ws_url: NODE_WS_URL.to_string(),
        push_key: "test-key".to_string(),
        push_title: "Wallet Alert".to_string(),
        ..Default::default()
    }
}

// ==================== construction tests ====================

#[tokio::test]
async fn test_blank_endpoint_fails_without_a_node() {
    // Runs everywhere: validation fires before any dial.
    let result = Engine::new(EngineConfig::new("   ")).await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_engine_connects_and_defaults_chain_name() {
    let engine = Engine::new(config()).await.expect("node not reachable");
    assert_eq!(engine.chain_name(), "mainnet");
    assert!(!engine.is_running());
}

// ==================== lifecycle tests ====================

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_start_stream_stop() {
    init_tracing();
    let mut engine = Engine::new(config()).await.expect("node not reachable");

    engine.start().await.expect("subscription failed");
    assert!(engine.is_running());
    assert_eq!(engine.subscriber_state(), Some(SubscriberState::Streaming));

    engine.stop().await.expect("stop failed");
    assert!(!engine.is_running());
}

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_double_start_is_rejected() {
    let mut engine = Engine::new(config()).await.expect("node not reachable");

    engine.start().await.expect("subscription failed");
    assert!(matches!(
        engine.start().await,
        Err(EngineError::AlreadyRunning)
    ));

    engine.stop().await.expect("stop failed");
}

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_stop_without_start_is_rejected() {
    let mut engine = Engine::new(config()).await.expect("node not reachable");
    assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
}

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_restart_after_stop() {
    let mut engine = Engine::new(config()).await.expect("node not reachable");

    engine.start().await.expect("first start failed");
    engine.stop().await.expect("stop failed");
    engine.start().await.expect("second start failed");
    assert!(engine.is_running());
    engine.stop().await.expect("second stop failed");
}

#[tokio::test]
#[ignore = "requires a WS node at ws://127.0.0.1:8545"]
async fn test_pending_subscription_starts() {
    let mut cfg = config();
    cfg.enable_pending_tx = true;

    let mut engine = Engine::new(cfg).await.expect("node not reachable");
    engine.start().await.expect("pending subscription failed");
    assert_eq!(engine.subscriber_state(), Some(SubscriberState::Streaming));
    engine.stop().await.expect("stop failed");
}
