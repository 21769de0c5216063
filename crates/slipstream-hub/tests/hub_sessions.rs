//! Integration tests for the hub: handshake, membership, fan-out, and
//! ownership-checked persistence.
//!
//! Connections are faked with the hub's own outbound channels, the way
//! a real connection's writer task would hold them. Every send the hub
//! performs is a non-blocking enqueue, so after an awaited
//! `handle_message` the queues are fully settled and `try_recv` is
//! deterministic.

use slipstream_credential::{Claims, CredentialService, Keypair};
use slipstream_hub::{Hub, HubConfig, Outcome, OutboundFrame, OutboundReceiver};
use slipstream_protocol::{CloseCode, RecordKind};
use slipstream_store::{MemoryStore, OwnershipPolicy, StateRepository, StoreError};
use slipstream_transport::ConnectionId;

const ISSUER: &str = "slipstream-test";
const KEY_SEED: [u8; 32] = [42u8; 32];

// =========================================================================
// Harness
// =========================================================================

fn credentials() -> CredentialService {
    CredentialService::new(Keypair::from_seed(KEY_SEED), ISSUER)
}

fn hub() -> Hub<MemoryStore> {
    hub_with_config(HubConfig::default())
}

fn hub_with_config(config: HubConfig) -> Hub<MemoryStore> {
    Hub::new(
        credentials(),
        StateRepository::new(MemoryStore::new()),
        OwnershipPolicy::default(),
        config,
    )
}

/// One fake client: the hub-side connection id plus the receiving half
/// of its outbound queue.
struct TestClient {
    id: ConnectionId,
    rx: OutboundReceiver,
}

async fn connect(hub: &Hub<MemoryStore>) -> TestClient {
    let (tx, rx) = hub.outbound_channel();
    let id = hub.register(tx).await;
    TestClient { id, rx }
}

fn token_for(username: &str, room: &str, callsign: &str) -> String {
    credentials()
        .sign(&Claims::login(username, room, callsign))
        .expect("test claims should sign")
}

fn hello_frame(token: &str) -> Vec<u8> {
    format!(r#"{{"type":"hello","token":"{token}"}}"#).into_bytes()
}

/// Registers, hellos, and asserts success.
async fn join(
    hub: &Hub<MemoryStore>,
    username: &str,
    room: &str,
    callsign: &str,
) -> TestClient {
    let client = connect(hub).await;
    let frame = hello_frame(&token_for(username, room, callsign));
    let outcome = hub.handle_message(client.id, &frame).await;
    assert!(
        matches!(outcome, Outcome::Continue),
        "hello for {username} should succeed, got {outcome:?}"
    );
    client
}

/// Pops the next queued frame, if any.
fn next_frame(client: &mut TestClient) -> Option<OutboundFrame> {
    client.rx.try_recv().ok()
}

/// Pops the next frame and parses it as a JSON data frame.
fn next_json(client: &mut TestClient) -> serde_json::Value {
    match next_frame(client) {
        Some(OutboundFrame::Data(bytes)) => {
            serde_json::from_slice(&bytes).expect("frame should be JSON")
        }
        other => panic!("expected a data frame, got {other:?}"),
    }
}

/// Asserts nothing is queued for this client.
fn assert_silent(client: &mut TestClient) {
    if let Ok(frame) = client.rx.try_recv() {
        panic!("expected no frame for {}, got {frame:?}", client.id);
    }
}

/// Drains data frames until a close frame appears, and asserts its code.
fn expect_close(client: &mut TestClient, code: CloseCode) {
    loop {
        match client.rx.try_recv() {
            Ok(OutboundFrame::Data(_)) => continue,
            Ok(OutboundFrame::Close { code: got, .. }) => {
                assert_eq!(got, code, "unexpected close code");
                return;
            }
            Err(_) => panic!("expected a close frame for {}", client.id),
        }
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_first_member_join_announces_to_nobody() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;

    // Room was empty: the add event had zero recipients.
    assert_silent(&mut alice);
    assert_eq!(hub.room_members("Sundowners").await, vec![alice.id]);
}

#[tokio::test]
async fn test_join_announces_add_to_existing_members_only() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;

    let event = next_json(&mut alice);
    assert_eq!(event["type"], "add");
    assert_eq!(event["room"], "Sundowners");
    assert_eq!(event["callsign"], "PH-XYZ");

    // The joiner itself receives nothing.
    assert_silent(&mut bob);
}

#[tokio::test]
async fn test_join_opens_session_record_once() {
    let hub = hub();
    assert!(!hub.repository().session_exists("Sundowners").await.unwrap());

    let _alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    assert!(hub.repository().session_exists("Sundowners").await.unwrap());

    let _bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    assert!(hub.repository().session_exists("Sundowners").await.unwrap());
}

#[tokio::test]
async fn test_hello_binds_claims_to_connection() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;

    let claims = hub.claims_of(alice.id).await.expect("should be bound");
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.room, "Sundowners");
    assert_eq!(claims.callsign, "PH-ABC");
}

#[tokio::test]
async fn test_hello_with_foreign_key_closes_before_any_membership() {
    let hub = hub();
    let mut intruder = connect(&hub).await;

    // Signed by an unrelated key: verification must fail.
    let stranger =
        CredentialService::new(Keypair::from_seed([99u8; 32]), ISSUER);
    let forged = stranger
        .sign(&Claims::login("mallory", "Sundowners", "PH-EVIL"))
        .unwrap();

    let outcome = hub
        .handle_message(intruder.id, &hello_frame(&forged))
        .await;

    assert!(matches!(outcome, Outcome::Closed));
    expect_close(&mut intruder, CloseCode::CannotAccept);
    // No membership was ever recorded, no session record written.
    assert!(hub.room_members("Sundowners").await.is_empty());
    assert!(!hub.repository().session_exists("Sundowners").await.unwrap());
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_hello_without_token_closes_cannot_accept() {
    let hub = hub();
    let mut client = connect(&hub).await;

    let outcome = hub
        .handle_message(client.id, br#"{"type":"hello"}"#)
        .await;

    assert!(matches!(outcome, Outcome::Closed));
    expect_close(&mut client, CloseCode::CannotAccept);
}

#[tokio::test]
async fn test_second_hello_closes_protocol_error() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let _ = next_frame(&mut alice); // drain bob's add event

    let again = hello_frame(&token_for("alice", "Sundowners", "PH-ABC"));
    let outcome = hub.handle_message(alice.id, &again).await;

    assert!(matches!(outcome, Outcome::Closed));
    expect_close(&mut alice, CloseCode::ProtocolError);

    // The rest of the room learns about the departure.
    let event = next_json(&mut bob);
    assert_eq!(event["type"], "remove");
    assert_eq!(event["callsign"], "PH-ABC");
}

#[tokio::test]
async fn test_domain_message_before_hello_closes_protocol_error() {
    let hub = hub();
    let mut client = connect(&hub).await;

    let outcome = hub
        .handle_message(
            client.id,
            br#"{"type":"Location","latitude":52.3}"#,
        )
        .await;

    assert!(matches!(outcome, Outcome::Closed));
    expect_close(&mut client, CloseCode::ProtocolError);
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_message_without_type_closes_protocol_error() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;

    let outcome = hub
        .handle_message(alice.id, br#"{"latitude":52.3}"#)
        .await;

    assert!(matches!(outcome, Outcome::Closed));
    expect_close(&mut alice, CloseCode::ProtocolError);
    assert!(hub.room_members("Sundowners").await.is_empty());
}

// =========================================================================
// Ignorable messages
// =========================================================================

#[tokio::test]
async fn test_unknown_type_while_authenticated_is_ignored() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let _ = next_frame(&mut alice);

    let outcome = hub
        .handle_message(alice.id, br#"{"type":"Weather","wind":270}"#)
        .await;

    // No close, no broadcast, no membership change.
    assert!(matches!(outcome, Outcome::Continue));
    assert_silent(&mut alice);
    assert_silent(&mut bob);
    assert_eq!(hub.room_members("Sundowners").await.len(), 2);
    assert_eq!(hub.connection_count().await, 2);
}

#[tokio::test]
async fn test_client_sent_add_and_remove_are_ignored() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let _ = next_frame(&mut alice);

    // A client trying to fake membership events gets nowhere.
    for frame in [
        br#"{"type":"add","room":"Sundowners","callsign":"PH-FAKE"}"#.as_slice(),
        br#"{"type":"remove","room":"Sundowners","callsign":"PH-XYZ"}"#.as_slice(),
    ] {
        let outcome = hub.handle_message(alice.id, frame).await;
        assert!(matches!(outcome, Outcome::Continue));
    }

    assert_silent(&mut bob);
    assert_eq!(hub.room_members("Sundowners").await.len(), 2);
}

// =========================================================================
// Broadcast
// =========================================================================

#[tokio::test]
async fn test_broadcast_reaches_everyone_except_sender() {
    let hub = hub();
    let mut a = join(&hub, "alice", "Sundowners", "PH-A").await;
    let mut b = join(&hub, "bob", "Sundowners", "PH-B").await;
    let mut c = join(&hub, "carol", "Sundowners", "PH-C").await;
    // Drain join events.
    while next_frame(&mut a).is_some() {}
    while next_frame(&mut b).is_some() {}

    let frame = br#"{"type":"Location","latitude":52.3,"longitude":4.7}"#;
    let outcome = hub.handle_message(a.id, frame).await;
    assert!(matches!(outcome, Outcome::Continue));

    for peer in [&mut b, &mut c] {
        match next_frame(peer) {
            Some(OutboundFrame::Data(bytes)) => {
                assert_eq!(bytes, frame.to_vec(), "raw frame must pass verbatim");
            }
            other => panic!("expected the location frame, got {other:?}"),
        }
    }
    // The sender never receives its own echo.
    assert_silent(&mut a);
}

#[tokio::test]
async fn test_rooms_never_cross_deliver() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let mut carol = join(&hub, "carol", "Nightflyers", "PH-QQQ").await;

    // Joining different rooms produced no add events for either.
    assert_silent(&mut alice);
    assert_silent(&mut carol);

    let outcome = hub
        .handle_message(alice.id, br#"{"type":"Location","latitude":1.0}"#)
        .await;
    assert!(matches!(outcome, Outcome::Continue));

    assert_silent(&mut carol);
}

/// The full scenario from the session contract: alice joins an empty
/// room, bob joins and alice hears it, alice publishes a location and
/// only bob receives it, verbatim.
#[tokio::test]
async fn test_two_pilot_session_scenario() {
    let hub = hub();

    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    assert_silent(&mut alice); // room was empty

    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let event = next_json(&mut alice);
    assert_eq!(event["type"], "add");
    assert_eq!(event["room"], "Sundowners");
    assert_eq!(event["callsign"], "PH-XYZ");

    let location =
        br#"{"type":"Location","latitude":52.31,"longitude":4.76,"altitude":1200}"#;
    let outcome = hub.handle_message(alice.id, location).await;
    assert!(matches!(outcome, Outcome::Continue));

    match next_frame(&mut bob) {
        Some(OutboundFrame::Data(bytes)) => assert_eq!(bytes, location.to_vec()),
        other => panic!("expected location frame, got {other:?}"),
    }
    assert_silent(&mut alice);
}

// =========================================================================
// Ownership
// =========================================================================

#[tokio::test]
async fn test_aircraft_create_forces_owner_to_identity() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;

    // The client-supplied owner is overridden, not honored.
    let frame = br#"{"type":"Aircraft","model":"C172","owner":"mallory"}"#;
    let outcome = hub.handle_message(alice.id, frame).await;
    assert!(matches!(outcome, Outcome::Continue));

    let record = hub
        .repository()
        .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
        .await
        .unwrap()
        .expect("aircraft should be stored");
    assert_eq!(record.owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_stranger_cannot_mutate_owned_entity() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    // bob holds a credential for alice's callsign (say, a stale
    // reassignment) but is not the owner.
    let mut bob = join(&hub, "bob", "Sundowners", "PH-ABC").await;
    let outcome = hub
        .handle_message(bob.id, br#"{"type":"Aircraft","model":"B737"}"#)
        .await;

    assert!(matches!(
        outcome,
        Outcome::Rejected(StoreError::NotAuthorized(_))
    ));
    // The connection survives a rejected operation.
    assert_eq!(hub.connection_count().await, 2);
    assert_silent(&mut bob);

    // The stored record is unchanged.
    let record = hub
        .repository()
        .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.body["model"], "C172");
    assert_eq!(record.owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_stranger_subsystem_update_is_rejected_too() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    let bob = join(&hub, "bob", "Sundowners", "PH-ABC").await;
    let outcome = hub
        .handle_message(bob.id, br#"{"type":"Engines","rpm":2400}"#)
        .await;

    assert!(matches!(
        outcome,
        Outcome::Rejected(StoreError::NotAuthorized(_))
    ));
    assert!(
        hub.repository()
            .get(RecordKind::Engines, "Sundowners", "PH-ABC")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_admin_may_mutate_any_record() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    let admin = join(&hub, "admin", "Sundowners", "PH-ABC").await;
    let outcome = hub
        .handle_message(admin.id, br#"{"type":"Aircraft","model":"C182"}"#)
        .await;
    assert!(matches!(outcome, Outcome::Continue));

    let record = hub
        .repository()
        .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.body["model"], "C182");
    // Ownership itself did not move.
    assert_eq!(record.owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_changing_callsign_in_update_is_bad_request() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    let outcome = hub
        .handle_message(
            alice.id,
            br#"{"type":"Aircraft","callsign":"PH-NEW","model":"C172"}"#,
        )
        .await;

    assert!(matches!(
        outcome,
        Outcome::Rejected(StoreError::BadRequest(_))
    ));
    assert_eq!(hub.connection_count().await, 1);
}

#[tokio::test]
async fn test_changing_owner_in_update_is_bad_request() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    let outcome = hub
        .handle_message(
            alice.id,
            br#"{"type":"Aircraft","owner":"bob","model":"C172"}"#,
        )
        .await;

    assert!(matches!(
        outcome,
        Outcome::Rejected(StoreError::BadRequest(_))
    ));
    let record = hub
        .repository()
        .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_rejected_update_does_not_broadcast() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;

    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let carol = join(&hub, "carol", "Sundowners", "PH-ABC").await;
    let _ = bob.rx.try_recv(); // drain carol's add event if any

    let outcome = hub
        .handle_message(carol.id, br#"{"type":"Engines","rpm":2400}"#)
        .await;
    assert!(matches!(outcome, Outcome::Rejected(_)));

    assert_silent(&mut bob);
}

// =========================================================================
// Departure
// =========================================================================

#[tokio::test]
async fn test_unregister_announces_remove_and_cleans_records() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.handle_message(alice.id, br#"{"type":"Aircraft","model":"C172"}"#)
        .await;
    hub.handle_message(alice.id, br#"{"type":"Location","latitude":52.3}"#)
        .await;

    let mut bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    while bob.rx.try_recv().is_ok() {}

    hub.unregister(alice.id).await;

    let event = next_json(&mut bob);
    assert_eq!(event["type"], "remove");
    assert_eq!(event["room"], "Sundowners");
    assert_eq!(event["callsign"], "PH-ABC");

    // Every record of the departed entity is gone.
    for kind in RecordKind::ALL {
        assert!(
            hub.repository()
                .get(kind, "Sundowners", "PH-ABC")
                .await
                .unwrap()
                .is_none(),
            "{kind} record should be deleted on departure"
        );
    }
    // The room still has a member, so its session record stays.
    assert!(hub.repository().session_exists("Sundowners").await.unwrap());
    assert_eq!(hub.room_members("Sundowners").await, vec![bob.id]);
}

#[tokio::test]
async fn test_last_leave_closes_session_record() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;

    hub.unregister(alice.id).await;
    assert!(hub.repository().session_exists("Sundowners").await.unwrap());

    hub.unregister(bob.id).await;
    assert!(!hub.repository().session_exists("Sundowners").await.unwrap());
    assert!(hub.room_members("Sundowners").await.is_empty());
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;

    hub.unregister(alice.id).await;
    hub.unregister(alice.id).await; // second call is a no-op

    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_message_after_removal_reports_closed() {
    let hub = hub();
    let alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    hub.unregister(alice.id).await;

    let outcome = hub
        .handle_message(alice.id, br#"{"type":"Location","latitude":1.0}"#)
        .await;
    assert!(matches!(outcome, Outcome::Closed));
}

#[tokio::test]
async fn test_unregister_of_unauthenticated_connection_is_silent() {
    let hub = hub();
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let quiet = connect(&hub).await; // never sends hello

    hub.unregister(quiet.id).await;

    // No remove event for a connection that never joined a room.
    assert_silent(&mut alice);
    assert_eq!(hub.connection_count().await, 1);
}

// =========================================================================
// Slow consumers
// =========================================================================

#[tokio::test]
async fn test_full_outbound_queue_drops_only_that_recipient() {
    let hub = hub_with_config(HubConfig { outbound_queue: 2 });
    let mut alice = join(&hub, "alice", "Sundowners", "PH-ABC").await;
    let bob = join(&hub, "bob", "Sundowners", "PH-XYZ").await;
    let _ = alice.rx.try_recv(); // drain bob's add event

    // bob never drains his queue; two updates fill it.
    for _ in 0..2 {
        let outcome = hub
            .handle_message(alice.id, br#"{"type":"Location","latitude":1.0}"#)
            .await;
        assert!(matches!(outcome, Outcome::Continue));
    }

    // The third enqueue fails, which is bob's disconnect, not alice's
    // problem.
    let outcome = hub
        .handle_message(alice.id, br#"{"type":"Location","latitude":2.0}"#)
        .await;
    assert!(matches!(outcome, Outcome::Continue));

    assert_eq!(hub.room_members("Sundowners").await, vec![alice.id]);
    assert!(hub.claims_of(bob.id).await.is_none());

    // alice hears that bob is gone.
    let event = next_json(&mut alice);
    assert_eq!(event["type"], "remove");
    assert_eq!(event["callsign"], "PH-XYZ");
}
