//! Integration tests for the IMAP client.
//!
//! These tests replay scripted server conversations over a mock stream
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tessera_imap::connection::{BoxFuture, BoxedIo, OnceConnector};
use tessera_imap::parser::{Address, BodyStructure, FetchItem, PartKind};
use tessera_imap::{
    Client, CollectingHandler, Config, Error, Event, FetchAttribute, FetchItems,
    FileLiteralFactory, Literal, Response, ResponseParser, Security, SessionState,
    StreamUpgrader, UntaggedResponse,
};
use tessera_sasl::{Qop, SaslClient};
use tokio_test::io::{Builder, Mock};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber; `RUST_LOG=tessera_imap::wire=trace` shows the exchange.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(security: Security) -> Config {
    Config::builder("imap.example.com").security(security).build()
}

fn client_over(mock: Mock) -> Client<CollectingHandler> {
    init_tracing();
    Client::builder(config(Security::None))
        .handler(CollectingHandler::new())
        .connector(OnceConnector::new(mock))
        .build()
}

/// Stands in for TLS: hands the stream back unchanged and counts upgrades.
#[derive(Clone, Default)]
struct PassthroughUpgrader {
    upgrades: Arc<AtomicUsize>,
}

impl StreamUpgrader for PassthroughUpgrader {
    fn upgrade<'a>(
        &'a self,
        stream: BoxedIo,
        host: &'a str,
    ) -> BoxFuture<'a, tessera_imap::Result<BoxedIo>> {
        assert_eq!(host, "imap.example.com");
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(stream) })
    }
}

/// Mechanism that cannot answer any challenge.
struct Refusing;

impl SaslClient for Refusing {
    fn mechanism(&self) -> &'static str {
        "X-REFUSE"
    }
    fn has_initial_response(&self) -> bool {
        false
    }
    fn evaluate_challenge(&mut self, _challenge: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
        Err(tessera_sasl::Error::InvalidChallenge {
            mechanism: "X-REFUSE",
            reason: "never satisfied".to_string(),
        })
    }
    fn is_complete(&self) -> bool {
        false
    }
}

/// Mechanism negotiating an integrity layer that XORs every byte.
struct XorIntegrity {
    done: bool,
}

impl SaslClient for XorIntegrity {
    fn mechanism(&self) -> &'static str {
        "X-XOR"
    }
    fn has_initial_response(&self) -> bool {
        false
    }
    fn evaluate_challenge(&mut self, _challenge: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
        self.done = true;
        Ok(b"ok".to_vec())
    }
    fn is_complete(&self) -> bool {
        self.done
    }
    fn qop(&self) -> Qop {
        Qop::AuthInt
    }
    fn wrap(&mut self, data: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
        Ok(data.iter().map(|b| b ^ 0x2A).collect())
    }
    fn unwrap(&mut self, data: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
        Ok(data.iter().map(|b| b ^ 0x2A).collect())
    }
}

fn xor_frame(plain: &[u8]) -> Vec<u8> {
    let mut frame = u32::try_from(plain.len()).unwrap().to_be_bytes().to_vec();
    frame.extend(plain.iter().map(|b| b ^ 0x2A));
    frame
}

fn data_events(client: &mut Client<CollectingHandler>) -> Vec<Event> {
    client
        .handler_mut()
        .take()
        .into_iter()
        .filter(|event| !matches!(event, Event::Ok(_)))
        .collect()
}

#[test]
fn test_envelope_address_round_trip() {
    let response = b"* 1 FETCH (ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Hello\" \
        ((\"Alice\" NIL \"alice\" \"example.com\")) NIL NIL NIL NIL NIL NIL \"<1@example.com>\"))\r\n";

    let Response::Untagged(UntaggedResponse::Fetch { seq, items }) =
        ResponseParser::parse(response).unwrap()
    else {
        panic!("Expected FETCH response");
    };
    assert_eq!(seq, 1);

    let [FetchItem::Envelope(envelope)] = items.as_slice() else {
        panic!("Expected a single envelope, got {items:?}");
    };
    let from: &Address = &envelope.from[0];
    assert_eq!(from.personal.as_deref(), Some("Alice"));
    assert_eq!(from.address().as_deref(), Some("alice@example.com"));
    assert_eq!(envelope.subject.as_deref(), Some("Hello"));
    assert!(envelope.sender.is_empty());
}

#[test]
fn test_text_plain_body_structure() {
    let response =
        b"* 2 FETCH (BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 42 3))\r\n";

    let Response::Untagged(UntaggedResponse::Fetch { items, .. }) =
        ResponseParser::parse(response).unwrap()
    else {
        panic!("Expected FETCH response");
    };
    match items.as_slice() {
        [FetchItem::BodyStructure(BodyStructure::Part(part))] => {
            assert!(part.media_type.eq_ignore_ascii_case("text"));
            assert_eq!(part.size, 42);
            assert_eq!(part.kind, PartKind::Text { lines: 3 });
            assert_eq!(part.params.get("charset").map(String::as_str), Some("UTF-8"));
        }
        other => panic!("Expected a leaf part, got {other:?}"),
    }
}

#[tokio::test]
async fn test_untagged_data_precedes_completion() {
    let mock = Builder::new()
        .read(b"* OK IMAP4rev1 Service Ready\r\n")
        .write(b"A0001 NOOP\r\n")
        .read(b"* 22 EXPUNGE\r\n")
        .read(b"* 23 EXISTS\r\n* 3 RECENT\r\n")
        .read(b"* 14 FETCH (FLAGS (\\Seen \\Deleted))\r\n")
        .read(b"A0001 OK NOOP completed\r\n")
        .build();
    let mut client = client_over(mock);

    assert!(client.noop().await.unwrap());
    let events = data_events(&mut client);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], Event::Expunge(22));
    assert_eq!(events[1], Event::Exists(23));
    assert_eq!(events[2], Event::Recent(3));
    assert!(matches!(events[3], Event::Fetch(14, _)));
}

#[tokio::test]
async fn test_starttls_on_connect_discards_capabilities() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
        .write(b"A0001 STARTTLS\r\n")
        .read(b"A0001 OK Begin TLS negotiation now\r\n")
        .write(b"A0002 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n")
        .read(b"A0002 OK\r\n")
        .build();
    init_tracing();
    let upgrader = PassthroughUpgrader::default();
    let mut client = Client::builder(config(Security::StartTls))
        .connector(OnceConnector::new(mock))
        .upgrader(upgrader.clone())
        .build();

    let caps = client.capabilities().await.unwrap().to_vec();
    assert_eq!(caps, vec!["IMAP4rev1", "AUTH=PLAIN"]);
    assert!(!client.has_capability("LOGINDISABLED").await.unwrap());
    assert_eq!(upgrader.upgrades.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_explicit_starttls_then_fresh_capability() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready\r\n")
        .write(b"A0001 STARTTLS\r\n")
        .read(b"A0001 OK go ahead\r\n")
        .write(b"A0002 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2\r\nA0002 OK\r\n")
        .build();
    init_tracing();
    let upgrader = PassthroughUpgrader::default();
    let mut client = Client::builder(config(Security::None))
        .connector(OnceConnector::new(mock))
        .upgrader(upgrader.clone())
        .build();

    assert!(client.starttls().await.unwrap());
    assert!(client.cached_capabilities().is_empty());
    assert!(client.capability().await.unwrap());
    assert_eq!(
        client.cached_capabilities(),
        &["IMAP4rev1", "SASL-IR", "AUTH=XOAUTH2"]
    );
    assert_eq!(upgrader.upgrades.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authenticate_cancel_sends_single_star() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"A0001 AUTHENTICATE X-REFUSE\r\n")
        .read(b"+ Y2hhbGxlbmdl\r\n")
        .write(b"*\r\n")
        .read(b"A0001 BAD AUTHENTICATE cancelled\r\n")
        .build();
    let mut client = client_over(mock);

    assert!(!client.authenticate_with(Box::new(Refusing)).await.unwrap());
    assert!(!client.is_poisoned());
    assert_eq!(client.state(), SessionState::NotAuthenticated);
}

#[tokio::test]
async fn test_sasl_security_layer_wraps_later_traffic() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=X-XOR] ready\r\n")
        .write(b"A0001 AUTHENTICATE X-XOR\r\n")
        .read(b"+ \r\n")
        .write(b"b2s=\r\n")
        .read(b"A0001 OK authenticated\r\n")
        .write(&xor_frame(b"A0002 NOOP\r\n"))
        .read(&xor_frame(b"* 5 EXISTS\r\nA0002 OK\r\n"))
        .build();
    let mut client = client_over(mock);

    assert!(
        client
            .authenticate_with(Box::new(XorIntegrity { done: false }))
            .await
            .unwrap()
    );
    assert!(client.noop().await.unwrap());
    assert_eq!(data_events(&mut client), vec![Event::Exists(5)]);
}

#[tokio::test]
async fn test_append_sends_literal_after_continuation() {
    let message = b"From: alice@example.com\r\nSubject: hi\r\n\r\nhello\r\n";
    let header = format!("A0001 APPEND INBOX {{{}}}\r\n", message.len());
    let mut body = message.to_vec();
    body.extend_from_slice(b"\r\n");

    let mock = Builder::new()
        .read(b"* PREAUTH ready\r\n")
        .write(header.as_bytes())
        .read(b"+ Ready for literal data\r\n")
        .write(&body)
        .read(b"A0001 OK APPEND completed\r\n")
        .build();
    let mut client = client_over(mock);

    assert!(
        client
            .append("INBOX", &[], None, &message[..])
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_large_literal_routed_to_factory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![b'z'; 10_000];
    let mock = Builder::new()
        .read(b"* PREAUTH ready\r\n")
        .write(b"A0001 FETCH 1 BODY[TEXT]\r\n")
        .read(b"* 1 FETCH (BODY[TEXT] {10000}\r\n")
        .read(&payload[..4000])
        .read(&payload[4000..])
        .read(b")\r\n")
        .read(b"A0001 OK\r\n")
        .build();
    let mut client = Client::builder(config(Security::None))
        .handler(CollectingHandler::new())
        .connector(OnceConnector::new(mock))
        .literal_factory(FileLiteralFactory::new(dir.path()))
        .build();

    let set = tessera_imap::MessageSet::single(1).unwrap();
    let items = FetchItems::Items(vec![FetchAttribute::BodySection {
        section: Some("TEXT".to_string()),
        peek: false,
        partial: None,
    }]);
    assert!(client.fetch(Some(&set), &items).await.unwrap());

    let events = data_events(&mut client);
    let [Event::Fetch(1, items)] = events.as_slice() else {
        panic!("Expected one FETCH event, got {events:?}");
    };
    match items.as_slice() {
        [FetchItem::Body {
            section,
            data: Some(literal @ Literal::Stored(_)),
            ..
        }] => {
            assert_eq!(section, "TEXT");
            assert_eq!(literal.len(), 10_000);
            assert_eq!(&literal.to_bytes().unwrap()[..], &payload[..]);
        }
        other => panic!("Expected a stored body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_literal_poisons_client() {
    let mock = Builder::new()
        .read(b"* PREAUTH ready\r\n")
        .write(b"A0001 NOOP\r\n")
        .read(b"* 1 FETCH (BODY[] {100}\r\n")
        .read(b"only a few bytes")
        .build();
    let mut client = client_over(mock);

    let err = client.noop().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            expected: 100,
            received: 16
        }
    ));
    assert!(matches!(
        client.noop().await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_untagged_line_is_delivered_in_order(counts in proptest::collection::vec(1u32..10_000, 0..20)) {
        let mut script = Builder::new();
        script.read(b"* PREAUTH ready\r\n").write(b"A0001 NOOP\r\n");
        for n in &counts {
            script.read(format!("* {n} EXISTS\r\n").as_bytes());
        }
        script.read(b"A0001 OK\r\n");
        let mut client = client_over(script.build());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        prop_assert!(runtime.block_on(client.noop()).unwrap());

        let expected: Vec<Event> = counts.iter().map(|&n| Event::Exists(n)).collect();
        prop_assert_eq!(data_events(&mut client), expected);
    }
}
