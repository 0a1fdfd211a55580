//! IMAP client connection.
//!
//! A [`Client`] owns one connection and runs one command at a time; every
//! command method takes `&mut self`. The transport is opened lazily by the
//! first command and can be replaced in place by STARTTLS or a SASL
//! security layer.
//!
//! Commands are grouped by the IMAP state they are valid in:
//!
//! - any state: CAPABILITY, NOOP, LOGOUT (this module)
//! - not authenticated: STARTTLS, LOGIN, AUTHENTICATE
//! - authenticated: mailbox management, ACL, QUOTA, NAMESPACE, APPEND
//! - selected: CHECK, CLOSE, EXPUNGE, SEARCH, FETCH, STORE, COPY
//!
//! A tagged NO is reported as `Ok(false)`. Any error poisons the client:
//! later commands fail with [`Error::InvalidState`] until
//! [`Client::disconnect`] is called.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::sync::Arc;

use tracing::Level;

pub use self::states::SessionState;
use super::config::Config;
use super::framed::FramedStream;
use super::stream::{BoxedIo, Connector, RustlsUpgrader, StreamUpgrader, TcpConnector};
use crate::command::{Command, EncodedCommand, TagGenerator};
use crate::handler::{NoopHandler, ResponseHandler, dispatch_code, dispatch_untagged};
use crate::literal::{LiteralFactory, MemoryLiteralFactory};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

const WIRE: &str = "tessera_imap::wire";

/// The tagged completion of a command.
#[derive(Debug, Clone)]
pub struct Completion {
    /// OK, NO or BAD.
    pub status: Status,
    /// Response code, if any.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
}

impl Completion {
    /// Returns true for a tagged OK.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// What arrived while waiting on a command.
enum Step {
    /// A `+` continuation request with its text.
    Continue(String),
    /// The command's own tagged completion.
    Done(Completion),
}

fn reject_bad(completion: Completion, command: &str) -> Result<Completion> {
    if completion.status == Status::Bad {
        return Err(Error::Bad {
            command: command.to_string(),
            text: completion.text,
        });
    }
    Ok(completion)
}

fn not_connected() -> Error {
    Error::InvalidState("not connected".to_string())
}

fn trace_sent(encoded: &EncodedCommand, index: usize, segment: &[u8]) {
    if !tracing::enabled!(target: WIRE, Level::TRACE) {
        return;
    }
    if encoded.sensitive {
        if index == 0 {
            tracing::trace!(target: WIRE, "C: {} {} ****", encoded.tag, encoded.name);
        }
    } else if index == 0 {
        let line = String::from_utf8_lossy(segment);
        tracing::trace!(target: WIRE, "C: {}", line.trim_end_matches(['\r', '\n']));
    } else {
        tracing::trace!(target: WIRE, "C: <{} bytes>", segment.len());
    }
}

/// IMAP client connection.
///
/// Untagged server data is delivered to the [`ResponseHandler`] `H` while
/// commands run.
pub struct Client<H = NoopHandler> {
    config: Config,
    handler: H,
    connector: Arc<dyn Connector>,
    upgrader: Arc<dyn StreamUpgrader>,
    literal_factory: Arc<dyn LiteralFactory>,
    transport: Option<FramedStream<BoxedIo>>,
    tags: TagGenerator,
    capabilities: Vec<String>,
    state: SessionState,
    poisoned: bool,
    bye_received: bool,
}

// Manual Debug implementation since the transport doesn't implement Debug
impl<H> std::fmt::Debug for Client<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("tags", &self.tags)
            .field("capabilities", &self.capabilities)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Client<NoopHandler> {
    /// Creates a client that ignores untagged data.
    #[must_use]
    pub fn new(config: Config) -> Self {
        ClientBuilder::new(config).build()
    }

    /// Creates a client builder.
    #[must_use]
    pub fn builder(config: Config) -> ClientBuilder<NoopHandler> {
        ClientBuilder::new(config)
    }
}

impl<H: ResponseHandler> Client<H> {
    /// Creates a client delivering untagged data to `handler`.
    #[must_use]
    pub fn with_handler(config: Config, handler: H) -> Self {
        ClientBuilder::new(config).handler(handler).build()
    }

    /// Returns the connection configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the response handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the response handler mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true while a transport is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns true if an earlier error left the connection unusable.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns the cached capability list without contacting the server.
    #[must_use]
    pub fn cached_capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Returns the server capabilities, issuing CAPABILITY if none are cached.
    pub async fn capabilities(&mut self) -> Result<&[String]> {
        self.ensure_connected().await?;
        if self.capabilities.is_empty() {
            self.capability().await?;
        }
        Ok(&self.capabilities)
    }

    /// Checks a capability by name, case-insensitively.
    pub async fn has_capability(&mut self, name: &str) -> Result<bool> {
        Ok(self
            .capabilities()
            .await?
            .iter()
            .any(|cap| cap.eq_ignore_ascii_case(name)))
    }

    /// Sends CAPABILITY and replaces the cached capability list.
    pub async fn capability(&mut self) -> Result<bool> {
        self.command_ok(&Command::Capability).await
    }

    /// Sends a NOOP command, which also polls for mailbox updates.
    pub async fn noop(&mut self) -> Result<bool> {
        self.command_ok(&Command::Noop).await
    }

    /// Sends LOGOUT, then closes the transport.
    ///
    /// Does nothing if no transport is open.
    pub async fn logout(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        if self.poisoned {
            self.disconnect().await;
            return Ok(());
        }

        self.set_state(SessionState::Logout);
        let result = match self.exchange(&Command::Logout).await {
            Ok(_) => Ok(()),
            // Servers may close the socket right after BYE.
            Err(Error::Io(_)) if self.bye_received => Ok(()),
            Err(err) => Err(err),
        };
        self.disconnect().await;
        result
    }

    /// Drops the transport and clears the poisoned flag.
    ///
    /// The next command connects again.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take()
            && let Err(err) = transport.shutdown().await
        {
            tracing::debug!(%err, "Transport shutdown failed");
        }
        self.capabilities.clear();
        self.poisoned = false;
        self.bye_received = false;
        self.set_state(SessionState::Disconnected);
    }

    /// Runs an arbitrary command, returning true on a tagged OK.
    pub async fn execute(&mut self, command: &Command) -> Result<bool> {
        self.command_ok(command).await
    }

    async fn command_ok(&mut self, command: &Command) -> Result<bool> {
        Ok(self.run(command).await?.is_ok())
    }

    /// Connects if needed, then runs one command exchange.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<Completion> {
        self.ensure_connected().await?;
        let result = self.exchange(command).await;
        self.settle(result)
    }

    /// Marks the client poisoned if `result` is a fatal error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result
            && !matches!(err, Error::InvalidState(_) | Error::InvalidCommand(_))
        {
            tracing::warn!(%err, "Connection unusable until disconnect");
            self.poisoned = true;
        }
        result
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(Error::InvalidState(
                "connection failed earlier; disconnect before retrying".to_string(),
            ));
        }
        if self.transport.is_some() {
            return Ok(());
        }
        let result = self.open().await;
        if result.is_err() {
            self.transport = None;
        }
        self.settle(result)
    }

    fn install(&mut self, io: BoxedIo) {
        self.transport = Some(
            FramedStream::new(io)
                .with_literal_policy(
                    self.config.literal_threshold,
                    Arc::clone(&self.literal_factory),
                )
                .with_max_literal_size(self.config.max_literal_size)
                .with_io_timeout(self.config.io_timeout),
        );
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "Session state changed");
            self.state = state;
        }
    }

    fn transport_mut(&mut self) -> Result<&mut FramedStream<BoxedIo>> {
        self.transport.as_mut().ok_or_else(not_connected)
    }

    /// Writes one command and reads until its tagged completion.
    ///
    /// Segments after the first are sent only once the server asked for them
    /// with a continuation request.
    async fn exchange(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tags.next_tag();
        let encoded = command.encode(&tag)?;
        tracing::debug!(tag = %tag, command = encoded.name, "Sending command");

        let last = encoded.segments.len().saturating_sub(1);
        for (index, segment) in encoded.segments.iter().enumerate() {
            trace_sent(&encoded, index, segment);
            self.transport_mut()?.write_all(segment).await?;
            if index < last {
                match self.read_step(&tag, encoded.name).await? {
                    Step::Continue(_) => {}
                    Step::Done(completion) => return reject_bad(completion, encoded.name),
                }
            }
        }

        self.read_completion(&tag, encoded.name).await
    }

    async fn read_completion(&mut self, tag: &str, command: &str) -> Result<Completion> {
        match self.read_step(tag, command).await? {
            Step::Done(completion) => reject_bad(completion, command),
            Step::Continue(text) => Err(Error::Protocol(format!(
                "unexpected continuation during {command}: {text}"
            ))),
        }
    }

    /// Reads responses, dispatching untagged data, until a continuation
    /// request or the tagged completion for `tag`.
    async fn read_step(&mut self, tag: &str, command: &str) -> Result<Step> {
        loop {
            let frame = self.transport_mut()?.read_frame().await?;
            match ResponseParser::parse_frame(frame)? {
                Response::Untagged(response) => self.handle_untagged(&response, command)?,
                Response::Continuation { text } => return Ok(Step::Continue(text)),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } => {
                    if got != tag {
                        tracing::warn!(expected = tag, got = %got, "Ignoring tagged response for another command");
                        continue;
                    }
                    if let Some(code) = &code {
                        self.note_code(code);
                        dispatch_code(&mut self.handler, code, &text);
                    }
                    tracing::debug!(tag, ?status, "Command completed");
                    return Ok(Step::Done(Completion { status, code, text }));
                }
            }
        }
    }

    fn handle_untagged(&mut self, response: &UntaggedResponse, command: &str) -> Result<()> {
        match response {
            UntaggedResponse::Capability(caps) => self.capabilities.clone_from(caps),
            UntaggedResponse::Condition {
                code: Some(code), ..
            } => self.note_code(code),
            _ => {}
        }

        dispatch_untagged(&mut self.handler, response);

        match response {
            UntaggedResponse::Condition {
                status: Status::Bad,
                text,
                ..
            } => Err(Error::Bad {
                command: "*".to_string(),
                text: text.clone(),
            }),
            UntaggedResponse::Condition {
                status: Status::Bye,
                text,
                ..
            } => {
                self.bye_received = true;
                if command == "LOGOUT" {
                    Ok(())
                } else {
                    Err(Error::Bye(text.clone()))
                }
            }
            _ => Ok(()),
        }
    }

    fn note_code(&mut self, code: &ResponseCode) {
        if let ResponseCode::Capability(caps) = code {
            self.capabilities.clone_from(caps);
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder<H = NoopHandler> {
    config: Config,
    handler: H,
    connector: Option<Arc<dyn Connector>>,
    upgrader: Option<Arc<dyn StreamUpgrader>>,
    literal_factory: Option<Arc<dyn LiteralFactory>>,
}

impl ClientBuilder<NoopHandler> {
    /// Creates a builder with TCP transport, rustls TLS and in-memory literals.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: NoopHandler,
            connector: None,
            upgrader: None,
            literal_factory: None,
        }
    }
}

impl<H: ResponseHandler> ClientBuilder<H> {
    /// Sets the handler for untagged server data.
    #[must_use]
    pub fn handler<H2: ResponseHandler>(self, handler: H2) -> ClientBuilder<H2> {
        ClientBuilder {
            config: self.config,
            handler,
            connector: self.connector,
            upgrader: self.upgrader,
            literal_factory: self.literal_factory,
        }
    }

    /// Sets how the transport is opened.
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets how STARTTLS upgrades the transport.
    #[must_use]
    pub fn upgrader(mut self, upgrader: impl StreamUpgrader + 'static) -> Self {
        self.upgrader = Some(Arc::new(upgrader));
        self
    }

    /// Sets where literals above the configured threshold are stored.
    #[must_use]
    pub fn literal_factory(mut self, factory: impl LiteralFactory + 'static) -> Self {
        self.literal_factory = Some(Arc::new(factory));
        self
    }

    /// Builds the client. No connection is made until the first command.
    #[must_use]
    pub fn build(self) -> Client<H> {
        let tags = TagGenerator::new(self.config.tag_prefix);
        Client {
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TcpConnector::default())),
            upgrader: self
                .upgrader
                .unwrap_or_else(|| Arc::new(RustlsUpgrader::new())),
            literal_factory: self
                .literal_factory
                .unwrap_or_else(|| Arc::new(MemoryLiteralFactory)),
            config: self.config,
            handler: self.handler,
            transport: None,
            tags,
            capabilities: Vec::new(),
            state: SessionState::Disconnected,
            poisoned: false,
            bye_received: false,
        }
    }
}

impl<H> std::fmt::Debug for ClientBuilder<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
pub(crate) mod tests {
    use super::*;
    use crate::connection::OnceConnector;
    use crate::handler::{CollectingHandler, Event};
    use tokio_test::io::{Builder, Mock};

    pub(crate) fn client_over(mock: Mock) -> Client<CollectingHandler> {
        let config = Config::builder("imap.example.com")
            .security(crate::connection::Security::None)
            .build();
        Client::builder(config)
            .handler(CollectingHandler::new())
            .connector(OnceConnector::new(mock))
            .build()
    }

    /// Drains recorded events, dropping the plain OK texts.
    pub(crate) fn data_events(client: &mut Client<CollectingHandler>) -> Vec<Event> {
        client
            .handler_mut()
            .take()
            .into_iter()
            .filter(|event| !matches!(event, Event::Ok(_)))
            .collect()
    }

    fn _assert_send<T: Send>() {}

    #[test]
    fn test_client_is_send() {
        _assert_send::<Client<NoopHandler>>();
        _assert_send::<Client<CollectingHandler>>();
    }

    #[tokio::test]
    async fn test_lazy_connect_reads_greeting_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = client_over(mock);
        assert_eq!(client.state(), SessionState::Disconnected);

        assert!(client.noop().await.unwrap());
        assert_eq!(client.state(), SessionState::NotAuthenticated);
        assert_eq!(
            client.cached_capabilities(),
            &["IMAP4rev1", "SASL-IR", "AUTH=PLAIN"]
        );
        assert!(client.has_capability("sasl-ir").await.unwrap());
    }

    #[tokio::test]
    async fn test_preauth_greeting() {
        let mock = Builder::new()
            .read(b"* PREAUTH welcome back\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = client_over(mock);
        client.noop().await.unwrap();
        assert_eq!(client.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_bye_greeting_fails_connect() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let mut client = client_over(mock);

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
        assert!(!client.is_connected());
        assert!(client.is_poisoned());
    }

    #[tokio::test]
    async fn test_untagged_data_dispatched_before_completion() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* 4 EXISTS\r\n* 1 RECENT\r\n* 2 EXPUNGE\r\nA0001 OK NOOP completed\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.noop().await.unwrap());
        let events = client.handler_mut().take();
        assert_eq!(
            events,
            vec![
                Event::Ok("ready".to_string()),
                Event::Exists(4),
                Event::Recent(1),
                Event::Expunge(2),
            ]
        );
    }

    #[tokio::test]
    async fn test_tagged_no_is_false() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"A0001 NO not now\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(!client.capability().await.unwrap());
        assert!(!client.is_poisoned());
        assert!(client.noop().await.unwrap());
    }

    #[tokio::test]
    async fn test_tagged_bad_poisons_client() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 BAD command unknown\r\n")
            .build();
        let mut client = client_over(mock);

        let err = client.noop().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Bad { ref command, ref text } if command == "NOOP" && text == "command unknown"
        ));
        assert!(matches!(
            client.noop().await.unwrap_err(),
            Error::InvalidState(_)
        ));

        client.disconnect().await;
        assert!(!client.is_poisoned());
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_foreign_tag_is_skipped() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"Z0099 OK stale\r\nA0001 OK done\r\n")
            .build();
        let mut client = client_over(mock);
        assert!(client.noop().await.unwrap());
    }

    #[tokio::test]
    async fn test_capability_replaces_cache() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 QUOTA ACL\r\nA0001 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.capability().await.unwrap());
        assert_eq!(client.cached_capabilities(), &["IMAP4rev1", "QUOTA", "ACL"]);
    }

    #[tokio::test]
    async fn test_capabilities_refreshes_when_empty() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 IDLE\r\nA0001 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert_eq!(client.capabilities().await.unwrap(), &["IMAP4rev1", "IDLE"]);
        assert!(!client.has_capability("QUOTA").await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_accepts_bye_and_closed_socket() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .build();
        let mut client = client_over(mock);

        client.noop().await.unwrap();
        client.logout().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.handler_mut().take().contains(&Event::Bye("logging out".to_string())));
    }

    #[tokio::test]
    async fn test_unexpected_bye_is_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* BYE shutting down\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(matches!(client.noop().await.unwrap_err(), Error::Bye(_)));
    }

    #[tokio::test]
    async fn test_tag_prefix_from_config() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"T0001 NOOP\r\n")
            .read(b"T0001 OK\r\n")
            .build();
        let config = Config::builder("localhost").tag_prefix('T').build();
        let mut client = Client::builder(config)
            .connector(OnceConnector::new(mock))
            .build();
        assert!(client.noop().await.unwrap());
    }

    #[tokio::test]
    async fn test_literal_over_configured_limit_poisons_client() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* 1 FETCH (BODY[] {100}\r\n")
            .build();
        let config = Config::builder("localhost")
            .security(crate::connection::Security::None)
            .max_literal_size(16)
            .build();
        let mut client = Client::builder(config)
            .connector(OnceConnector::new(mock))
            .build();

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("exceeds")));
        assert!(client.is_poisoned());
    }
}
