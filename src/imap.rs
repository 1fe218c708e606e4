//! IMAP adapter for the protocol client seam
//!
//! Speaks IMAP over TLS or plain TCP via `async-imap`, translating the wire
//! protocol into the engine's [`MailClient`]/[`MailSession`] contract. Live
//! updates ride on IDLE: the wait either reports new server data, times out
//! (the caller's cue to probe with NOOP), or surfaces a dead connection.

use async_imap::extensions::idle::IdleResponse;
use async_imap::types::{Fetch, Name, NameAttribute};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_native_tls::native_tls::TlsConnector;
use tracing::debug;

use crate::client::{FolderStatus, MailClient, MailSession, SessionEvent};
use crate::error::{Result, SyncError};
use crate::folders;
use crate::models::{Account, Mailbox, RawMessage};

/// Streams an IMAP session can run over (TLS or plain TCP)
pub trait SessionStream:
    tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + fmt::Debug
{
}

impl<T> SessionStream for T where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + fmt::Debug
{
}

type Session = async_imap::Session<Box<dyn SessionStream>>;

/// Envelope plus full source, without marking messages seen
const FETCH_ITEMS: &str = "(UID ENVELOPE INTERNALDATE BODY.PEEK[])";

/// Production IMAP client
#[derive(Default)]
pub struct ImapMailClient;

impl ImapMailClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailClient for ImapMailClient {
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailSession>> {
        let tcp = TcpStream::connect((account.host.as_str(), account.port))
            .await
            .map_err(|e| {
                SyncError::Network(format!(
                    "connect to {}:{} failed: {}",
                    account.host, account.port, e
                ))
            })?;

        let stream: Box<dyn SessionStream> = if account.use_tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| SyncError::Network(format!("TLS setup failed: {}", e)))?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector
                .connect(&account.host, tcp)
                .await
                .map_err(|e| SyncError::Network(format!("TLS handshake failed: {}", e)))?;
            Box::new(tls)
        } else {
            Box::new(tcp)
        };

        let client = async_imap::Client::new(stream);
        let session = client
            .login(&account.username, &account.password)
            .await
            .map_err(|(e, _client)| match e {
                async_imap::error::Error::Io(err) => SyncError::Network(err.to_string()),
                async_imap::error::Error::ConnectionLost => {
                    SyncError::ConnectionClosed("connection lost during login".to_string())
                }
                other => SyncError::Auth(other.to_string()),
            })?;

        debug!(account = %account.id, host = %account.host, "IMAP session established");
        Ok(Box::new(ImapMailSession {
            session: Some(session),
            selected: None,
        }))
    }
}

struct ImapMailSession {
    /// Taken out temporarily while an IDLE handle owns the connection
    session: Option<Session>,
    selected: Option<String>,
}

impl ImapMailSession {
    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| SyncError::ConnectionClosed("session torn down".to_string()))
    }

    async fn select(&mut self, folder: &str) -> Result<async_imap::types::Mailbox> {
        let session = self.session_mut()?;
        let mailbox = session.select(folder).await?;
        self.selected = Some(folder.to_string());
        Ok(mailbox)
    }

    async fn ensure_selected(&mut self, folder: &str) -> Result<()> {
        if self.selected.as_deref() != Some(folder) {
            self.select(folder).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MailSession for ImapMailSession {
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
        let session = self.session_mut()?;
        let names: Vec<Name> = {
            let stream = session.list(Some(""), Some("*")).await?;
            stream.try_collect().await?
        };

        let mut result = Vec::new();
        for name in names {
            let flags: Vec<String> = name.attributes().iter().map(attribute_name).collect();
            if flags.iter().any(|f| f.eq_ignore_ascii_case("\\NoSelect")) {
                continue;
            }

            let path = name.name().to_string();
            let display = match name.delimiter() {
                Some(delim) if !delim.is_empty() => path
                    .rsplit(delim)
                    .next()
                    .unwrap_or(path.as_str())
                    .to_string(),
                _ => path.clone(),
            };
            let special_use = folders::classify(&path, &flags);
            result.push(Mailbox {
                name: display,
                path,
                flags,
                special_use,
            });
        }
        Ok(result)
    }

    async fn fetch_since(
        &mut self,
        folder: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        self.select(folder).await?;
        let session = self.session_mut()?;

        let query = format!("SINCE {}", since.format("%d-%b-%Y"));
        let uids = session.uid_search(&query).await?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sorted: Vec<u32> = uids.into_iter().collect();
        sorted.sort_unstable();
        let set = sorted
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let fetches: Vec<Fetch> = {
            let stream = session.uid_fetch(&set, FETCH_ITEMS).await?;
            stream.try_collect().await?
        };

        let mut messages: Vec<RawMessage> = fetches.iter().map(to_raw_message).collect();
        // The server may answer a multi-UID fetch out of order
        messages.sort_by_key(|m| m.uid);
        Ok(messages)
    }

    async fn status(&mut self, folder: &str) -> Result<FolderStatus> {
        let mailbox = self.select(folder).await?;
        Ok(FolderStatus {
            exists: mailbox.exists,
            next_seq: mailbox.exists + 1,
        })
    }

    async fn fetch_by_seq(&mut self, folder: &str, seq: u32) -> Result<Option<RawMessage>> {
        self.ensure_selected(folder).await?;
        let session = self.session_mut()?;
        let fetches: Vec<Fetch> = {
            let stream = session.fetch(seq.to_string(), FETCH_ITEMS).await?;
            stream.try_collect().await?
        };
        Ok(fetches.first().map(to_raw_message))
    }

    async fn noop(&mut self) -> Result<()> {
        self.session_mut()?.noop().await?;
        Ok(())
    }

    async fn wait_for_event(&mut self, folder: &str, timeout: Duration) -> Result<SessionEvent> {
        self.ensure_selected(folder).await?;
        let session = self
            .session
            .take()
            .ok_or_else(|| SyncError::ConnectionClosed("session torn down".to_string()))?;

        let mut idle = session.idle();
        if let Err(e) = idle.init().await {
            return Err(SyncError::ConnectionClosed(format!(
                "IDLE init failed: {}",
                e
            )));
        }

        let (wait, _interrupt) = idle.wait_with_timeout(timeout);
        let outcome = wait.await;

        match idle.done().await {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                return Err(SyncError::ConnectionClosed(format!(
                    "IDLE teardown failed: {}",
                    e
                )))
            }
        }

        match outcome {
            Ok(IdleResponse::NewData(_)) => Ok(SessionEvent::NewMessage),
            Ok(IdleResponse::Timeout) | Ok(IdleResponse::ManualInterrupt) => {
                Ok(SessionEvent::Tick)
            }
            Err(e) => Err(SyncError::ConnectionClosed(format!(
                "IDLE wait failed: {}",
                e
            ))),
        }
    }
}

fn attribute_name(attr: &NameAttribute<'_>) -> String {
    match attr {
        NameAttribute::Extension(s) => s.to_string(),
        // Unit variants debug-print as their RFC names (NoSelect, Sent, ...)
        other => format!("\\{:?}", other),
    }
}

fn to_raw_message(fetch: &Fetch) -> RawMessage {
    let mut message = RawMessage {
        uid: fetch.uid,
        date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        ..Default::default()
    };

    if let Some(source) = fetch.body() {
        parse_source(source, &mut message);
    }

    // The envelope fills anything the MIME parse could not
    if let Some(envelope) = fetch.envelope() {
        if message.message_id.is_none() {
            message.message_id = envelope
                .message_id
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).trim().to_string());
        }
        if message.subject.is_empty() {
            if let Some(subject) = envelope.subject.as_ref() {
                message.subject = String::from_utf8_lossy(subject).to_string();
            }
        }
        if message.from.is_empty() {
            message.from = envelope
                .from
                .as_ref()
                .and_then(|v| v.first())
                .map(format_envelope_address)
                .unwrap_or_default();
        }
    }

    message
}

/// Extract envelope fields and the text body from the raw source
fn parse_source(source: &[u8], message: &mut RawMessage) {
    let Some(parsed) = mail_parser::Message::parse(source) else {
        message.body = String::from_utf8_lossy(source).to_string();
        return;
    };

    message.message_id = parsed.message_id().map(|s| s.to_string());
    message.subject = parsed.subject().unwrap_or_default().to_string();
    message.from = first_address(parsed.from());
    message.to = all_addresses(parsed.to());
    if message.date.is_none() {
        message.date = parsed
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));
    }
    message.body = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .unwrap_or_default();
}

fn format_parsed_address(addr: &mail_parser::Addr<'_>) -> String {
    let email = addr.address.as_deref().unwrap_or_default();
    match addr.name.as_deref() {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, email),
        _ => email.to_string(),
    }
}

fn first_address(value: &mail_parser::HeaderValue<'_>) -> String {
    match value {
        mail_parser::HeaderValue::Address(addr) => format_parsed_address(addr),
        mail_parser::HeaderValue::AddressList(list) => {
            list.first().map(format_parsed_address).unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn all_addresses(value: &mail_parser::HeaderValue<'_>) -> Vec<String> {
    match value {
        mail_parser::HeaderValue::Address(addr) => vec![format_parsed_address(addr)],
        mail_parser::HeaderValue::AddressList(list) => {
            list.iter().map(format_parsed_address).collect()
        }
        _ => Vec::new(),
    }
}

fn format_envelope_address(addr: &async_imap::imap_proto::Address<'_>) -> String {
    let name = addr
        .name
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).to_string())
        .unwrap_or_default();
    let mailbox = addr
        .mailbox
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).to_string())
        .unwrap_or_default();
    let host = addr
        .host
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).to_string())
        .unwrap_or_default();

    let email = if host.is_empty() {
        mailbox
    } else {
        format!("{}@{}", mailbox, host)
    };
    if name.is_empty() {
        email
    } else {
        format!("{} <{}>", name, email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"Message-ID: <sample-1@example.com>\r\n\
From: Alice Example <alice@example.com>\r\n\
To: Bob <bob@example.com>, carol@example.com\r\n\
Subject: Quarterly sync\r\n\
Date: Mon, 6 Jul 2026 10:00:00 +0000\r\n\
Content-Type: text/plain\r\n\
\r\n\
Shall we meet on Thursday?\r\n";

    #[test]
    fn test_parse_source_extracts_envelope() {
        let mut message = RawMessage::default();
        parse_source(SAMPLE, &mut message);

        assert_eq!(message.message_id.as_deref(), Some("sample-1@example.com"));
        assert_eq!(message.subject, "Quarterly sync");
        assert_eq!(message.from, "Alice Example <alice@example.com>");
        assert_eq!(message.to.len(), 2);
        assert_eq!(message.to[1], "carol@example.com");
        assert!(message.date.is_some());
        assert!(message.body.contains("Thursday"));
    }

    #[test]
    fn test_parse_source_without_message_id() {
        let mut message = RawMessage::default();
        parse_source(b"Subject: hello\r\n\r\nbody\r\n", &mut message);
        assert!(message.message_id.is_none());
        assert_eq!(message.subject, "hello");
    }
}
