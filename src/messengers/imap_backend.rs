//! Gmail transport: blocking `imap` sessions run on the blocking pool, SMTP
//! through `lettre`'s async relay.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use chrono::DateTime;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use log::{debug, info};
use native_tls::{TlsConnector, TlsStream};
use crate::messengers::gmail::{MailBackend, OutgoingReply, RawMail};
use crate::messengers::mail_text;
use crate::messengers::MessengerError;

const IMAP_HOST: &str = "imap.gmail.com";
const IMAP_PORT: u16 = 993;
const SMTP_HOST: &str = "smtp.gmail.com";
const SMTP_PORT: u16 = 465;
const FETCH_QUERY: &str = "(ENVELOPE FLAGS BODY.PEEK[])";

type ImapSession = imap::Session<TlsStream<TcpStream>>;

fn imap_error(e: impl std::fmt::Display) -> MessengerError {
    MessengerError::Network(format!("IMAP: {}", e))
}

fn smtp_error(e: impl std::fmt::Display) -> MessengerError {
    MessengerError::Network(format!("SMTP: {}", e))
}

fn text(bytes: Option<&[u8]>) -> Option<String> {
    bytes
        .map(|b| String::from_utf8_lossy(b).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn to_raw_mail(fetch: &imap::types::Fetch) -> RawMail {
    let mut raw = RawMail {
        seq: fetch.message,
        seen: fetch.flags().iter().any(|f| matches!(f, imap::types::Flag::Seen)),
        body: fetch.body().map(mail_text::body_text).unwrap_or_default(),
        ..RawMail::default()
    };
    if let Some(envelope) = fetch.envelope() {
        raw.message_id = text(envelope.message_id);
        raw.subject = text(envelope.subject);
        raw.in_reply_to = text(envelope.in_reply_to);
        raw.date = text(envelope.date)
            .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
            .map(|d| d.timestamp());
        if let Some(sender) = envelope.from.as_ref().and_then(|from| from.first()) {
            raw.from_name = text(sender.name);
            raw.from_address = match (text(sender.mailbox), text(sender.host)) {
                (Some(mailbox), Some(host)) => Some(format!("{}@{}", mailbox, host)),
                (Some(mailbox), None) => Some(mailbox),
                _ => None,
            };
        }
    }
    raw
}

/// Sequence set covering the last `limit` of `total` messages.
pub fn recent_range(total: u32, limit: usize) -> Option<String> {
    if total == 0 || limit == 0 {
        return None;
    }
    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    let start = total.saturating_sub(limit).saturating_add(1).max(1);
    Some(format!("{}:{}", start, total))
}

pub struct GmailTransport {
    address: String,
    app_password: String,
    // Holding the lock for a whole operation keeps the selected mailbox stable.
    imap: Arc<Mutex<Option<ImapSession>>>,
    smtp: AsyncSmtpTransport<Tokio1Executor>,
}

impl GmailTransport {
    pub fn new(address: String, app_password: String) -> Result<Self, MessengerError> {
        let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(SMTP_HOST)
            .map_err(smtp_error)?
            .port(SMTP_PORT)
            .credentials(Credentials::new(address.clone(), app_password.clone()))
            .build();
        Ok(GmailTransport {
            address,
            app_password,
            imap: Arc::new(Mutex::new(None)),
            smtp,
        })
    }

    fn login(address: &str, app_password: &str) -> Result<ImapSession, MessengerError> {
        let tls = TlsConnector::builder().build().map_err(imap_error)?;
        let client = imap::connect((IMAP_HOST, IMAP_PORT), IMAP_HOST, &tls).map_err(imap_error)?;
        client
            .login(address, app_password)
            .map_err(|(e, _client)| MessengerError::Auth(format!("IMAP login rejected: {}", e)))
    }

    /// Runs `op` against a live session on the blocking pool, reconnecting
    /// once if the cached session is gone.
    async fn with_session<T, F>(&self, op: F) -> Result<T, MessengerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapSession) -> Result<T, MessengerError> + Send + 'static,
    {
        let imap = Arc::clone(&self.imap);
        let address = self.address.clone();
        let app_password = self.app_password.clone();
        tokio::task::spawn_blocking(move || {
            let mut slot = imap.lock().unwrap_or_else(|e| e.into_inner());
            let healthy = match slot.as_mut() {
                Some(session) => session.noop().is_ok(),
                None => false,
            };
            if !healthy {
                debug!("Gmail: opening IMAP session");
                *slot = Some(Self::login(&address, &app_password)?);
            }
            let session = slot
                .as_mut()
                .ok_or_else(|| imap_error("session unavailable"))?;
            let result = op(session);
            if result.is_err() {
                // Drop the session so the next call starts clean.
                *slot = None;
            }
            result
        })
        .await
        .map_err(|e| imap_error(format!("worker failed: {}", e)))?
    }
}

#[async_trait]
impl MailBackend for GmailTransport {
    async fn connect(&self) -> Result<(), MessengerError> {
        self.with_session(|_| Ok(())).await?;
        let verified = self.smtp.test_connection().await.map_err(smtp_error)?;
        if !verified {
            return Err(smtp_error("relay refused the connection"));
        }
        info!("Gmail IMAP and SMTP ready for {}", self.address);
        Ok(())
    }

    async fn list_mailboxes(&self) -> Result<Vec<String>, MessengerError> {
        self.with_session(|session| {
            let names = session.list(None, Some("*")).map_err(imap_error)?;
            Ok(names.iter().map(|n| n.name().to_string()).collect())
        })
        .await
    }

    async fn unseen_count(&self, mailbox: &str) -> Result<u32, MessengerError> {
        let mailbox = mailbox.to_string();
        self.with_session(move |session| {
            let status = session.status(&mailbox, "(UNSEEN)").map_err(imap_error)?;
            Ok(status.unseen.unwrap_or(0))
        })
        .await
    }

    async fn fetch_recent(&self, mailbox: &str, limit: usize) -> Result<Vec<RawMail>, MessengerError> {
        let mailbox = mailbox.to_string();
        self.with_session(move |session| {
            let selected = session.select(&mailbox).map_err(imap_error)?;
            let Some(range) = recent_range(selected.exists, limit) else {
                return Ok(Vec::new());
            };
            let fetches = session.fetch(range, FETCH_QUERY).map_err(imap_error)?;
            let mut mails: Vec<RawMail> = fetches.iter().map(to_raw_mail).collect();
            mails.sort_by_key(|m| m.seq);
            Ok(mails)
        })
        .await
    }

    async fn fetch_by_message_id(&self, mailbox: &str, message_id: &str) -> Result<Option<RawMail>, MessengerError> {
        let mailbox = mailbox.to_string();
        let needle = message_id.replace('"', "");
        self.with_session(move |session| {
            session.select(&mailbox).map_err(imap_error)?;
            let uids = session
                .uid_search(format!("HEADER Message-ID \"{}\"", needle))
                .map_err(imap_error)?;
            let Some(uid) = uids.into_iter().min() else {
                return Ok(None);
            };
            let fetches = session
                .uid_fetch(uid.to_string(), FETCH_QUERY)
                .map_err(imap_error)?;
            let Some(fetch) = fetches.iter().next() else {
                return Ok(None);
            };
            let raw = to_raw_mail(fetch);
            session
                .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
                .map_err(imap_error)?;
            Ok(Some(raw))
        })
        .await
    }

    async fn send(&self, reply: OutgoingReply) -> Result<(), MessengerError> {
        let from: Mailbox = reply.from.parse().map_err(smtp_error)?;
        let to: Mailbox = reply.to.parse().map_err(smtp_error)?;
        let email = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(reply.subject)
            .in_reply_to(reply.in_reply_to)
            .references(reply.references)
            .header(ContentType::TEXT_PLAIN)
            .body(reply.text)
            .map_err(smtp_error)?;
        self.smtp.send(email).await.map_err(smtp_error)?;
        Ok(())
    }
}
