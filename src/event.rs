//! The audit event and its fluent builder
//!
//! An `Event` is created with a generated id, timestamp and local address,
//! annotated through `with_*` builder calls, and finalized by `put`, which
//! consumes it and hands it to the dispatcher. Nothing can touch the event
//! after `put` because the caller no longer owns it.

use crate::dispatcher::AuditDispatcher;
use crate::env::Environment;
use crate::error::{AuditError, BoxError};
use crate::types::{Level, RunMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::sync::Arc;

/// Maximum size of `msg` in bytes
pub const MAX_MSG_BYTES: usize = 4096;

/// Type tag used when the caller supplies none
pub const UNKNOWN_TYPE: &str = "unknown";

/// Builder step accepted by [`Event::with_options`]
pub type EventOption = Box<dyn FnOnce(Event) -> Event + Send>;

/// One audit occurrence
pub struct Event {
    env: Arc<Environment>,
    time: DateTime<Utc>,
    id: String,
    inet: String,
    subject: String,
    remote_addr: String,
    remote_port: u16,
    region: String,
    from: String,
    type_of: String,
    user: String,
    auth: String,
    msg: String,
    error: Option<BoxError>,
    alert: bool,
    upload: bool,
    level: Level,
}

/// Peer endpoint accepted by [`Event::with_remote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remote {
    /// `host:port`, `[v6]:port` or a bare IP literal
    Text(String),
    Socket(SocketAddr),
    Ip(IpAddr),
    /// Nothing usable (e.g. a socket without a peer)
    Unknown,
}

impl From<&str> for Remote {
    fn from(s: &str) -> Self {
        Remote::Text(s.to_string())
    }
}

impl From<String> for Remote {
    fn from(s: String) -> Self {
        Remote::Text(s)
    }
}

impl From<SocketAddr> for Remote {
    fn from(addr: SocketAddr) -> Self {
        Remote::Socket(addr)
    }
}

impl From<IpAddr> for Remote {
    fn from(ip: IpAddr) -> Self {
        Remote::Ip(ip)
    }
}

impl From<&TcpStream> for Remote {
    fn from(stream: &TcpStream) -> Self {
        stream
            .peer_addr()
            .map(Remote::Socket)
            .unwrap_or(Remote::Unknown)
    }
}

impl Event {
    /// Create an event of type `type_of` (empty means `"unknown"`)
    pub fn new(env: &Arc<Environment>, type_of: impl Into<String>) -> Self {
        let mut type_of = type_of.into();
        if type_of.is_empty() {
            type_of = UNKNOWN_TYPE.to_string();
        }

        Self {
            env: Arc::clone(env),
            time: Utc::now(),
            id: env.next_id(),
            inet: env.local_addr().to_string(),
            subject: String::new(),
            remote_addr: String::new(),
            remote_port: 0,
            region: String::new(),
            from: String::new(),
            type_of,
            user: String::new(),
            auth: String::new(),
            msg: String::new(),
            error: None,
            alert: false,
            upload: false,
            level: Level::Notice,
        }
    }

    /// Create an event and apply builder steps in order
    pub fn with_options(
        env: &Arc<Environment>,
        type_of: impl Into<String>,
        opts: impl IntoIterator<Item = EventOption>,
    ) -> Self {
        opts.into_iter()
            .fold(Self::new(env, type_of), |ev, opt| opt(ev))
    }

    /// A `"logger"` event reporting an error
    pub fn errorf(env: &Arc<Environment>, msg: impl fmt::Display) -> Self {
        Self::new(env, "logger")
            .with_subject("error found")
            .with_msg(msg)
    }

    /// A `"logger"` event carrying debug output
    pub fn debug(env: &Arc<Environment>, msg: impl fmt::Display) -> Self {
        Self::new(env, "logger")
            .with_subject("debug info")
            .with_msg(msg)
            .with_from("vela-inline")
    }

    /// Turn a panic payload into a reportable event
    ///
    /// Accepts what `std::panic::catch_unwind` or `JoinError::into_panic`
    /// hands back. The message carries the panic text and a backtrace.
    pub fn from_panic(env: &Arc<Environment>, payload: &(dyn Any + Send)) -> Self {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let trace = std::backtrace::Backtrace::force_capture();

        Self::new(env, "panic")
            .with_subject("process panic")
            .with_msg(format!("{}\n{}", reason, trace))
            .with_level(Level::High)
    }

    pub fn with_subject(mut self, subject: impl fmt::Display) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn with_msg(mut self, msg: impl fmt::Display) -> Self {
        self.msg = msg.to_string();
        self
    }

    /// Originating task or component
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = auth.into();
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Numeric severity, see [`Level::from_code`]
    pub fn with_level_code(self, code: i64) -> Self {
        self.with_level(Level::from_code(code))
    }

    /// Mark the event as wanting attention
    pub fn with_alert(mut self) -> Self {
        self.alert = true;
        self
    }

    /// Attach an error, replacing any previous one
    pub fn with_error(mut self, err: impl Into<BoxError>) -> Self {
        self.error = Some(err.into());
        self
    }

    /// Override the type tag set at construction
    pub fn with_typeof(mut self, type_of: impl Into<String>) -> Self {
        self.type_of = type_of.into();
        self
    }

    /// Override the looked-up region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the peer port; 0 clears it
    pub fn with_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    /// Set the peer endpoint
    ///
    /// Invalid IP literals leave the address untouched. A valid address
    /// triggers a region lookup; lookup failures are only logged.
    pub fn with_remote(mut self, remote: impl Into<Remote>) -> Self {
        match remote.into() {
            Remote::Socket(addr) => {
                self.set_remote_ip(addr.ip());
                self.set_remote_port(addr.port());
            }
            Remote::Ip(ip) => self.set_remote_ip(ip),
            Remote::Text(text) => self.parse_remote(&text),
            Remote::Unknown => {}
        }
        self
    }

    fn parse_remote(&mut self, text: &str) {
        if let Ok(addr) = text.parse::<SocketAddr>() {
            self.set_remote_ip(addr.ip());
            self.set_remote_port(addr.port());
            return;
        }
        if let Ok(ip) = text.parse::<IpAddr>() {
            self.set_remote_ip(ip);
            return;
        }

        // `host:port` where only one half is valid: keep that half
        if let Some((host, port)) = text.rsplit_once(':') {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = host.parse::<IpAddr>() {
                self.set_remote_ip(ip);
            }
            if let Ok(port) = port.parse::<u16>() {
                self.set_remote_port(port);
            }
        }
    }

    fn set_remote_ip(&mut self, ip: IpAddr) {
        self.remote_addr = ip.to_string();
        match self.env.lookup_region(ip) {
            Ok(region) => self.region = region.to_string(),
            Err(e) => tracing::debug!(
                event_id = %self.id,
                remote_addr = %self.remote_addr,
                error = %e,
                "Region lookup failed"
            ),
        }
    }

    fn set_remote_port(&mut self, port: u16) {
        if port != 0 {
            self.remote_port = port;
        }
    }

    /// Write the event to the process log
    ///
    /// Only events with an attached error are logged, and only when the
    /// environment runs in worker mode.
    pub fn log(self) -> Self {
        let Some(err) = &self.error else {
            return self;
        };
        if self.env.mode() != RunMode::Worker {
            return self;
        }

        tracing::error!(
            time = %self.time,
            node_id = %self.id,
            inet = %self.inet,
            subject = %self.subject,
            remote_addr = %self.remote_addr,
            remote_port = self.remote_port,
            region = %self.region,
            from = %self.from,
            type_of = %self.type_of,
            user = %self.user,
            auth = %self.auth,
            error = %err,
            alert = self.alert,
            level = %self.level,
            "{}",
            self.msg
        );
        self
    }

    /// Finalize the event and hand it to the dispatcher
    ///
    /// Enforces the message cap, marks the event for upload and runs the
    /// dispatch pipeline. Failures inside the pipeline are logged, never
    /// returned.
    pub async fn put(mut self, dispatcher: &AuditDispatcher) {
        self.check();
        self.upload = true;
        dispatcher.handle(self).await;
    }

    /// Truncate an oversize message and attach the reason
    fn check(&mut self) {
        let len = self.msg.len();
        if len <= MAX_MSG_BYTES {
            return;
        }

        let mut cut = MAX_MSG_BYTES;
        while !self.msg.is_char_boundary(cut) {
            cut -= 1;
        }
        self.msg.truncate(cut);

        let err = match self.error.take() {
            Some(cause) => AuditError::MessageTooLongWith {
                cause,
                len,
                limit: MAX_MSG_BYTES,
            },
            None => AuditError::MessageTooLong {
                len,
                limit: MAX_MSG_BYTES,
            },
        };
        self.error = Some(Box::new(err));
    }

    pub(crate) fn set_alert(&mut self, alert: bool) {
        self.alert = alert;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn inet(&self) -> &str {
        &self.inet
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Originating task or program
    pub fn task(&self) -> &str {
        &self.from
    }

    pub fn type_of(&self) -> &str {
        &self.type_of
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn auth(&self) -> &str {
        &self.auth
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.error.as_deref()
    }

    pub fn is_alert(&self) -> bool {
        self.alert
    }

    pub fn is_upload(&self) -> bool {
        self.upload
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    fn error_text(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    /// Canonical string projection of a named attribute
    ///
    /// Unknown names yield an empty string.
    pub fn field(&self, name: &str) -> String {
        match name {
            "id" => self.id.clone(),
            "inet" => self.inet.clone(),
            "subject" => self.subject.clone(),
            "remote_addr" => self.remote_addr.clone(),
            "remote_port" => self.remote_port.to_string(),
            "from" => self.from.clone(),
            "typeof" => self.type_of.clone(),
            "user" => self.user.clone(),
            "auth" => self.auth.clone(),
            "msg" => self.msg.clone(),
            "err" => self.error_text(),
            "region" => self.region.clone(),
            "alert" => self.alert.to_string(),
            "up" => self.upload.to_string(),
            "level" => self.level.to_string(),
            "raw" => self.to_string(),
            "time" => self.time.to_rfc3339(),
            _ => String::new(),
        }
    }

    /// Snapshot of the JSON projection
    pub fn record(&self) -> EventRecord {
        EventRecord {
            time: self.time,
            node_id: self.id.clone(),
            inet: self.inet.clone(),
            subject: self.subject.clone(),
            remote_addr: self.remote_addr.clone(),
            remote_port: self.remote_port,
            region: self.region.clone(),
            from: self.from.clone(),
            type_of: self.type_of.clone(),
            user: self.user.clone(),
            auth: self.auth.clone(),
            msg: self.msg.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
            alert: self.alert,
            level: self.level,
        }
    }

    /// Serialized JSON object
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.record()).unwrap_or_else(|e| {
            tracing::warn!(event_id = %self.id, error = %e, "Failed to serialize event");
            Vec::new()
        })
    }

    /// Like [`Event::to_bytes`] but total over a missing event
    pub fn encode(event: Option<&Event>) -> Vec<u8> {
        event.map(Event::to_bytes).unwrap_or_default()
    }

    /// Single human-readable line
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] - {} - {} - {} - {} - {} - {} - {} - {} - {}",
            self.time.to_rfc3339(),
            self.id,
            self.inet,
            self.subject,
            self.remote_addr,
            self.remote_port,
            self.from,
            self.type_of,
            self.user,
            self.auth,
            self.msg
        )
    }
}

/// JSON text of the event
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("typeof", &self.type_of)
            .field("subject", &self.subject)
            .field("from", &self.from)
            .field("alert", &self.alert)
            .field("upload", &self.upload)
            .field("level", &self.level)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish_non_exhaustive()
    }
}

/// The JSON projection of an event
///
/// Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: DateTime<Utc>,
    pub node_id: String,
    pub inet: String,
    pub subject: String,
    pub remote_addr: String,
    pub remote_port: u16,
    pub region: String,
    pub from: String,
    #[serde(rename = "typeof")]
    pub type_of: String,
    pub user: String,
    pub auth: String,
    pub msg: String,
    pub error: Option<String>,
    pub alert: bool,
    pub level: Level,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{IdGenerator, StaticRegions};
    use crate::types::Region;
    use std::error::Error as _;

    struct FixedId(&'static str);

    impl IdGenerator for FixedId {
        fn next_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn env() -> Arc<Environment> {
        Arc::new(
            Environment::builder()
                .ids(FixedId("A"))
                .local_addr("1.2.3.4")
                .region(StaticRegions::new().with(
                    "10.0.0.9".parse().unwrap(),
                    Region::new("CN", "Zhejiang", "Hangzhou", "Telecom"),
                ))
                .build(),
        )
    }

    /// Buffer the fmt subscriber writes into
    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Error-level lines logged while `f` runs
    fn error_lines(f: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        out.lines()
            .filter(|l| l.contains("ERROR"))
            .map(str::to_string)
            .collect()
    }

    fn worker_env() -> Arc<Environment> {
        Arc::new(Environment::builder().mode(RunMode::Worker).build())
    }

    #[test]
    fn test_log_in_worker_mode_with_error() {
        let lines = error_lines(|| {
            Event::new(&worker_env(), "file")
                .with_subject("open failed")
                .with_msg("open /etc/shadow")
                .with_error("permission denied")
                .log();
        });

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("open /etc/shadow"));
        assert!(lines[0].contains("permission denied"));
        assert!(lines[0].contains("type_of=file"));
    }

    #[test]
    fn test_log_skipped_without_error_or_outside_worker() {
        let lines = error_lines(|| {
            Event::new(&worker_env(), "file")
                .with_msg("no error attached")
                .log();
            Event::new(&Arc::new(Environment::default()), "file")
                .with_msg("standalone")
                .with_error("permission denied")
                .log();
        });

        assert!(lines.is_empty());
    }

    #[test]
    fn test_event_creation() {
        let ev = Event::new(&env(), "login");
        assert_eq!(ev.id(), "A");
        assert_eq!(ev.inet(), "1.2.3.4");
        assert_eq!(ev.type_of(), "login");
        assert_eq!(ev.level(), Level::Notice);
        assert!(!ev.is_alert());
        assert!(!ev.is_upload());
        assert!(ev.error().is_none());
    }

    #[test]
    fn test_empty_type_defaults_to_unknown() {
        let ev = Event::new(&env(), "");
        assert_eq!(ev.type_of(), UNKNOWN_TYPE);
    }

    #[test]
    fn test_with_options_applies_in_order() {
        let opts: Vec<EventOption> = vec![
            Box::new(|ev| ev.with_subject("first")),
            Box::new(|ev| ev.with_subject("second").with_user("root")),
        ];
        let ev = Event::with_options(&env(), "ssh", opts);
        assert_eq!(ev.subject(), "second");
        assert_eq!(ev.user(), "root");
    }

    #[test]
    fn test_remote_host_port() {
        let ev = Event::new(&env(), "ssh").with_remote("10.0.0.9:2222");
        assert_eq!(ev.remote_addr(), "10.0.0.9");
        assert_eq!(ev.remote_port(), 2222);
        assert_eq!(ev.region(), "CN|Zhejiang|Hangzhou|Telecom");
    }

    #[test]
    fn test_remote_bare_ip_and_v6() {
        let ev = Event::new(&env(), "ssh").with_remote("192.168.1.1");
        assert_eq!(ev.remote_addr(), "192.168.1.1");
        assert_eq!(ev.remote_port(), 0);
        // region lookup failed, stays empty
        assert_eq!(ev.region(), "");

        let ev = Event::new(&env(), "ssh").with_remote("[::1]:443");
        assert_eq!(ev.remote_addr(), "::1");
        assert_eq!(ev.remote_port(), 443);
    }

    #[test]
    fn test_remote_invalid_ip_is_ignored() {
        let ev = Event::new(&env(), "ssh").with_remote("not-an-ip");
        assert_eq!(ev.remote_addr(), "");
        assert_eq!(ev.region(), "");

        let ev = Event::new(&env(), "ssh").with_remote("999.1.1.1:70000");
        assert_eq!(ev.remote_addr(), "");
        assert_eq!(ev.remote_port(), 0);
    }

    #[test]
    fn test_remote_valid_ip_with_bad_port_keeps_address() {
        let ev = Event::new(&env(), "ssh").with_remote("10.0.0.9:70000");
        assert_eq!(ev.remote_addr(), "10.0.0.9");
        assert_eq!(ev.remote_port(), 0);
        assert_eq!(ev.region(), "CN|Zhejiang|Hangzhou|Telecom");

        let ev = Event::new(&env(), "ssh").with_remote("10.0.0.9:ssh");
        assert_eq!(ev.remote_addr(), "10.0.0.9");
        assert_eq!(ev.remote_port(), 0);

        let ev = Event::new(&env(), "ssh").with_remote("[::1]:https");
        assert_eq!(ev.remote_addr(), "::1");
    }

    #[test]
    fn test_remote_bad_host_with_valid_port_keeps_port() {
        let ev = Event::new(&env(), "ssh").with_remote("gateway.local:2222");
        assert_eq!(ev.remote_addr(), "");
        assert_eq!(ev.remote_port(), 2222);
    }

    #[test]
    fn test_remote_socket_addr() {
        let addr: SocketAddr = "10.0.0.9:80".parse().unwrap();
        let ev = Event::new(&env(), "http").with_remote(addr);
        assert_eq!(ev.remote_addr(), "10.0.0.9");
        assert_eq!(ev.remote_port(), 80);
        assert_eq!(ev.region(), "CN|Zhejiang|Hangzhou|Telecom");
    }

    #[test]
    fn test_field_projection() {
        let ev = Event::new(&env(), "login")
            .with_subject("ssh login")
            .with_remote("10.0.0.9:22")
            .with_from("sshd")
            .with_user("root")
            .with_auth("password")
            .with_msg("accepted")
            .with_level_code(2)
            .with_alert();

        assert_eq!(ev.field("id"), "A");
        assert_eq!(ev.field("inet"), "1.2.3.4");
        assert_eq!(ev.field("subject"), "ssh login");
        assert_eq!(ev.field("remote_addr"), "10.0.0.9");
        assert_eq!(ev.field("remote_port"), "22");
        assert_eq!(ev.field("from"), "sshd");
        assert_eq!(ev.field("typeof"), "login");
        assert_eq!(ev.field("user"), "root");
        assert_eq!(ev.field("auth"), "password");
        assert_eq!(ev.field("msg"), "accepted");
        assert_eq!(ev.field("err"), "");
        assert_eq!(ev.field("alert"), "true");
        assert_eq!(ev.field("up"), "false");
        assert_eq!(ev.field("level"), "high");
        assert_eq!(ev.field("nope"), "");
        assert!(ev.field("raw").starts_with('{'));
        assert_eq!(ev.field("time"), ev.time().to_rfc3339());
    }

    #[test]
    fn test_field_is_idempotent() {
        let ev = Event::new(&env(), "login").with_msg("x").with_error("boom");
        for name in ["id", "msg", "err", "raw", "time", "alert"] {
            assert_eq!(ev.field(name), ev.field(name));
        }
        assert_eq!(ev.field("err"), "boom");
    }

    #[test]
    fn test_json_key_order() {
        let ev = Event::new(&env(), "login").with_msg("hi");
        let json = String::from_utf8(ev.to_bytes()).unwrap();

        let keys = [
            "time", "node_id", "inet", "subject", "remote_addr", "remote_port", "region",
            "from", "typeof", "user", "auth", "msg", "error", "alert", "level",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{}\":", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"error\":null"));
    }

    #[test]
    fn test_json_roundtrip() {
        let ev = Event::new(&env(), "login")
            .with_subject("s")
            .with_remote("10.0.0.9:22")
            .with_from("f")
            .with_user("u")
            .with_auth("a")
            .with_msg("m")
            .with_error("e")
            .with_alert()
            .with_level(Level::Disaster);

        let parsed: EventRecord = serde_json::from_slice(&ev.to_bytes()).unwrap();
        assert_eq!(parsed, ev.record());
        assert_eq!(parsed.node_id, ev.id());
        assert_eq!(parsed.time, ev.time());
        assert_eq!(parsed.remote_port, 22);
        assert_eq!(parsed.type_of, "login");
        assert_eq!(parsed.error.as_deref(), Some("e"));
        assert!(parsed.alert);
        assert_eq!(parsed.level, Level::Disaster);
    }

    #[test]
    fn test_encode_missing_event_is_empty() {
        assert!(Event::encode(None).is_empty());
        let ev = Event::new(&env(), "x");
        assert_eq!(Event::encode(Some(&ev)), ev.to_bytes());
    }

    #[test]
    fn test_oversize_message_truncated() {
        let mut ev = Event::new(&env(), "x").with_msg("a".repeat(5000));
        ev.check();
        assert_eq!(ev.msg().len(), MAX_MSG_BYTES);
        assert!(ev.error().unwrap().to_string().contains("too long"));
    }

    #[test]
    fn test_oversize_message_chains_existing_error() {
        let mut ev = Event::new(&env(), "x")
            .with_msg("a".repeat(5000))
            .with_error("disk full");
        ev.check();
        assert_eq!(ev.msg().len(), MAX_MSG_BYTES);

        let err = ev.error().unwrap();
        assert!(err.to_string().starts_with("disk full"));
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn test_message_at_cap_untouched() {
        let mut ev = Event::new(&env(), "x").with_msg("a".repeat(MAX_MSG_BYTES));
        ev.check();
        assert_eq!(ev.msg().len(), MAX_MSG_BYTES);
        assert!(ev.error().is_none());
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // 3-byte characters: 4096 is not a boundary
        let mut ev = Event::new(&env(), "x").with_msg("中".repeat(2000));
        ev.check();
        assert_eq!(ev.msg().len(), 4095);
        assert!(ev.error().is_some());
    }

    #[test]
    fn test_convenience_constructors() {
        let ev = Event::errorf(&env(), format_args!("code {}", 7));
        assert_eq!(ev.type_of(), "logger");
        assert_eq!(ev.subject(), "error found");
        assert_eq!(ev.msg(), "code 7");

        let ev = Event::debug(&env(), "trace");
        assert_eq!(ev.task(), "vela-inline");
    }

    #[test]
    fn test_from_panic() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        let ev = Event::from_panic(&env(), payload.as_ref());
        assert_eq!(ev.subject(), "process panic");
        assert!(ev.msg().starts_with("kaboom"));
    }

    #[test]
    fn test_to_line() {
        let ev = Event::new(&env(), "login").with_user("root");
        let line = ev.to_line();
        assert!(line.contains("[A]"));
        assert!(line.contains("- login - root -"));
    }
}
