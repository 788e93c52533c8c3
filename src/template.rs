//! Fingerprint templates
//!
//! A template such as `"$inet_$id_$typeof_$from"` is compiled once into an
//! ordered list of steps. Each step is either literal text or a field
//! accessor; rendering concatenates the steps against an event.
//!
//! Placeholders are matched longest-first against a fixed token table. A
//! `$` that starts no known token is kept as literal text, so compilation
//! never fails.

use crate::event::Event;
use std::borrow::Cow;
use std::fmt;

/// Timestamp layout used by `$time`
pub const TIME_LAYOUT: &str = "%Y-%m-%d.%H:%M:%S";

/// A recognized `$` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Id,
    Inet,
    From,
    User,
    Auth,
    Typeof,
    Level,
    Alert,
    Upload,
    Region,
    Time,
    Msg,
    Err,
    Subject,
    RemoteAddr,
    RemotePort,
}

/// Token table, longest tokens first
const TOKENS: &[(&str, Placeholder)] = &[
    ("$remote_addr", Placeholder::RemoteAddr),
    ("$remote_port", Placeholder::RemotePort),
    ("$subject", Placeholder::Subject),
    ("$typeof", Placeholder::Typeof),
    ("$upload", Placeholder::Upload),
    ("$region", Placeholder::Region),
    ("$level", Placeholder::Level),
    ("$alert", Placeholder::Alert),
    ("$inet", Placeholder::Inet),
    ("$from", Placeholder::From),
    ("$user", Placeholder::User),
    ("$auth", Placeholder::Auth),
    ("$time", Placeholder::Time),
    ("$msg", Placeholder::Msg),
    ("$err", Placeholder::Err),
    ("$id", Placeholder::Id),
];

impl Placeholder {
    /// Longest placeholder at the start of `input`, with its token length
    fn match_prefix(input: &str) -> Option<(Placeholder, usize)> {
        TOKENS
            .iter()
            .find(|(token, _)| input.starts_with(token))
            .map(|(token, placeholder)| (*placeholder, token.len()))
    }

    /// The token text, `$` included
    pub fn token(&self) -> &'static str {
        TOKENS
            .iter()
            .find(|(_, p)| p == self)
            .map(|(token, _)| *token)
            .unwrap_or("$")
    }

    /// Current value of the placeholder on `event`
    pub fn extract<'a>(&self, event: &'a Event) -> Cow<'a, str> {
        match self {
            Placeholder::Id => Cow::Borrowed(event.id()),
            Placeholder::Inet => Cow::Borrowed(event.inet()),
            Placeholder::From => Cow::Borrowed(event.task()),
            Placeholder::User => Cow::Borrowed(event.user()),
            Placeholder::Auth => Cow::Borrowed(event.auth()),
            Placeholder::Typeof => Cow::Borrowed(event.type_of()),
            Placeholder::Level => Cow::Borrowed(event.level().as_str()),
            Placeholder::Alert => Cow::Borrowed(bool_str(event.is_alert())),
            Placeholder::Upload => Cow::Borrowed(bool_str(event.is_upload())),
            Placeholder::Region => Cow::Borrowed(event.region()),
            Placeholder::Time => Cow::Owned(event.time().format(TIME_LAYOUT).to_string()),
            Placeholder::Msg => Cow::Borrowed(event.msg()),
            Placeholder::Err => match event.error() {
                Some(e) => Cow::Owned(e.to_string()),
                None => Cow::Borrowed(""),
            },
            Placeholder::Subject => Cow::Borrowed(event.subject()),
            Placeholder::RemoteAddr => Cow::Borrowed(event.remote_addr()),
            Placeholder::RemotePort => Cow::Owned(event.remote_port().to_string()),
        }
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// One compiled step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Literal(String),
    Field(Placeholder),
}

/// A compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    steps: Vec<Step>,
}

impl Template {
    /// Compile `source`; never fails
    pub fn compile(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut steps = Vec::new();
        let mut literal = String::new();
        let mut rest = source.as_str();

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            rest = &rest[pos..];

            match Placeholder::match_prefix(rest) {
                Some((placeholder, len)) => {
                    if !literal.is_empty() {
                        steps.push(Step::Literal(std::mem::take(&mut literal)));
                    }
                    steps.push(Step::Field(placeholder));
                    rest = &rest[len..];
                }
                None => {
                    literal.push('$');
                    rest = &rest[1..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            steps.push(Step::Literal(literal));
        }

        Self { source, steps }
    }

    /// Render the fingerprint key for `event`
    pub fn render(&self, event: &Event) -> String {
        let mut key = String::with_capacity(self.source.len() + 32);
        for step in &self.steps {
            match step {
                Step::Literal(text) => key.push_str(text),
                Step::Field(placeholder) => key.push_str(&placeholder.extract(event)),
            }
        }
        key
    }

    /// True when no step depends on the event
    pub fn is_constant(&self) -> bool {
        self.steps.iter().all(|s| matches!(s, Step::Literal(_)))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
