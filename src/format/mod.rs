// Log format compiler: turns a printf-style line template into a structural
// line matcher built on a regex-automata meta regex.

use regex_automata::meta::Regex;
use tracing::debug;

use crate::error::{DecodeError, FormatError};
use crate::record::{LogRecord, RawRecord, SCHEMA_FIELDS};

pub mod template;

pub use template::{FieldOrigin, LineTemplate, Placeholder, Token};

/// Gunicorn's default access log format with `%(D)s` appended
pub const DEFAULT_LOG_FORMAT: &str =
    r#"%(h)s %(l)s %(u)s %(t)s "%(r)s" %(s)s %(b)s "%(f)s" "%(a)s" %(D)s"#;

/// Compiled, immutable line matcher.
///
/// A line matches when it consists of an arbitrary prefix (syslog decoration
/// added by a log shipper), one space, and then the template body up to the
/// end of the line. Each placeholder captures greedily, leftmost first.
#[derive(Debug)]
pub struct LineMatcher {
    regex: Regex,
    /// Capture identifiers in template order; slot `i` is capture group `i + 1`
    slots: Vec<String>,
    pattern: String,
}

impl LineMatcher {
    /// Parse and compile `template` in one step
    pub fn new(template: &str) -> Result<Self, FormatError> {
        LineTemplate::parse(template)?.compile()
    }

    /// Regular expression the template compiled to
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Schema fields this template never captures. Decoding with such a
    /// matcher fails for every line with `DecodeError::MissingField`.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        SCHEMA_FIELDS
            .iter()
            .copied()
            .filter(|name| !self.slots.iter().any(|slot| slot == name))
            .collect()
    }

    /// Structural match of one line, without the trailing newline
    pub fn captures<'a>(&'a self, line: &'a str) -> Option<RawRecord<'a>> {
        let mut caps = self.regex.create_captures();
        self.regex.captures(line, &mut caps);
        if !caps.is_match() {
            return None;
        }

        let fields = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, ident)| {
                caps.get_group(index + 1).map(|span| (ident.as_str(), &line[span.range()]))
            })
            .collect();
        Some(RawRecord::new(fields))
    }

    /// Match and decode one line. A trailing `\n` or `\r\n` is ignored.
    pub fn decode(&self, line: &str) -> Result<LogRecord, DecodeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let raw = self.captures(line).ok_or(DecodeError::NoMatch)?;
        LogRecord::from_raw(&raw)
    }

    /// Same as [`LineMatcher::decode`] for raw bytes read from a file
    pub fn decode_bytes(&self, line: &[u8]) -> Result<LogRecord, DecodeError> {
        let line = std::str::from_utf8(line).map_err(|_| DecodeError::NonUtf8)?;
        self.decode(line)
    }
}

impl LineTemplate {
    /// Build the line matcher for this template.
    ///
    /// `%(t)s` is matched inside `[` `]`. When the template already places
    /// literal brackets right around it, those brackets are reused and no
    /// second pair is added.
    pub fn compile(&self) -> Result<LineMatcher, FormatError> {
        let pattern = build_pattern(self.tokens());
        let regex = Regex::new(&pattern).map_err(Box::new)?;
        let slots: Vec<String> = self.placeholders().map(Placeholder::ident).collect();

        debug!(template = self.source(), %pattern, fields = slots.len(), "Compiled log format");

        Ok(LineMatcher { regex, slots, pattern })
    }
}

fn build_pattern(tokens: &[Token]) -> String {
    let mut body = String::new();

    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(text) => regex_syntax::escape_into(text, &mut body),
            Token::Field(placeholder) if placeholder.is_timestamp() => {
                // WHY: timestamps contain spaces, so the brackets anchor the capture;
                // they are only added when the template does not already supply both
                if is_bracketed(tokens, index) {
                    body.push_str("(.*)");
                } else {
                    body.push_str(r"\[(.*)\]");
                }
            }
            Token::Field(_) => body.push_str("(.*)"),
        }
    }

    format!("^.* {body}$")
}

fn is_bracketed(tokens: &[Token], index: usize) -> bool {
    let opens = index
        .checked_sub(1)
        .and_then(|prev| tokens.get(prev))
        .is_some_and(|token| matches!(token, Token::Literal(text) if text.ends_with('[')));
    let closes = tokens
        .get(index + 1)
        .is_some_and(|token| matches!(token, Token::Literal(text) if text.starts_with(']')));
    opens && closes
}
