// Template scanner: walks a printf-style log format once and emits literal and
// placeholder tokens. Matching is built from these tokens in the parent module.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;

/// Where a placeholder's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOrigin {
    /// Plain directive such as `%(h)s`
    Bare,
    /// `%({name}i)s`
    RequestHeader,
    /// `%({name}o)s`
    ResponseHeader,
    /// `%({name}e)s`
    Environment,
}

impl FieldOrigin {
    fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'i' => Some(Self::RequestHeader),
            'o' => Some(Self::ResponseHeader),
            'e' => Some(Self::Environment),
            _ => None,
        }
    }

    /// Single-letter tag used in the template, `None` for bare fields
    pub fn tag(self) -> Option<char> {
        match self {
            Self::Bare => None,
            Self::RequestHeader => Some('i'),
            Self::ResponseHeader => Some('o'),
            Self::Environment => Some('e'),
        }
    }
}

/// A named field reference inside a line template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    name: String,
    origin: FieldOrigin,
}

impl Placeholder {
    pub fn bare(name: impl Into<String>) -> Self {
        Self { name: name.into(), origin: FieldOrigin::Bare }
    }

    pub fn bracketed(name: impl Into<String>, origin: FieldOrigin) -> Self {
        Self { name: name.into(), origin }
    }

    /// Identifier the captured value is stored under.
    ///
    /// Bare names are kept verbatim. Bracketed names have every character
    /// outside `[A-Za-z0-9_]` replaced by `_` and get `__` plus the origin tag
    /// appended, so `{x-id}i` and `{x-id}o` become `x_id__i` and `x_id__o`.
    pub fn ident(&self) -> String {
        match self.origin.tag() {
            None => self.name.clone(),
            Some(tag) => {
                let mut ident: String = self
                    .name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                    .collect();
                ident.push_str("__");
                ident.push(tag);
                ident
            }
        }
    }

    /// The request timestamp directive, which always gets bracket delimiters
    pub fn is_timestamp(&self) -> bool {
        self.origin == FieldOrigin::Bare && self.name == "t"
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin.tag() {
            None => write!(f, "%({})s", self.name),
            Some(tag) => write!(f, "%({{{}}}{})s", self.name, tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Field(Placeholder),
}

/// Parsed log format: literal fragments interleaved with placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTemplate {
    source: String,
    tokens: Vec<Token>,
}

impl LineTemplate {
    /// Scan `template` into tokens.
    ///
    /// A `%` that does not open `%(` is literal text. Every `%(` must be closed
    /// by `)s`. At least one placeholder is required and identifiers must be
    /// unique.
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut seen = HashSet::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(pos) = rest.find("%(") {
            literal.push_str(&rest[..pos]);
            let start = offset + pos;
            let (placeholder, consumed) = parse_directive(&rest[pos + 2..], start)?;

            if !seen.insert(placeholder.ident()) {
                return Err(FormatError::DuplicateField(placeholder.ident()));
            }
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Field(placeholder));

            let advance = pos + 2 + consumed;
            rest = &rest[advance..];
            offset += advance;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        if seen.is_empty() {
            return Err(FormatError::NoPlaceholders);
        }

        Ok(Self { source: template.to_string(), tokens })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.tokens.iter().filter_map(|token| match token {
            Token::Field(placeholder) => Some(placeholder),
            Token::Literal(_) => None,
        })
    }
}

impl FromStr for LineTemplate {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse the text following `%(` up to and including the closing `)s`.
/// Returns the placeholder and the number of bytes consumed.
fn parse_directive(body: &str, start: usize) -> Result<(Placeholder, usize), FormatError> {
    if let Some(inner) = body.strip_prefix('{') {
        let close = inner.find('}').ok_or_else(|| FormatError::MalformedBracket {
            offset: start,
            directive: body.chars().take_while(|&c| c != ')').collect(),
        })?;
        let name = &inner[..close];
        if name.is_empty() || name.contains('{') {
            return Err(FormatError::MalformedBracket {
                offset: start,
                directive: format!("{{{name}}}"),
            });
        }

        let after = &inner[close + 1..];
        let tag = after.chars().next().filter(|&c| c != ')');
        let origin = tag.and_then(FieldOrigin::from_tag).ok_or_else(|| FormatError::UnknownOrigin {
            name: name.to_string(),
            tag: tag.map(String::from).unwrap_or_default(),
        })?;

        // '{' + name + '}' + tag, all ASCII delimiters
        let directive_len = 1 + close + 1 + 1;
        let consumed = expect_conversion(&body[directive_len..], start)?;
        Ok((Placeholder::bracketed(name, origin), directive_len + consumed))
    } else {
        let close = body.find(')').ok_or(FormatError::Unterminated(start))?;
        let name = &body[..close];
        if name.is_empty() {
            return Err(FormatError::EmptyName(start));
        }
        if name.contains(['{', '}']) {
            return Err(FormatError::MalformedBracket { offset: start, directive: name.to_string() });
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FormatError::InvalidName(name.to_string()));
        }
        let consumed = expect_conversion(&body[close..], start)?;
        Ok((Placeholder::bare(name), close + consumed))
    }
}

fn expect_conversion(rest: &str, start: usize) -> Result<usize, FormatError> {
    if rest.starts_with(")s") {
        Ok(2)
    } else if rest.starts_with(')') {
        Err(FormatError::MissingConversion(start))
    } else {
        Err(FormatError::Unterminated(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scans_literals_and_fields_in_order() {
        let template = LineTemplate::parse(r#"%(h)s - "%(r)s" end"#).unwrap();

        assert_eq!(
            template.tokens(),
            &[
                Token::Field(Placeholder::bare("h")),
                Token::Literal(" - \"".to_string()),
                Token::Field(Placeholder::bare("r")),
                Token::Literal("\" end".to_string()),
            ]
        );
    }

    #[test]
    fn test_bracketed_origins() {
        let template = LineTemplate::parse("%({x-header-in}i)s %({x-header-out}o)s %({VARIABLE}e)s").unwrap();
        let idents: Vec<_> = template.placeholders().map(|p| p.ident()).collect();

        assert_eq!(idents, vec!["x_header_in__i", "x_header_out__o", "VARIABLE__e"]);
    }

    #[test]
    fn test_same_header_in_and_out_do_not_collide() {
        let template = LineTemplate::parse("%({x-request-id}i)s %({x-request-id}o)s").unwrap();
        let idents: Vec<_> = template.placeholders().map(|p| p.ident()).collect();

        assert_eq!(idents.len(), 2);
        assert_ne!(idents[0], idents[1]);
    }

    #[test]
    fn test_lone_percent_is_literal() {
        let template = LineTemplate::parse("100% %(s)s").unwrap();
        assert_eq!(template.tokens()[0], Token::Literal("100% ".to_string()));
    }

    #[test]
    fn test_display_round_trips_directive() {
        assert_eq!(Placeholder::bare("D").to_string(), "%(D)s");
        assert_eq!(
            Placeholder::bracketed("Host", FieldOrigin::RequestHeader).to_string(),
            "%({Host}i)s"
        );
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(matches!(LineTemplate::parse("no fields here"), Err(FormatError::NoPlaceholders)));
        assert!(matches!(LineTemplate::parse(""), Err(FormatError::NoPlaceholders)));
        assert!(matches!(LineTemplate::parse("%(h"), Err(FormatError::Unterminated(0))));
        assert!(matches!(LineTemplate::parse("x %(h)d"), Err(FormatError::MissingConversion(2))));
        assert!(matches!(LineTemplate::parse("%()s"), Err(FormatError::EmptyName(0))));
        assert!(matches!(LineTemplate::parse("%({name)s"), Err(FormatError::MalformedBracket { .. })));
        assert!(matches!(LineTemplate::parse("%({}i)s"), Err(FormatError::MalformedBracket { .. })));
        assert!(matches!(LineTemplate::parse("%(name}i)s"), Err(FormatError::MalformedBracket { .. })));
        assert!(matches!(LineTemplate::parse("%({name}x)s"), Err(FormatError::UnknownOrigin { .. })));
        assert!(matches!(LineTemplate::parse("%({name})s"), Err(FormatError::UnknownOrigin { .. })));
        assert!(matches!(LineTemplate::parse("%(a-b)s"), Err(FormatError::InvalidName(_))));
        assert!(matches!(LineTemplate::parse("%(h)s %(h)s"), Err(FormatError::DuplicateField(_))));
    }
}
