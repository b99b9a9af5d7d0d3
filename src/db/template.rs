//! Statement templating: block splitting and `{{field}}` substitution.
//!
//! Substituted values are escaped for the SQL quoting context the placeholder
//! sits in, so a password cannot terminate its literal and inject SQL:
//! - inside `'...'` single quotes are doubled,
//! - inside `"..."` double quotes are doubled,
//! - unquoted, only identifier characters are accepted,
//! - inside `--` or `/* */` comments, placeholders are rejected.

use crate::error::HdbError;
use base64::{Engine, engine::general_purpose::STANDARD};

const SEPARATOR: char = ';';

/// Split one statement block into trimmed, non-empty statements.
///
/// A block may also be a JSON array of statements, optionally base64 encoded.
pub fn split_statements(block: &str) -> Box<dyn Iterator<Item = String> + '_> {
    let decoded = STANDARD
        .decode(block.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let candidate = decoded.as_deref().unwrap_or(block);

    if let Ok(list) = serde_json::from_str::<Vec<String>>(candidate) {
        return Box::new(
            list.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }
    match decoded {
        Some(text) => Box::new(
            text.split(SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        None => Box::new(
            block
                .split(SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        ),
    }
}

/// Where an operation's statement templates come from, decided once per operation.
#[derive(Debug, Clone, Copy)]
pub enum StatementSource<'a> {
    Caller(&'a [String]),
    Builtin(&'static [&'static str]),
}

impl<'a> StatementSource<'a> {
    /// Caller statements when any were given, otherwise the built-in set.
    pub fn resolve(commands: &'a [String], builtin: &'static [&'static str]) -> Self {
        if commands.is_empty() {
            StatementSource::Builtin(builtin)
        } else {
            StatementSource::Caller(commands)
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, StatementSource::Builtin(_))
    }

    pub fn templates(&self) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match *self {
            StatementSource::Caller(commands) => Box::new(commands.iter().map(String::as_str)),
            StatementSource::Builtin(builtin) => Box::new(builtin.iter().copied()),
        }
    }

    /// Split and render every template up front, so a malformed template
    /// fails before anything reaches the database.
    pub fn render(&self, subs: &Substitutions<'_>) -> Result<Vec<String>, HdbError> {
        self.templates()
            .flat_map(split_statements)
            .map(|stmt| subs.render(&stmt))
            .collect()
    }
}

/// Placeholder names a statement template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Username,
    Password,
    Expiration,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Field::Name),
            "username" => Some(Field::Username),
            "password" => Some(Field::Password),
            "expiration" => Some(Field::Expiration),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Username => "username",
            Field::Password => "password",
            Field::Expiration => "expiration",
        }
    }
}

/// Which lifecycle step a set of substitutions belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    PasswordChange,
    ExpirationChange,
    Revocation,
}

impl OperationKind {
    fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "creation",
            OperationKind::PasswordChange => "password change",
            OperationKind::ExpirationChange => "expiration change",
            OperationKind::Revocation => "revocation",
        }
    }
}

/// Values available to the statements of one operation.
///
/// `name` and `username` both resolve to the account identifier. Fields that
/// do not belong to the operation are absent and rejected at render time.
#[derive(Clone, Copy)]
pub struct Substitutions<'a> {
    kind: OperationKind,
    name: &'a str,
    password: Option<&'a str>,
    expiration: Option<&'a str>,
}

impl<'a> Substitutions<'a> {
    pub fn create(name: &'a str, password: &'a str, expiration: &'a str) -> Self {
        Self {
            kind: OperationKind::Create,
            name,
            password: Some(password),
            expiration: Some(expiration),
        }
    }

    pub fn password_change(name: &'a str, password: &'a str) -> Self {
        Self {
            kind: OperationKind::PasswordChange,
            name,
            password: Some(password),
            expiration: None,
        }
    }

    pub fn expiration_change(name: &'a str, expiration: &'a str) -> Self {
        Self {
            kind: OperationKind::ExpirationChange,
            name,
            password: None,
            expiration: Some(expiration),
        }
    }

    pub fn revocation(name: &'a str) -> Self {
        Self {
            kind: OperationKind::Revocation,
            name,
            password: None,
            expiration: None,
        }
    }

    fn value(&self, field: Field) -> Option<&'a str> {
        match field {
            Field::Name | Field::Username => Some(self.name),
            Field::Password => self.password,
            Field::Expiration => self.expiration,
        }
    }

    /// Render one statement, replacing every `{{field}}` placeholder.
    pub fn render(&self, template: &str) -> Result<String, HdbError> {
        let mut out = String::with_capacity(template.len());
        let mut context = Context::Code;
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let (literal, tail) = rest.split_at(start);
            context = context.scan(literal);
            out.push_str(literal);

            let Some(end) = tail.find("}}") else {
                // Unterminated: leave verbatim for the database to reject.
                rest = tail;
                break;
            };
            let raw_name = tail[2..end].trim();
            let field = Field::parse(raw_name).ok_or_else(|| {
                HdbError::Configuration(format!("unknown placeholder {{{{{raw_name}}}}}"))
            })?;
            let value = self.value(field).ok_or_else(|| {
                HdbError::Configuration(format!(
                    "placeholder {{{{{}}}}} is not available in {} statements",
                    field.as_str(),
                    self.kind.as_str()
                ))
            })?;
            out.push_str(&context.escape(field, value)?);
            rest = &tail[end + 2..];
        }

        if matches!(context.scan(rest), Context::Single | Context::Double) {
            return Err(HdbError::Configuration(
                "statement template has an unterminated quote".to_string(),
            ));
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Lexical position inside the template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Code,
    Single,
    Double,
    LineComment,
    BlockComment,
}

impl Context {
    /// State after reading `text` of the template itself. Quotes inside
    /// `-- ...` and `/* ... */` comments do not open literals.
    fn scan(self, text: &str) -> Self {
        let mut state = self;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            state = match (state, c) {
                (Context::Code, '\'') => Context::Single,
                (Context::Code, '"') => Context::Double,
                (Context::Code, '-') if chars.peek() == Some(&'-') => {
                    chars.next();
                    Context::LineComment
                }
                (Context::Code, '/') if chars.peek() == Some(&'*') => {
                    chars.next();
                    Context::BlockComment
                }
                (Context::Single, '\'') | (Context::Double, '"') => Context::Code,
                (Context::LineComment, '\n') => Context::Code,
                (Context::BlockComment, '*') if chars.peek() == Some(&'/') => {
                    chars.next();
                    Context::Code
                }
                (s, _) => s,
            };
        }
        state
    }

    fn escape(self, field: Field, value: &str) -> Result<String, HdbError> {
        match self {
            Context::Single => Ok(value.replace('\'', "''")),
            Context::Double => Ok(value.replace('"', "\"\"")),
            Context::Code => {
                let is_bare = !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#' | '.'));
                if is_bare {
                    Ok(value.to_string())
                } else {
                    Err(HdbError::Validation(format!(
                        "value for {{{{{}}}}} is not a plain identifier and must be quoted",
                        field.as_str()
                    )))
                }
            }
            Context::LineComment | Context::BlockComment => Err(HdbError::Configuration(format!(
                "placeholder {{{{{}}}}} sits inside an SQL comment",
                field.as_str()
            ))),
        }
    }
}

/// Escaped forms `value` takes inside rendered statements.
pub fn escaped_forms(value: &str) -> Vec<String> {
    [value.replace('\'', "''"), value.replace('"', "\"\"")]
        .into_iter()
        .filter(|v| v != value)
        .collect()
}
