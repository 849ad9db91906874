//! Restricted config document: section headers, `key = value` lines, `#`
//! comments and bracketed lists.
//!
//! Parsing happens in two steps. [`tokenize`] turns the text into a flat
//! token stream; inline lists (`key = [a, b]`) and block lists (`key = [`
//! one element per line `]`) both come out as `ListStart`, `ListItem`...,
//! `ListEnd`. [`Document::from_tokens`] is the only consumer and folds the
//! stream into ordered sections.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Section(String),
    Scalar { key: String, value: String },
    ListStart(String),
    ListItem(String),
    ListEnd,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("list `{key}` opened on line {line} is never closed")]
    UnterminatedList { key: String, line: usize },

    #[error("list item outside of a list")]
    StrayListItem,

    #[error("line {line} is not a section header, assignment or list element: `{text}`")]
    StrayLine { line: usize, text: String },
}

/// A resolved value: either a single string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    entries: Vec<(String, Value)>,
}

/// Parsed document. Sections and entries keep their file order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    sections: Vec<Section>,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        Self::from_tokens(tokenize(text)?)
    }

    pub fn from_tokens<I>(tokens: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = Token>,
    {
        // Assignments before the first header land in an unnamed section.
        let mut sections = Vec::new();
        let mut current = Section::default();
        let mut open_list: Option<(String, Vec<String>)> = None;

        for token in tokens {
            match token {
                Token::Section(name) => {
                    let finished = std::mem::replace(
                        &mut current,
                        Section {
                            name,
                            entries: Vec::new(),
                        },
                    );
                    sections.push(finished);
                }
                Token::Scalar { key, value } => current.entries.push((key, Value::Scalar(value))),
                Token::ListStart(key) => open_list = Some((key, Vec::new())),
                Token::ListItem(item) => match open_list.as_mut() {
                    Some((_, items)) => items.push(item),
                    None => return Err(DocumentError::StrayListItem),
                },
                Token::ListEnd => {
                    if let Some((key, items)) = open_list.take() {
                        current.entries.push((key, Value::List(items)));
                    }
                }
            }
        }
        sections.push(current);

        Ok(Self { sections })
    }

    /// Only the first `[section]` header counts; a repeated header starts a
    /// section that lookups never see.
    fn lookup(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// First scalar assignment of `key` inside `[section]`.
    pub fn scalar(&self, section: &str, key: &str) -> Option<&str> {
        match self.lookup(section, key)? {
            Value::Scalar(v) => Some(v.as_str()),
            Value::List(_) => None,
        }
    }

    pub fn scalar_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.scalar(section, key).unwrap_or(default)
    }

    /// First list assignment of `key` inside `[section]`; a missing key
    /// yields an empty list.
    pub fn list(&self, section: &str, key: &str) -> Vec<String> {
        match self.lookup(section, key) {
            Some(Value::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }
}

/// Split a document into tokens.
pub fn tokenize(text: &str) -> Result<Vec<Token>, DocumentError> {
    let mut tokens = Vec::new();
    let mut block: Option<(String, usize)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();

        if block.is_some() {
            if line.is_empty() {
                continue;
            }
            if let Some(close) = closing_bracket(line) {
                let item = clean_item(&line[..close]);
                if !item.is_empty() {
                    tokens.push(Token::ListItem(item));
                }
                tokens.push(Token::ListEnd);
                block = None;
            } else {
                let item = clean_item(line);
                if !item.is_empty() {
                    tokens.push(Token::ListItem(item));
                }
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') && !line.contains('=') {
            let name = line[1..line.len() - 1].trim();
            tokens.push(Token::Section(name.to_string()));
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(DocumentError::StrayLine {
                line: idx + 1,
                text: line.to_string(),
            });
        };
        let key = key.trim().to_string();
        let value = value.trim();

        match value.strip_prefix('[') {
            Some(rest) => {
                tokens.push(Token::ListStart(key.clone()));
                let rest = rest.trim();
                if let Some(close) = closing_bracket(rest) {
                    tokens.extend(split_inline(&rest[..close]).into_iter().map(Token::ListItem));
                    tokens.push(Token::ListEnd);
                } else {
                    let first = clean_item(rest);
                    if !first.is_empty() {
                        tokens.push(Token::ListItem(first));
                    }
                    block = Some((key, idx + 1));
                }
            }
            None => tokens.push(Token::Scalar {
                key,
                value: unquote(value).to_string(),
            }),
        }
    }

    if let Some((key, line)) = block {
        return Err(DocumentError::UnterminatedList { key, line });
    }

    Ok(tokens)
}

/// Cut a trailing `#` comment that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Byte offset of the `]` that closes the current list: the first one
/// outside quotes that does not pair with an earlier `[`, so character
/// classes such as `*.[ch]` stay inside the element.
fn closing_bracket(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '[') => depth += 1,
            (None, ']') if depth == 0 => return Some(i),
            (None, ']') => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Remove one layer of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Block-list element: trailing comma, then one layer of quotes.
fn clean_item(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed).trim();
    unquote(trimmed).to_string()
}

/// Split the body of an inline list on commas outside quotes.
fn split_inline(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);

    items
        .into_iter()
        .map(|s| unquote(s.trim()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
