//! Placeholder containers inside template strings.
//!
//! A container is a `${...}$` span. Containers do not nest: when an opener
//! appears before the previous one has closed, the innermost span is the
//! container and the outer text is left alone until a later pass.

pub const OPEN: &str = "${";
pub const CLOSE: &str = "}$";

/// One `${...}$` span located in a source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container<'a> {
    /// Byte offset of the opening `${`.
    pub start: usize,
    /// Byte offset just past the closing `}$`.
    pub end: usize,
    pub body: &'a str,
}

impl Container<'_> {
    /// `source` with this container replaced by `value`.
    #[must_use]
    pub fn substitute(&self, source: &str, value: &str) -> String {
        let mut out = String::with_capacity(source.len() - (self.end - self.start) + value.len());
        out.push_str(&source[..self.start]);
        out.push_str(value);
        out.push_str(&source[self.end..]);
        out
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Entry<'_>> {
        entries(self.body)
    }
}

/// One alternative inside a container body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    /// A bare variable name.
    Variable(&'a str),
    /// A parenthesized S-expression.
    Expression(&'a str),
}

/// All containers in `source`, left to right.
#[must_use]
pub fn containers(source: &str) -> Vec<Container<'_>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(rel) = source[pos..].find(OPEN) {
        let body_start = pos + rel + OPEN.len();
        let Some(close_rel) = source[body_start..].find(CLOSE) else {
            break;
        };
        let close = body_start + close_rel;
        // Narrowest span: the last opener before this close.
        let start = match source[body_start..close].rfind(OPEN) {
            Some(inner) => body_start + inner,
            None => body_start - OPEN.len(),
        };
        out.push(Container {
            start,
            end: close + CLOSE.len(),
            body: &source[start + OPEN.len()..close],
        });
        pos = close + CLOSE.len();
    }
    out
}

/// Whether `source` contains no placeholder containers.
#[must_use]
pub fn is_final(source: &str) -> bool {
    containers(source).is_empty()
}

/// Whether every `${` is closed by a later `}$` and no `}$` appears unopened.
#[must_use]
pub fn is_balanced(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(OPEN.as_bytes()) {
            depth += 1;
            i += OPEN.len();
        } else if bytes[i..].starts_with(CLOSE.as_bytes()) {
            if depth == 0 {
                return false;
            }
            depth -= 1;
            i += CLOSE.len();
        } else {
            i += 1;
        }
    }
    depth == 0
}

/// Split on commas that are outside parentheses and quotes. Entries are
/// trimmed; empty entries are dropped.
#[must_use]
pub fn split_entries(body: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                out.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&body[start..]);
    out.into_iter().map(str::trim).filter(|e| !e.is_empty()).collect()
}

#[must_use]
pub fn entries(body: &str) -> Vec<Entry<'_>> {
    split_entries(body)
        .into_iter()
        .map(|e| {
            if e.starts_with('(') {
                Entry::Expression(e)
            } else {
                Entry::Variable(e)
            }
        })
        .collect()
}

/// Number of filled-in characters: the letters and digits outside
/// containers.
#[must_use]
pub fn fill_score(source: &str) -> usize {
    let mut score = 0;
    let mut pos = 0;
    let count = |s: &str| {
        s.chars().filter(|c| c.is_alphanumeric()).count()
    };
    for container in containers(source) {
        score += count(&source[pos..container.start]);
        pos = container.end;
    }
    score + count(&source[pos..])
}

/// Whether some container in `source` refers to `variable`, either as a
/// bare entry or as an atom of an expression entry.
#[must_use]
pub fn references(source: &str, variable: &str) -> bool {
    containers(source).iter().any(|c| {
        c.entries().into_iter().any(|entry| match entry {
            Entry::Variable(name) => name == variable,
            Entry::Expression(expr) => expr
                .split(|ch: char| ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | '\''))
                .any(|atom| atom == variable),
        })
    })
}
