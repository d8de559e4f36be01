//! Source ingestion: line numbering, comment stripping and tokenizing.
//!
//! Commas and whitespace both separate tokens. Whitespace inside a bracketed
//! operand is dropped, so `[ r1 ]` and `[r1]` produce the same token.

/// A raw source line with its 1-indexed line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-indexed line number.
    pub number: usize,
    /// Line text without the trailing newline.
    pub text: String,
}

/// Splits `source` into numbered lines.
#[must_use]
pub fn split_lines(source: &str) -> Vec<SourceLine> {
    source
        .lines()
        .enumerate()
        .map(|(idx, text)| SourceLine {
            number: idx + 1,
            text: text.to_string(),
        })
        .collect()
}

/// Returns `line` without its trailing `;` comment.
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    line.find(';').map_or(line, |pos| &line[..pos])
}

/// Splits a comment-free line into tokens.
#[must_use]
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_bracket = false;

    for ch in line.chars() {
        match ch {
            '[' => {
                in_bracket = true;
                current.push(ch);
            }
            ']' => {
                in_bracket = false;
                current.push(ch);
            }
            c if c.is_whitespace() && in_bracket => {}
            c if c.is_whitespace() || c == ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
