//! Text-level helpers for the MAP format: comment stripping, brace block
//! splitting, and quote-aware line tokenizing.

pub fn remove_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_comment = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push('\n');
            }
            continue;
        }
        if ch == '/' && chars.peek() == Some(&'/') {
            chars.next();
            in_comment = true;
            continue;
        }
        out.push(ch);
    }
    out
}

/// Returns the trimmed contents of every top-level `open ... close` region.
///
/// Blocks that never close are dropped. A close delimiter at depth zero is
/// ignored rather than driving the depth negative. Delimiters inside a quoted
/// string do not count; a quote left open ends at the line break.
pub fn split_into_blocks(text: &str, open: char, close: char) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut block_start = 0usize;
    let mut in_quotes = false;
    for (index, ch) in text.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == '\n' {
            in_quotes = false;
        } else if in_quotes {
            continue;
        } else if ch == open {
            if depth == 0 {
                block_start = index + ch.len_utf8();
            }
            depth += 1;
        } else if ch == close {
            if depth == 0 {
                continue;
            }
            depth -= 1;
            if depth == 0 {
                let block = text[block_start..index].trim();
                if !block.is_empty() {
                    blocks.push(block.to_string());
                }
            }
        }
    }
    blocks
}

pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        if ch == '"' {
            if in_quotes {
                current.push(ch);
                tokens.push(std::mem::take(&mut current));
                in_quotes = false;
            } else {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                current.push(ch);
                in_quotes = true;
            }
        } else if is_whitespace(ch) && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub fn is_quoted(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('"') && token.ends_with('"')
}

/// Strips one pair of surrounding double quotes, if both are present.
pub fn strip_quotes(token: &str) -> &str {
    if is_quoted(token) {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

pub(crate) fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}
