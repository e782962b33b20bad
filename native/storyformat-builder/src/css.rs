//! Structural CSS minifier.
//!
//! Token-aware but not a full parser: comments, strings and `url(...)` are
//! recognised so their contents are never touched; everything else is a
//! whitespace problem.

/// Characters that never need whitespace before them.
fn tight_before(c: char, depth: usize) -> bool {
    matches!(c, '{' | '}' | ';' | ',' | '>' | '~' | ')' | '!') || (c == '+' && depth == 0)
}

/// Characters that never need whitespace after them.
fn tight_after(c: char, depth: usize) -> bool {
    matches!(c, '{' | '}' | ';' | ',' | '>' | '~' | ':' | '(' | '/') || (c == '+' && depth == 0)
}

/// Minifies a stylesheet.
pub fn minify(source: &str) -> String {
    minify_from(source, Vec::new())
}

/// Minifies a bare declaration list, such as a `style` attribute value.
pub fn minify_declarations(source: &str) -> String {
    minify_from(source, vec![true])
}

struct Writer {
    out: String,
    pending_space: bool,
    /// `(` nesting; `+` is only tight outside `calc()` and friends.
    parens: usize,
    /// Open `{` blocks; `true` for declaration blocks, `false` for rule
    /// containers such as `@media`.
    blocks: Vec<bool>,
    /// Start of the text after the last `{`, `}` or `;`.
    segment_start: usize,
}

impl Writer {
    fn flush_space(&mut self, next: char) {
        if !self.pending_space {
            return;
        }
        self.pending_space = false;
        let Some(prev) = self.out.chars().last() else {
            return;
        };
        if tight_after(prev, self.parens) || tight_before(next, self.parens) {
            return;
        }
        if next == ':' && self.in_property_name() {
            return;
        }
        self.out.push(' ');
    }

    /// True when the current segment is a bare property name inside a
    /// declaration block. Anywhere else a space before `:` is a descendant
    /// combinator.
    fn in_property_name(&self) -> bool {
        self.blocks.last() == Some(&true)
            && self.out[self.segment_start..]
                .chars()
                .all(|ch| ch.is_alphanumeric() || ch == '-' || ch == '_')
    }

    fn push(&mut self, c: char) {
        match c {
            '(' => self.parens += 1,
            ')' => self.parens = self.parens.saturating_sub(1),
            '{' => {
                let declarations = !is_rule_container(&self.out[self.segment_start..]);
                self.blocks.push(declarations);
            }
            '}' => {
                self.blocks.pop();
                if self.out.ends_with(';') {
                    self.out.pop();
                }
            }
            _ => {}
        }
        self.out.push(c);
        if matches!(c, '{' | '}' | ';') {
            self.segment_start = self.out.len();
        }
    }
}

/// At-rules whose blocks hold rules rather than declarations.
fn is_rule_container(prelude: &str) -> bool {
    let Some(rest) = prelude.trim_start().strip_prefix('@') else {
        return false;
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(
        name.as_str(),
        "media" | "supports" | "document" | "layer" | "container" | "scope" | "starting-style"
    ) || name.ends_with("keyframes")
}

fn minify_from(source: &str, blocks: Vec<bool>) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut w = Writer {
        out: String::with_capacity(source.len()),
        pending_space: false,
        parens: 0,
        blocks,
        segment_start: 0,
    };
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let end = find_comment_end(&chars, i + 2);
            if chars.get(i + 2) == Some(&'!') {
                w.flush_space('/');
                w.out.extend(&chars[i..end]);
            } else {
                w.pending_space = true;
            }
            i = end;
            continue;
        }

        if c.is_whitespace() {
            w.pending_space = true;
            i += 1;
            continue;
        }

        w.flush_space(c);

        if c == '"' || c == '\'' {
            let end = find_string_end(&chars, i + 1, c);
            w.out.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if starts_with_url(&chars, i) {
            let end = find_url_end(&chars, i + 4);
            w.out.extend(&chars[i..end]);
            i = end;
            continue;
        }

        w.push(c);
        i += 1;
    }
    w.out
}

/// Index just past the closing `*/`, or the end of input.
fn find_comment_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past the closing quote, honouring backslash escapes.
fn find_string_end(chars: &[char], from: usize, quote: char) -> usize {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn starts_with_url(chars: &[char], i: usize) -> bool {
    if i + 4 > chars.len() {
        return false;
    }
    let head: String = chars[i..i + 4].iter().collect();
    let preceded_by_ident = i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '-');
    head.eq_ignore_ascii_case("url(") && !preceded_by_ident
}

/// Index just past the `)` closing a `url(`, skipping quoted contents.
fn find_url_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '"' | '\'' => i = find_string_end(chars, i + 1, chars[i]),
            ')' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}
