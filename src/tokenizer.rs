//! Line-oriented tokenizer shared by the OBJ and MTL readers.

use std::{io::prelude::*, str::FromStr};

/// Reads a text source line by line and hands out whitespace-delimited tokens.
///
/// The source is held until the last line is consumed (or `close` is called),
/// after which it is dropped.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: Option<R>,
    file_name: Box<str>,
    line_number: usize,
    raw_buffer: Vec<u8>,
    line_buffer: String,
    line_start: usize,
}

impl<R: BufRead> LineReader<R> {
    /// Creates an instance of `LineReader`.
    /// `file_name` is only used for diagnostics.
    pub fn new(reader: R, file_name: impl Into<Box<str>>) -> LineReader<R> {
        LineReader {
            reader: Some(reader),
            file_name: file_name.into(),
            line_number: 0,
            raw_buffer: Vec::with_capacity(1024),
            line_buffer: String::with_capacity(1024),
            line_start: 0,
        }
    }

    /// Returns the file name given on construction.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the number of the current line (1-based, 0 before the first read).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Whether the underlying source has been released.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Advances to the next line.
    /// Returns `false` when the source is exhausted; the source is released at that point.
    /// With `discard_blanks`, empty lines and comment-only lines are skipped.
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    pub fn read_next_line(&mut self, discard_blanks: bool) -> std::io::Result<bool> {
        loop {
            let reader = match self.reader.as_mut() {
                Some(r) => r,
                None => return Ok(false),
            };

            self.raw_buffer.clear();
            let read_size = reader.read_until(b'\n', &mut self.raw_buffer)?;
            if read_size == 0 {
                self.close();
                return Ok(false);
            }
            self.line_number += 1;

            self.line_buffer.clear();
            self.line_buffer
                .push_str(&String::from_utf8_lossy(&self.raw_buffer));

            // Everything after '#' is a comment.
            if let Some(comment_start) = self.line_buffer.find('#') {
                self.line_buffer.truncate(comment_start);
            }
            let content_len = self.line_buffer.trim_end().len();
            let trimmed_len = self.line_buffer[..content_len].trim_start().len();
            self.line_buffer.truncate(content_len);
            self.line_start = content_len - trimmed_len;

            if discard_blanks && trimmed_len == 0 {
                continue;
            }
            return Ok(true);
        }
    }

    /// Returns a token cursor positioned at the start of the current line.
    pub fn tokens(&self) -> Tokens<'_> {
        Tokens {
            rest: &self.line_buffer[self.line_start..],
        }
    }

    /// Releases the underlying source. Further reads report end of input.
    pub fn close(&mut self) {
        self.reader = None;
    }
}

/// Failure to take a value from a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The line ended before the value.
    Missing,

    /// The token could not be parsed.
    Malformed(Box<str>),
}

/// A cursor over the tokens of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    /// Creates a cursor over an arbitrary line.
    pub fn new(line: &'a str) -> Tokens<'a> {
        Tokens {
            rest: line.trim_start(),
        }
    }

    /// Takes the next whitespace-delimited token.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let (token, rest) = split_leading_token(self.rest)?;
        self.rest = rest;
        Some(token)
    }

    /// Takes the next token, lowercased.
    pub fn next_lowercase_token(&mut self) -> Option<String> {
        self.next_token().map(str::to_lowercase)
    }

    /// Takes the next token and parses it.
    pub fn next_value<T: FromStr>(&mut self) -> Result<T, TokenError> {
        let token = self.next_token().ok_or(TokenError::Missing)?;
        token
            .parse()
            .map_err(|_| TokenError::Malformed(token.into()))
    }

    pub fn next_float(&mut self) -> Result<f32, TokenError> {
        self.next_value()
    }

    pub fn next_integer(&mut self) -> Result<i64, TokenError> {
        self.next_value()
    }

    pub fn next_unsigned(&mut self) -> Result<u32, TokenError> {
        self.next_value()
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&self) -> Option<&'a str> {
        peek_leading_token(self.rest)
    }

    /// Returns the unconsumed part of the line.
    pub fn remainder(&self) -> &'a str {
        self.rest
    }

    /// Counts the tokens left on the line without consuming them.
    pub fn remaining_count(&self) -> usize {
        self.rest.split_whitespace().count()
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.next_token()
    }
}

/// Returns the first token of `line` without modifying anything.
pub fn peek_leading_token(line: &str) -> Option<&str> {
    split_leading_token(line).map(|(token, _)| token)
}

fn split_leading_token(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    match line.find(char::is_whitespace) {
        Some(end) => Some((&line[..end], line[end..].trim_start())),
        None => Some((line, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_blank_and_comment_lines() {
        let source = "# header\n\n   \nv 1 2 3\n  # indented comment\nf 1 2 3 # trailing\n";
        let mut reader = LineReader::new(Cursor::new(source), "test.obj");

        assert!(reader.read_next_line(true).unwrap());
        assert_eq!(reader.line_number(), 4);
        assert_eq!(reader.tokens().remainder(), "v 1 2 3");

        assert!(reader.read_next_line(true).unwrap());
        assert_eq!(reader.line_number(), 6);
        assert_eq!(reader.tokens().collect::<Vec<_>>(), vec!["f", "1", "2", "3"]);

        assert!(!reader.read_next_line(true).unwrap());
        assert!(reader.is_closed());
        assert!(!reader.read_next_line(true).unwrap());
    }

    #[test]
    fn replaces_undecodable_bytes() {
        let source: &[u8] = b"# cr\xe9\xe9 par Blender\ng caf\xe9\nv 1 2 3\n";
        let mut reader = LineReader::new(Cursor::new(source), "latin1.obj");

        assert!(reader.read_next_line(true).unwrap());
        assert_eq!(reader.line_number(), 2);
        assert_eq!(
            reader.tokens().collect::<Vec<_>>(),
            vec!["g", "caf\u{FFFD}"]
        );

        assert!(reader.read_next_line(true).unwrap());
        assert_eq!(reader.tokens().remainder(), "v 1 2 3");
    }

    #[test]
    fn keeps_blank_lines_on_request() {
        let mut reader = LineReader::new(Cursor::new("\nv 0 0 0\n"), "blank.obj");
        assert!(reader.read_next_line(false).unwrap());
        assert_eq!(reader.tokens().peek_token(), None);
        assert!(reader.read_next_line(false).unwrap());
        assert_eq!(reader.line_number(), 2);
    }

    #[test]
    fn takes_numbers_and_lowercase_tokens() {
        let mut tokens = Tokens::new("  VN 0.5 -1 7 x");
        assert_eq!(tokens.next_lowercase_token().as_deref(), Some("vn"));
        assert_eq!(tokens.next_float(), Ok(0.5));
        assert_eq!(tokens.next_integer(), Ok(-1));
        assert_eq!(tokens.next_unsigned(), Ok(7));
        assert_eq!(tokens.next_float(), Err(TokenError::Malformed("x".into())));
        assert_eq!(tokens.next_float(), Err(TokenError::Missing));
    }

    #[test]
    fn peeking_does_not_consume() {
        let tokens = Tokens::new("1/2/3 4/5/6");
        assert_eq!(tokens.peek_token(), Some("1/2/3"));
        assert_eq!(tokens.remaining_count(), 2);
        assert_eq!(peek_leading_token(tokens.remainder()), Some("1/2/3"));
        assert_eq!(peek_leading_token("   "), None);
    }
}
