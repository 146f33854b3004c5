use crate::error::SqlMapperError;

/// Two-delimiter scanner: finds `open…close` spans and replaces each with a handler's output.
///
/// A delimiter preceded by a backslash is literal text (the backslash is dropped). An open
/// delimiter with no matching close is copied through unchanged, along with the rest of the
/// input. A scanner with an empty delimiter finds no spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenScanner<'d> {
    open: &'d str,
    close: &'d str,
}

/// `#{…}` bind placeholders.
pub const BIND_PLACEHOLDER: TokenScanner<'static> = TokenScanner::new("#{", "}");
/// `${…}` text substitutions.
pub const TEXT_SUBSTITUTION: TokenScanner<'static> = TokenScanner::new("${", "}");

impl<'d> TokenScanner<'d> {
    #[must_use]
    pub const fn new(open: &'d str, close: &'d str) -> Self {
        Self { open, close }
    }

    /// Replace every well-formed span in `text` with `handler(content)`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `handler`.
    pub fn scan<F>(&self, text: &str, mut handler: F) -> Result<String, SqlMapperError>
    where
        F: FnMut(&str) -> Result<String, SqlMapperError>,
    {
        if text.is_empty() {
            return Ok(String::new());
        }
        if self.open.is_empty() || self.close.is_empty() {
            return Ok(text.to_string());
        }
        let Some(mut start) = text.find(self.open) else {
            return Ok(text.to_string());
        };

        let bytes = text.as_bytes();
        let mut offset = 0;
        let mut out = String::with_capacity(text.len());
        let mut content = String::new();

        loop {
            if start > 0 && bytes[start - 1] == b'\\' {
                // escaped open delimiter: drop the backslash, keep the delimiter
                out.push_str(&text[offset..start - 1]);
                out.push_str(self.open);
                offset = start + self.open.len();
            } else {
                content.clear();
                out.push_str(&text[offset..start]);
                offset = start + self.open.len();
                let mut end = find_from(text, self.close, offset);
                while let Some(close_at) = end {
                    if close_at > offset && bytes[close_at - 1] == b'\\' {
                        content.push_str(&text[offset..close_at - 1]);
                        content.push_str(self.close);
                        offset = close_at + self.close.len();
                        end = find_from(text, self.close, offset);
                    } else {
                        content.push_str(&text[offset..close_at]);
                        break;
                    }
                }
                match end {
                    None => {
                        out.push_str(&text[start..]);
                        offset = text.len();
                    }
                    Some(close_at) => {
                        out.push_str(&handler(&content)?);
                        offset = close_at + self.close.len();
                    }
                }
            }
            match find_from(text, self.open, offset) {
                Some(next) => start = next,
                None => break,
            }
        }

        if offset < text.len() {
            out.push_str(&text[offset..]);
        }
        Ok(out)
    }

    /// Whether `text` holds at least one well-formed, unescaped span.
    #[must_use]
    pub fn has_tokens(&self, text: &str) -> bool {
        let mut found = false;
        let _ = self.scan(text, |_| {
            found = true;
            Ok(String::new())
        });
        found
    }
}

fn find_from(text: &str, pattern: &str, from: usize) -> Option<usize> {
    text.get(from..)
        .and_then(|rest| rest.find(pattern))
        .map(|idx| idx + from)
}
