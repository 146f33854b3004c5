/// Parsed content of a `#{…}` placeholder: `property[:jdbcType][, key=value]*` or
/// `(expression)[…]`. Entries keep their first-seen order; a repeated key overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlaceholderOptions {
    entries: Vec<(String, String)>,
}

impl PlaceholderOptions {
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn put(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }
}

/// Parse placeholder content. The error string names the failing position.
pub(crate) fn parse_placeholder(content: &str) -> Result<PlaceholderOptions, String> {
    let bytes = content.as_bytes();
    let mut options = PlaceholderOptions::default();
    let start = skip_ws(bytes, 0);
    let next = if bytes.get(start) == Some(&b'(') {
        expression(content, start + 1, &mut options)?
    } else {
        property(content, start, &mut options)
    };
    driver_type_opt(content, next, &mut options)?;
    Ok(options)
}

fn expression(content: &str, left: usize, options: &mut PlaceholderOptions) -> Result<usize, String> {
    let bytes = content.as_bytes();
    let mut depth = 1;
    let mut right = left;
    while depth > 0 {
        match bytes.get(right) {
            Some(b')') => depth -= 1,
            Some(b'(') => depth += 1,
            Some(_) => {}
            None => return Err(format!("unbalanced parenthesis starting at position {left}")),
        }
        right += 1;
    }
    options.put("expression", content[left..right - 1].to_string());
    Ok(right)
}

fn property(content: &str, left: usize, options: &mut PlaceholderOptions) -> usize {
    if left >= content.len() {
        return left;
    }
    let right = skip_until(content.as_bytes(), left, b",:");
    options.put("property", trimmed(content, left, right).to_string());
    right
}

fn driver_type_opt(content: &str, pos: usize, options: &mut PlaceholderOptions) -> Result<(), String> {
    let bytes = content.as_bytes();
    let pos = skip_ws(bytes, pos);
    match bytes.get(pos) {
        None => Ok(()),
        Some(b':') => driver_type(content, pos + 1, options),
        Some(b',') => option(content, pos + 1, options),
        Some(_) => Err(format!("Parsing error in {{{content}}} in position {pos}")),
    }
}

fn driver_type(content: &str, pos: usize, options: &mut PlaceholderOptions) -> Result<(), String> {
    let bytes = content.as_bytes();
    let left = skip_ws(bytes, pos);
    let right = skip_until(bytes, left, b",");
    if right <= left {
        return Err(format!("Parsing error in {{{content}}} in position {pos}"));
    }
    options.put("jdbcType", trimmed(content, left, right).to_string());
    option(content, right + 1, options)
}

fn option(content: &str, mut pos: usize, options: &mut PlaceholderOptions) -> Result<(), String> {
    let bytes = content.as_bytes();
    loop {
        let left = skip_ws(bytes, pos);
        if left >= bytes.len() {
            return Ok(());
        }
        let eq = skip_until(bytes, left, b"=");
        if eq >= bytes.len() {
            return Err(format!(
                "option '{}' has no value",
                trimmed(content, left, bytes.len())
            ));
        }
        let name = trimmed(content, left, eq);
        let right = skip_until(bytes, eq + 1, b",");
        let value = trimmed(content, eq + 1, right);
        options.put(name, value.to_string());
        pos = right + 1;
    }
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] <= b' ' {
        pos += 1;
    }
    pos
}

fn skip_until(bytes: &[u8], mut pos: usize, stop: &[u8]) -> usize {
    while pos < bytes.len() && !stop.contains(&bytes[pos]) {
        pos += 1;
    }
    pos
}

fn trimmed(content: &str, start: usize, end: usize) -> &str {
    content.get(start..end).map_or("", str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(content: &str) -> Vec<(String, String)> {
        parse_placeholder(content)
            .unwrap()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_property() {
        assert_eq!(pairs(" id "), vec![("property".into(), "id".into())]);
    }

    #[test]
    fn property_with_options() {
        let parsed = pairs("id, javaType=int , jdbcType = NUMERIC");
        assert_eq!(
            parsed,
            vec![
                ("property".into(), "id".into()),
                ("javaType".into(), "int".into()),
                ("jdbcType".into(), "NUMERIC".into()),
            ]
        );
    }

    #[test]
    fn colon_driver_type_shorthand() {
        let parsed = parse_placeholder("id:VARCHAR, mode=IN").unwrap();
        assert_eq!(parsed.get("jdbcType"), Some("VARCHAR"));
        assert_eq!(parsed.get("mode"), Some("IN"));
    }

    #[test]
    fn expression_form() {
        let parsed = parse_placeholder("(id + 1), jdbcType=INTEGER").unwrap();
        assert_eq!(parsed.get("expression"), Some("id + 1"));
        assert_eq!(parsed.get("property"), None);
    }

    #[test]
    fn malformed_input_errors() {
        assert!(parse_placeholder("id, javaType").is_err());
        assert!(parse_placeholder("(id").is_err());
        assert!(parse_placeholder("id:").is_err());
    }
}
