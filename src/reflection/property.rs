/// One step of a property path such as `orders[0].lines`.
///
/// `name` is the bare property (`orders`), `index` the bracketed part (`0`), and `children`
/// the remainder after the first `.` (`lines`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyPath<'a> {
    name: &'a str,
    indexed_name: &'a str,
    index: Option<&'a str>,
    children: Option<&'a str>,
}

impl<'a> PropertyPath<'a> {
    #[must_use]
    pub fn parse(full_name: &'a str) -> Self {
        let (head, children) = match full_name.find('.') {
            Some(delim) => (&full_name[..delim], Some(&full_name[delim + 1..])),
            None => (full_name, None),
        };
        let (name, index) = match head.find('[') {
            Some(delim) => {
                let inner = &head[delim + 1..];
                let inner = inner.strip_suffix(']').unwrap_or(inner);
                (&head[..delim], Some(inner))
            }
            None => (head, None),
        };
        Self {
            name,
            indexed_name: head,
            index,
            children,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub fn indexed_name(&self) -> &'a str {
        self.indexed_name
    }

    #[must_use]
    pub fn index(&self) -> Option<&'a str> {
        self.index
    }

    #[must_use]
    pub fn children(&self) -> Option<&'a str> {
        self.children
    }

    /// Tokenize the remainder of the path, if any.
    #[must_use]
    pub fn next_path(&self) -> Option<PropertyPath<'a>> {
        self.children.map(PropertyPath::parse)
    }
}

/// Iterate over every step of a dotted path.
pub fn segments(path: &str) -> impl Iterator<Item = PropertyPath<'_>> {
    std::iter::successors(Some(PropertyPath::parse(path)), PropertyPath::next_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_nested_indexed_path() {
        let path = PropertyPath::parse("names[0].first");
        assert_eq!(path.name(), "names");
        assert_eq!(path.indexed_name(), "names[0]");
        assert_eq!(path.index(), Some("0"));
        assert_eq!(path.children(), Some("first"));

        let child = path.next_path().unwrap();
        assert_eq!(child.name(), "first");
        assert_eq!(child.index(), None);
        assert!(child.next_path().is_none());
    }

    #[test]
    fn segments_walk_every_level() {
        let names: Vec<_> = segments("a.b[k].c").map(|p| p.indexed_name()).collect();
        assert_eq!(names, vec!["a", "b[k]", "c"]);
    }
}
