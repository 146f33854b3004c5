use regex::Regex;
use tracing::debug;

use crate::error::SqlMapperError;
use crate::reflection::Argument;
use crate::translation::{BIND_PLACEHOLDER, TEXT_SUBSTITUTION};

use super::context::DynamicContext;
use super::expr;

const WHERE_PREFIX_OVERRIDES: &[&str] = &[
    "AND ", "OR ", "AND\n", "OR\n", "AND\r", "OR\r", "AND\t", "OR\t",
];

/// One segment of a statement template.
#[derive(Debug, Clone)]
pub enum SqlNode {
    /// Literal SQL, possibly holding `#{}` placeholders.
    Static(String),
    /// SQL holding `${}` substitutions.
    Text(TextNode),
    Mixed(Vec<SqlNode>),
    If {
        test: String,
        contents: Box<SqlNode>,
    },
    /// First matching `when`, else `otherwise`.
    Choose {
        whens: Vec<(String, SqlNode)>,
        otherwise: Option<Box<SqlNode>>,
    },
    Trim(TrimNode),
    Foreach(ForeachNode),
    /// Evaluate `expression` and bind the result under `name`.
    Bind {
        name: String,
        expression: String,
    },
}

impl SqlNode {
    /// Literal text; becomes a [`SqlNode::Text`] when it holds `${}` substitutions.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if TEXT_SUBSTITUTION.has_tokens(&text) {
            SqlNode::Text(TextNode {
                text,
                injection_filter: None,
            })
        } else {
            SqlNode::Static(text)
        }
    }

    /// Like [`SqlNode::text`], with every substituted value required to match `filter` in full.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` if `filter` is not a valid regular expression.
    pub fn filtered_text(text: impl Into<String>, filter: &str) -> Result<Self, SqlMapperError> {
        let regex = Regex::new(&format!("^(?:{filter})$")).map_err(|e| {
            SqlMapperError::config(format!("Invalid injection filter '{filter}': {e}"))
        })?;
        Ok(match SqlNode::text(text) {
            SqlNode::Text(node) => SqlNode::Text(TextNode {
                injection_filter: Some(regex),
                ..node
            }),
            other => other,
        })
    }

    #[must_use]
    pub fn mixed(nodes: Vec<SqlNode>) -> Self {
        SqlNode::Mixed(nodes)
    }

    #[must_use]
    pub fn if_test(test: impl Into<String>, contents: SqlNode) -> Self {
        SqlNode::If {
            test: test.into(),
            contents: Box::new(contents),
        }
    }

    #[must_use]
    pub fn choose(whens: Vec<(String, SqlNode)>, otherwise: Option<SqlNode>) -> Self {
        SqlNode::Choose {
            whens,
            otherwise: otherwise.map(Box::new),
        }
    }

    /// `WHERE` clause: prefixed with `WHERE` when non-empty, leading `AND`/`OR` dropped.
    #[must_use]
    pub fn where_clause(contents: SqlNode) -> Self {
        let mut trim = TrimNode::new(contents).prefix("WHERE");
        trim.prefix_overrides = WHERE_PREFIX_OVERRIDES.iter().map(|s| s.to_string()).collect();
        SqlNode::Trim(trim)
    }

    /// `SET` clause: prefixed with `SET` when non-empty, stray commas dropped.
    #[must_use]
    pub fn set_clause(contents: SqlNode) -> Self {
        SqlNode::Trim(
            TrimNode::new(contents)
                .prefix("SET")
                .prefix_overrides(",")
                .suffix_overrides(","),
        )
    }

    #[must_use]
    pub fn bind(name: impl Into<String>, expression: impl Into<String>) -> Self {
        SqlNode::Bind {
            name: name.into(),
            expression: expression.into(),
        }
    }

    /// Whether evaluating this tree can depend on the argument.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::Static(_) => false,
            SqlNode::Mixed(nodes) => nodes.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    /// Append this segment's SQL to `context`. Returns whether anything was applied.
    ///
    /// # Errors
    ///
    /// Propagates expression errors from tests and collections, and injection-filter
    /// mismatches as `SqlMapperError::ValidationError`.
    pub fn apply(&self, context: &mut DynamicContext) -> Result<bool, SqlMapperError> {
        match self {
            SqlNode::Static(text) => {
                context.append_sql(text.clone());
                Ok(true)
            }
            SqlNode::Text(node) => node.apply(context),
            SqlNode::Mixed(nodes) => {
                for node in nodes {
                    node.apply(context)?;
                }
                Ok(true)
            }
            SqlNode::If { test, contents } => {
                if expr::evaluate_bool(test, context.bindings())? {
                    contents.apply(context)?;
                    return Ok(true);
                }
                Ok(false)
            }
            SqlNode::Choose { whens, otherwise } => {
                for (test, node) in whens {
                    if expr::evaluate_bool(test, context.bindings())? {
                        return node.apply(context);
                    }
                }
                match otherwise {
                    Some(node) => node.apply(context),
                    None => Ok(false),
                }
            }
            SqlNode::Trim(node) => node.apply(context),
            SqlNode::Foreach(node) => node.apply(context),
            SqlNode::Bind { name, expression } => {
                let value = expr::evaluate(expression, context.bindings())?;
                context.bind(name.clone(), value);
                Ok(true)
            }
        }
    }
}

impl From<TrimNode> for SqlNode {
    fn from(node: TrimNode) -> Self {
        SqlNode::Trim(node)
    }
}

impl From<ForeachNode> for SqlNode {
    fn from(node: ForeachNode) -> Self {
        SqlNode::Foreach(node)
    }
}

/// Text with `${}` substitutions and an optional injection filter.
#[derive(Debug, Clone)]
pub struct TextNode {
    text: String,
    injection_filter: Option<Regex>,
}

impl TextNode {
    fn apply(&self, context: &mut DynamicContext) -> Result<bool, SqlMapperError> {
        let parameter = context.parameter().clone();
        if parameter.is_null() {
            context.bind("value", Argument::Null);
        } else if parameter.is_simple() {
            context.bind("value", parameter);
        }

        let bindings = context.bindings();
        let sql = TEXT_SUBSTITUTION.scan(&self.text, |content| {
            let value = expr::evaluate(content, bindings).unwrap_or_else(|err| {
                debug!(expression = content, error = %err, "substitution resolved to empty text");
                Argument::Null
            });
            let rendered = render(&value);
            if let Some(filter) = &self.injection_filter
                && !filter.is_match(&rendered)
            {
                return Err(SqlMapperError::ValidationError(format!(
                    "Invalid input. Please conform to regex {}",
                    filter.as_str()
                )));
            }
            Ok(rendered)
        })?;
        context.append_sql(sql);
        Ok(true)
    }
}

fn render(value: &Argument) -> String {
    match value {
        v if v.is_null() => String::new(),
        Argument::Value(v) => v.to_string(),
        other => other.to_json().to_string(),
    }
}

/// `prefix`/`suffix` wrapping with leading/trailing override removal. Overrides match
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct TrimNode {
    contents: Box<SqlNode>,
    prefix: Option<String>,
    suffix: Option<String>,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
}

impl TrimNode {
    #[must_use]
    pub fn new(contents: SqlNode) -> Self {
        Self {
            contents: Box::new(contents),
            prefix: None,
            suffix: None,
            prefix_overrides: Vec::new(),
            suffix_overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// `|`-separated list, e.g. `"AND |OR "`.
    #[must_use]
    pub fn prefix_overrides(mut self, overrides: &str) -> Self {
        self.prefix_overrides = parse_overrides(overrides);
        self
    }

    /// `|`-separated list.
    #[must_use]
    pub fn suffix_overrides(mut self, overrides: &str) -> Self {
        self.suffix_overrides = parse_overrides(overrides);
        self
    }

    fn apply(&self, context: &mut DynamicContext) -> Result<bool, SqlMapperError> {
        let mark = context.mark();
        let applied = self.contents.apply(context)?;
        let body = context.take_since(mark);
        let trimmed = self.trim(&body);
        if !trimmed.is_empty() {
            context.append_sql(trimmed);
        }
        Ok(applied)
    }

    fn trim(&self, body: &str) -> String {
        let mut sql = body.trim().to_string();
        if sql.is_empty() {
            return sql;
        }
        let upper = sql.to_ascii_uppercase();
        if let Some(matched) = self.prefix_overrides.iter().find(|o| upper.starts_with(o.as_str())) {
            sql.drain(..matched.trim().len());
        }
        let upper = sql.to_ascii_uppercase();
        if let Some(matched) = self
            .suffix_overrides
            .iter()
            .find(|o| upper.ends_with(o.as_str()) || upper.ends_with(o.trim()))
        {
            sql.truncate(sql.len() - matched.trim().len());
        }
        let mut out = String::with_capacity(sql.len() + 16);
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(sql.trim());
        if let Some(suffix) = &self.suffix {
            out.push(' ');
            out.push_str(suffix);
        }
        out
    }
}

fn parse_overrides(overrides: &str) -> Vec<String> {
    overrides
        .split('|')
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

/// Iteration over a list or map argument.
///
/// Placeholders inside the body that start with the item or index name are rewritten to
/// per-iteration bindings (`__frch_<name>_<n>`), so each element binds its own value.
#[derive(Debug, Clone)]
pub struct ForeachNode {
    collection: String,
    contents: Box<SqlNode>,
    item: Option<String>,
    index: Option<String>,
    open: Option<String>,
    close: Option<String>,
    separator: Option<String>,
    nullable: bool,
}

impl ForeachNode {
    #[must_use]
    pub fn new(collection: impl Into<String>, contents: SqlNode) -> Self {
        Self {
            collection: collection.into(),
            contents: Box::new(contents),
            item: None,
            index: None,
            open: None,
            close: None,
            separator: None,
            nullable: false,
        }
    }

    #[must_use]
    pub fn item(mut self, name: impl Into<String>) -> Self {
        self.item = Some(name.into());
        self
    }

    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    #[must_use]
    pub fn open(mut self, open: impl Into<String>) -> Self {
        self.open = Some(open.into());
        self
    }

    #[must_use]
    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = Some(close.into());
        self
    }

    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Treat a null collection as empty instead of failing.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    fn apply(&self, context: &mut DynamicContext) -> Result<bool, SqlMapperError> {
        let collection = expr::evaluate(&self.collection, context.bindings())?;
        if collection.is_null() {
            if self.nullable {
                return Ok(true);
            }
            return Err(SqlMapperError::config(format!(
                "The expression '{}' evaluated to a null value.",
                self.collection
            )));
        }
        let elements = collection.elements().ok_or_else(|| {
            SqlMapperError::config(format!(
                "The expression '{}' evaluated to a {} which is not iterable.",
                self.collection,
                collection.value_type()
            ))
        })?;
        if elements.is_empty() {
            return Ok(true);
        }

        if let Some(open) = &self.open {
            context.append_sql(open.clone());
        }
        let mut first = true;
        for (key, item) in elements {
            let unique = context.next_unique_number();
            if let Some(index) = &self.index {
                context.bind(itemize(index, unique), key.clone());
                context.bind(index.clone(), key);
            }
            if let Some(name) = &self.item {
                context.bind(itemize(name, unique), item.clone());
                context.bind(name.clone(), item.clone());
            }
            let mark = context.mark();
            self.contents.apply(context)?;
            let body = context.take_since(mark);
            let body = self.rewrite_placeholders(&body, unique)?;
            if body.trim().is_empty() {
                continue;
            }
            if !first && let Some(separator) = &self.separator {
                context.append_sql(separator.clone());
            }
            context.append_sql(body);
            first = false;
        }
        if let Some(close) = &self.close {
            context.append_sql(close.clone());
        }
        if let Some(name) = &self.item {
            context.unbind(name);
        }
        if let Some(index) = &self.index {
            context.unbind(index);
        }
        Ok(true)
    }

    fn rewrite_placeholders(&self, body: &str, unique: usize) -> Result<String, SqlMapperError> {
        BIND_PLACEHOLDER.scan(body, |content| {
            let mut rewritten = None;
            if let Some(item) = &self.item {
                rewritten = rebase(content, item, &itemize(item, unique));
            }
            if rewritten.is_none()
                && let Some(index) = &self.index
            {
                rewritten = rebase(content, index, &itemize(index, unique));
            }
            Ok(format!("#{{{}}}", rewritten.as_deref().unwrap_or(content)))
        })
    }
}

fn itemize(name: &str, unique: usize) -> String {
    format!("__frch_{name}_{unique}")
}

/// Replace a leading `name` in placeholder content, when followed by a path or option boundary.
fn rebase(content: &str, name: &str, replacement: &str) -> Option<String> {
    let rest = content.trim_start().strip_prefix(name)?;
    match rest.chars().next() {
        None => Some(replacement.to_string()),
        Some(c) if c == '.' || c == ',' || c == ':' || c.is_whitespace() => {
            Some(format!("{replacement}{rest}"))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_sql(node: &SqlNode, arg: &Argument) -> String {
        let mut ctx = DynamicContext::new(arg, None);
        node.apply(&mut ctx).unwrap();
        ctx.sql()
    }

    #[test]
    fn where_drops_leading_and() {
        let node = SqlNode::where_clause(SqlNode::mixed(vec![
            SqlNode::if_test("id != null", SqlNode::text("AND id = #{id}")),
            SqlNode::if_test("name != null", SqlNode::text("AND name = #{name}")),
        ]));
        let arg = Argument::map([("name", Argument::from("x")), ("id", Argument::Null)]);
        assert_eq!(render_sql(&node, &arg), "WHERE name = #{name}");
        assert_eq!(render_sql(&node, &Argument::map::<String, _>([])), "");
    }

    #[test]
    fn set_drops_trailing_comma() {
        let node = SqlNode::set_clause(SqlNode::mixed(vec![
            SqlNode::text("a = #{a},"),
            SqlNode::text("b = #{b},"),
        ]));
        assert_eq!(
            render_sql(&node, &Argument::Null),
            "SET a = #{a}, b = #{b}"
        );
    }

    #[test]
    fn foreach_rewrites_item_placeholders() {
        let node = SqlNode::mixed(vec![
            SqlNode::text("select * from t where id in"),
            ForeachNode::new("ids", SqlNode::text("#{id}"))
                .item("id")
                .open("(")
                .close(")")
                .separator(",")
                .into(),
        ]);
        let arg = Argument::map([("ids", Argument::from(vec![1, 2, 3]))]);
        let mut ctx = DynamicContext::new(&arg, None);
        node.apply(&mut ctx).unwrap();
        assert_eq!(
            ctx.sql(),
            "select * from t where id in ( #{__frch_id_0} , #{__frch_id_1} , #{__frch_id_2} )"
        );
        assert_eq!(ctx.lookup("__frch_id_1"), Some(&Argument::from(2)));
        assert_eq!(ctx.lookup("id"), None);
    }

    #[test]
    fn foreach_over_null_collection() {
        let node: SqlNode = ForeachNode::new("ids", SqlNode::text("#{id}")).item("id").into();
        let mut ctx = DynamicContext::new(&Argument::map::<String, _>([]), None);
        assert!(node.apply(&mut ctx).is_err());

        let node: SqlNode = ForeachNode::new("ids", SqlNode::text("#{id}"))
            .item("id")
            .nullable(true)
            .into();
        let mut ctx = DynamicContext::new(&Argument::map::<String, _>([]), None);
        assert!(node.apply(&mut ctx).unwrap());
        assert_eq!(ctx.sql(), "");
    }

    #[test]
    fn text_substitution_uses_value_for_simple_arguments() {
        let node = SqlNode::text("select * from ${value}");
        assert_eq!(render_sql(&node, &Argument::from("users")), "select * from users");
        let node = SqlNode::text("order by ${missing.deep}");
        assert_eq!(render_sql(&node, &Argument::map::<String, _>([])), "order by ");
    }

    #[test]
    fn injection_filter_rejects_mismatches() {
        let node = SqlNode::filtered_text("order by ${col}", "[a-z_]+").unwrap();
        let ok = Argument::map([("col", Argument::from("created_at"))]);
        assert_eq!(render_sql(&node, &ok), "order by created_at");

        let bad = Argument::map([("col", Argument::from("id; drop table t"))]);
        let mut ctx = DynamicContext::new(&bad, None);
        assert!(matches!(
            node.apply(&mut ctx),
            Err(SqlMapperError::ValidationError(_))
        ));
    }

    #[test]
    fn choose_and_bind() {
        let node = SqlNode::mixed(vec![
            SqlNode::bind("pattern", "name"),
            SqlNode::choose(
                vec![("kind == 'a'".to_string(), SqlNode::text("A"))],
                Some(SqlNode::text("B ${pattern}")),
            ),
        ]);
        let arg = Argument::map([("kind", Argument::from("b")), ("name", Argument::from("n%"))]);
        assert_eq!(render_sql(&node, &arg), "B n%");
    }

    #[test]
    fn classification() {
        assert!(!SqlNode::text("select #{id}").is_dynamic());
        assert!(SqlNode::text("select ${col}").is_dynamic());
        assert!(!SqlNode::text("select \\${col}").is_dynamic());
        assert!(SqlNode::if_test("true", SqlNode::text("x")).is_dynamic());
    }
}
