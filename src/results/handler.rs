use super::row::CustomDbRow;

/// Streaming consumer of query rows, the alternative to collecting a [`ResultSet`](super::ResultSet).
pub trait ResultHandler {
    fn handle_result(&mut self, context: &mut ResultContext<'_>);
}

impl<F> ResultHandler for F
where
    F: FnMut(&mut ResultContext<'_>),
{
    fn handle_result(&mut self, context: &mut ResultContext<'_>) {
        self(context);
    }
}

/// The row being handled, how many rows were handled so far, and a stop switch.
#[derive(Debug)]
pub struct ResultContext<'r> {
    row: Option<&'r CustomDbRow>,
    count: usize,
    stopped: bool,
}

impl<'r> ResultContext<'r> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            row: None,
            count: 0,
            stopped: false,
        }
    }

    pub(crate) fn next_row(&mut self, row: &'r CustomDbRow) {
        self.count += 1;
        self.row = Some(row);
    }

    #[must_use]
    pub fn row(&self) -> Option<&'r CustomDbRow> {
        self.row
    }

    /// Rows handed to the handler so far, including the current one.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.count
    }

    /// Ask for no further rows.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Feed `rows` to `handler` until it stops. Returns the number of rows handled.
pub(crate) fn drive<'r, I>(rows: I, handler: &mut dyn ResultHandler) -> usize
where
    I: IntoIterator<Item = &'r CustomDbRow>,
{
    let mut context = ResultContext::new();
    for row in rows {
        context.next_row(row);
        handler.handle_result(&mut context);
        if context.is_stopped() {
            break;
        }
    }
    context.result_count()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::RowValues;

    #[test]
    fn stop_ends_iteration() {
        let names = Arc::new(vec!["id".to_string()]);
        let rows: Vec<_> = (0..5)
            .map(|i| CustomDbRow::new(Arc::clone(&names), vec![RowValues::Int(i)]))
            .collect();
        let mut seen = Vec::new();
        let mut handler = |ctx: &mut ResultContext<'_>| {
            if let Some(row) = ctx.row() {
                seen.push(row.get("id").cloned());
            }
            if ctx.result_count() == 2 {
                ctx.stop();
            }
        };
        let handled = drive(&rows, &mut handler);
        assert_eq!(handled, 2);
        assert_eq!(seen.len(), 2);
    }
}
