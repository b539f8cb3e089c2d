//! Ordered command list for batched execution.

use txlink_driver::{Command, ParameterMap};

/// An ordered list of commands to run in batches.
///
/// The batch can carry its own batch size. It is sticky: every call that
/// passes a non-zero size replaces it, and zero leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBatch {
    commands: Vec<Command>,
    batch_size: Option<usize>,
}

impl QueryBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameterless query.
    #[must_use]
    pub fn add_query(self, sql: impl Into<String>) -> Self {
        self.add_command(Command::new(sql))
    }

    /// Adds a query with parameters.
    #[must_use]
    pub fn add_query_with(self, sql: impl Into<String>, params: ParameterMap) -> Self {
        self.add_command(Command::with_params(sql, params))
    }

    /// Adds a prepared command.
    #[must_use]
    pub fn add_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Sets the batch size override. Zero keeps the current one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        if batch_size > 0 {
            self.batch_size = Some(batch_size);
        }
        self
    }

    /// Appends the commands of `other`, keeping its order.
    ///
    /// The batch size override of `other` is not taken over.
    #[must_use]
    pub fn append(mut self, other: &QueryBatch) -> Self {
        self.commands.extend(other.commands.iter().cloned());
        self
    }

    /// Appends several batches in turn.
    #[must_use]
    pub fn append_all<'a, I>(self, others: I) -> Self
    where
        I: IntoIterator<Item = &'a QueryBatch>,
    {
        others.into_iter().fold(self, QueryBatch::append)
    }

    /// Returns the batch size override, if any.
    #[must_use]
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Returns the commands in order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if there are no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<Command> for QueryBatch {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
            batch_size: None,
        }
    }
}

impl Extend<Command> for QueryBatch {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlink_driver::Value;

    fn selects(n: usize) -> QueryBatch {
        (0..n).map(|_| Command::new("select 1")).collect()
    }

    #[test]
    fn builds_in_order() {
        let mut params = ParameterMap::new();
        params.insert("id".into(), Value::Int(7));

        let batch = QueryBatch::new()
            .add_query("create table t (id int)")
            .add_query_with("insert into t values (@id)", params)
            .add_command(Command::new("drop table t"));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.commands()[1].params.get("id"), Some(&Value::Int(7)));
        assert_eq!(batch.commands()[2].sql, "drop table t");
    }

    #[test]
    fn batch_size_is_sticky() {
        let batch = QueryBatch::new()
            .with_batch_size(10)
            .add_query("select 1")
            .with_batch_size(0);
        assert_eq!(batch.batch_size(), Some(10));

        let batch = batch.with_batch_size(25);
        assert_eq!(batch.batch_size(), Some(25));
        assert_eq!(QueryBatch::new().batch_size(), None);
    }

    #[test]
    fn append_concatenates() {
        let parts = [selects(40), selects(40), selects(40)];
        let all = QueryBatch::new().append_all(&parts);
        assert_eq!(all.len(), 120);

        let first = QueryBatch::new().add_query("a");
        let second = QueryBatch::new().add_query("b").with_batch_size(5);
        let joined = first.append(&second);
        let sql: Vec<&str> = joined.commands().iter().map(|c| c.sql.as_str()).collect();
        assert_eq!(sql, ["a", "b"]);
        assert_eq!(joined.batch_size(), None);
    }
}
