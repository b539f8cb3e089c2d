//! Commands and command sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A parameter value bound to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Named parameters of a command, ordered by name.
pub type ParameterMap = BTreeMap<String, Value>;

/// Who issued a command and from where.
///
/// Attached by the caller-facing layer so that server-side auditing can
/// attribute every statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMeta {
    /// Caller identity bytes (empty for anonymous callers).
    pub caller_id: Vec<u8>,
    /// Source file of the call site.
    pub file: String,
    /// Source line of the call site.
    pub line: u32,
    /// Source column of the call site.
    pub column: u32,
}

/// A single executable command: SQL text plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// SQL text.
    pub sql: String,
    /// Named parameters.
    #[serde(default)]
    pub params: ParameterMap,
    /// Caller metadata, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CommandMeta>,
}

impl Command {
    /// Creates a parameterless command.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: ParameterMap::new(),
            meta: None,
        }
    }

    /// Creates a command with parameters.
    pub fn with_params(sql: impl Into<String>, params: ParameterMap) -> Self {
        Self {
            sql: sql.into(),
            params,
            meta: None,
        }
    }

    /// Binds a single parameter, replacing any previous value.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attaches caller metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Several commands sent to the server in one round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSet {
    commands: Vec<Command>,
    timeout: Option<Duration>,
}

impl CommandSet {
    /// Creates an empty command set with no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty command set with room for `capacity` commands.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            timeout: None,
        }
    }

    /// Appends a command.
    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Sets the round-trip timeout. `None` waits indefinitely.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Returns the round-trip timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the commands in append order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the set holds no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<Command> for CommandSet {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_overwrites_parameter() {
        let cmd = Command::new("select @id")
            .bind("@id", 1)
            .bind("@id", 2);

        assert_eq!(cmd.params.len(), 1);
        assert_eq!(cmd.params["@id"], Value::Int(2));
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn command_set_preserves_order() {
        let set: CommandSet = ["a", "b", "c"].into_iter().map(Command::new).collect();
        let sql: Vec<_> = set.commands().iter().map(|c| c.sql.as_str()).collect();
        assert_eq!(sql, ["a", "b", "c"]);
        assert!(set.timeout().is_none());
    }

    #[test]
    fn command_deserializes_without_params() {
        let cmd: Command = serde_json::from_str(r#"{"sql":"delete from t"}"#).unwrap();
        assert_eq!(cmd.sql, "delete from t");
        assert!(cmd.params.is_empty());
        assert!(cmd.meta.is_none());
    }

    #[test]
    fn untagged_values_deserialize() {
        let cmd: Command =
            serde_json::from_str(r#"{"sql":"x","params":{"@a":1,"@b":"two","@c":null}}"#)
                .unwrap();
        assert_eq!(cmd.params["@a"], Value::Int(1));
        assert_eq!(cmd.params["@b"], Value::Text("two".into()));
        assert_eq!(cmd.params["@c"], Value::Null);
    }
}
