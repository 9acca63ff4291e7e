//! The client-facing message channel.
//!
//! The communicator pushes [`ClientCommand`]s through a [`ClientChannel`] and
//! reacts to the two [`ServerCommand`]s a client can send. How commands are
//! framed and transported is up to the channel implementation; both command
//! types serialize to tagged JSON objects.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::generator::RowRecord;
use crate::error::{DataError, Result};

/// Outgoing, fire-and-forget signals to the client.
pub trait ClientChannel: Send + Sync {
    /// The data set now has `size` rows; discard everything and re-request.
    fn reset(&self, size: usize);

    /// Replace the rows with matching keys.
    fn update_data(&self, records: Vec<RowRecord>);

    /// Rows starting at `first_index`.
    fn set_data(&self, first_index: usize, records: Vec<RowRecord>);

    /// `count` rows were inserted before `first_index`.
    fn insert_rows(&self, first_index: usize, count: usize);

    /// `count` rows starting at `first_index` were removed.
    fn remove_rows(&self, first_index: usize, count: usize);
}

/// A message sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    Reset { size: usize },
    UpdateData { records: Vec<RowRecord> },
    SetData { first_index: usize, records: Vec<RowRecord> },
    InsertRows { first_index: usize, count: usize },
    RemoveRows { first_index: usize, count: usize },
}

impl ClientCommand {
    /// Serializes the command as a JSON object.
    pub fn to_json(&self) -> String {
        // Plain enum of numbers, strings and JSON maps; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A message received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerCommand {
    /// The client wants the rows `[first_row_index, first_row_index + number_of_rows)`.
    RequestRows {
        first_row_index: usize,
        number_of_rows: usize,
        first_cached_row_index: usize,
        cache_size: usize,
    },
    /// The client discarded the rows with these keys.
    DropRows { keys: Vec<String> },
}

impl ServerCommand {
    /// Parses a command from its JSON form.
    ///
    /// ```
    /// use horizon_dataflow::communicator::ServerCommand;
    ///
    /// let command = ServerCommand::from_json(r#"{"type":"dropRows","keys":["3","4"]}"#).unwrap();
    /// assert_eq!(command, ServerCommand::DropRows { keys: vec!["3".into(), "4".into()] });
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| DataError::invalid_argument(format!("malformed client message: {err}")))
    }
}

/// A channel that records every command, for tests and debugging.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    commands: Mutex<Vec<ClientCommand>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the recorded commands.
    pub fn commands(&self) -> Vec<ClientCommand> {
        self.commands.lock().clone()
    }

    /// Removes and returns the recorded commands.
    pub fn take(&self) -> Vec<ClientCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    fn record(&self, command: ClientCommand) {
        self.commands.lock().push(command);
    }
}

impl ClientChannel for RecordingChannel {
    fn reset(&self, size: usize) {
        self.record(ClientCommand::Reset { size });
    }

    fn update_data(&self, records: Vec<RowRecord>) {
        self.record(ClientCommand::UpdateData { records });
    }

    fn set_data(&self, first_index: usize, records: Vec<RowRecord>) {
        self.record(ClientCommand::SetData {
            first_index,
            records,
        });
    }

    fn insert_rows(&self, first_index: usize, count: usize) {
        self.record(ClientCommand::InsertRows { first_index, count });
    }

    fn remove_rows(&self, first_index: usize, count: usize) {
        self.record(ClientCommand::RemoveRows { first_index, count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_channel() {
        let channel = RecordingChannel::new();
        channel.reset(5);
        channel.insert_rows(1, 2);
        assert_eq!(
            channel.take(),
            vec![
                ClientCommand::Reset { size: 5 },
                ClientCommand::InsertRows {
                    first_index: 1,
                    count: 2
                }
            ]
        );
        assert!(channel.commands().is_empty());
    }

    #[test]
    fn test_client_command_wire_form() {
        let mut record = RowRecord::new();
        record.insert("k".into(), json!("1"));
        let command = ClientCommand::SetData {
            first_index: 0,
            records: vec![record],
        };
        let value: serde_json::Value = serde_json::from_str(&command.to_json()).unwrap();
        assert_eq!(
            value,
            json!({"type": "setData", "firstIndex": 0, "records": [{"k": "1"}]})
        );
    }

    #[test]
    fn test_server_command_parsing() {
        let json = concat!(
            r#"{"type":"requestRows","firstRowIndex":10,"numberOfRows":20,"#,
            r#""firstCachedRowIndex":0,"cacheSize":30}"#,
        );
        let command = ServerCommand::from_json(json).unwrap();
        assert_eq!(
            command,
            ServerCommand::RequestRows {
                first_row_index: 10,
                number_of_rows: 20,
                first_cached_row_index: 0,
                cache_size: 30
            }
        );
        assert!(ServerCommand::from_json(r#"{"type":"explode"}"#)
            .unwrap_err()
            .is_invalid_argument());
    }
}
