//! Server-side synchronization of a lazily loaded row cache.
//!
//! A [`DataCommunicator`] sits between a data provider and one client. The
//! client asks for row windows and reports rows it discarded; the
//! communicator answers with row records built by its [`DataGenerator`]s,
//! identified by keys from a [`DataKeyMapper`].
//!
//! # Core Types
//!
//! - `DataCommunicator`: flat rows, resets, refreshes and row windows
//! - `HierarchicalDataCommunicator`: the same over a flattened tree, with
//!   row insertion and removal on expand and collapse
//! - `HierarchyMapper`: expansion state and tree flattening
//! - `ActiveDataHandler`: which rows the client currently holds
//! - `ClientChannel`: outgoing commands; `ServerCommand`: incoming ones
//!
//! # Driving a Communicator
//!
//! ```
//! use std::sync::Arc;
//! use horizon_dataflow::communicator::{ClientCommand, DataCommunicator, RecordingChannel};
//! use horizon_dataflow::provider::{AnyDataProvider, ListDataProvider, Predicate};
//!
//! let channel = Arc::new(RecordingChannel::new());
//! let communicator = DataCommunicator::<u32, Predicate<u32>>::new(channel.clone());
//! communicator.set_data_provider(AnyDataProvider::flat(ListDataProvider::new(vec![1, 2, 3])), None);
//! communicator.attach();
//!
//! communicator.before_client_response(true).unwrap();
//! assert_eq!(channel.take()[0], ClientCommand::Reset { size: 3 });
//! ```

mod active_data;
mod channel;
mod config;
mod data_communicator;
mod generator;
mod hierarchical;
mod hierarchy_mapper;
mod key_mapper;
mod range;

pub use active_data::ActiveDataHandler;
pub use channel::{ClientChannel, ClientCommand, RecordingChannel, ServerCommand};
pub use config::{CommunicatorBuilder, CommunicatorConfig, DEFAULT_MIN_PUSH_SIZE};
pub use data_communicator::{DataCommunicator, FilterSlot, FilterValue};
pub use generator::{DataGenerator, RowRecord, fields};
pub use hierarchical::HierarchicalDataCommunicator;
pub use hierarchy_mapper::HierarchyMapper;
pub use key_mapper::{DataKeyMapper, KeyMapper};
pub use range::Range;
