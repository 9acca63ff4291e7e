//! Horizon Dataflow - lazy data providers and client data synchronization.
//!
//! This crate is the data layer behind list, grid, combo and tree views:
//!
//! - [`provider`]: queries, flat and hierarchical data providers, in-memory
//!   list and tree stores, callback back ends and filter-rewriting wrappers
//! - [`communicator`]: keeps a client-side row cache in sync with a provider,
//!   sending only the rows the client asked for and the rows that changed
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_dataflow::communicator::{ClientCommand, DataCommunicator, RecordingChannel};
//! use horizon_dataflow::provider::{AnyDataProvider, ListDataProvider, Predicate};
//!
//! let channel = Arc::new(RecordingChannel::new());
//! let communicator = DataCommunicator::<&str, Predicate<&str>>::new(channel.clone());
//! let slot = communicator.set_data_provider(
//!     AnyDataProvider::flat(ListDataProvider::new(vec!["alpha", "beta", "gamma"])),
//!     None,
//! );
//! communicator.attach();
//! communicator.before_client_response(true)?;
//!
//! // Narrow the rows; the next response resets the client to the new size.
//! slot.set_filter(Some(Predicate::new(|s: &&str| s.contains('a'))))?;
//! slot.set_filter(Some(Predicate::new(|s: &&str| s.starts_with('b'))))?;
//! channel.take();
//! communicator.before_client_response(false)?;
//! assert_eq!(channel.take()[0], ClientCommand::Reset { size: 1 });
//! # Ok::<(), horizon_dataflow::DataError>(())
//! ```

pub mod communicator;
pub mod error;
pub mod identity;
pub mod provider;

pub use error::{DataError, Result};
pub use identity::{DataItem, IdentifierGetter, ItemId, self_identity};
