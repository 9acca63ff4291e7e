//! Communicator configuration and builder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::channel::ClientChannel;
use super::data_communicator::{DataCommunicator, FilterValue};
use super::hierarchical::HierarchicalDataCommunicator;
use super::key_mapper::{DataKeyMapper, KeyMapper};
use crate::error::Result;
use crate::identity::DataItem;

/// Default number of rows pushed before the client has asked for any.
pub const DEFAULT_MIN_PUSH_SIZE: usize = 40;

/// Tunables of a [`DataCommunicator`].
///
/// Missing fields take their defaults, so a partial TOML table is valid:
///
/// ```
/// use horizon_dataflow::communicator::CommunicatorConfig;
///
/// let config = CommunicatorConfig::from_toml_str("eager_reset = true").unwrap();
/// assert!(config.eager_reset);
/// assert_eq!(config.min_push_size, 40);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicatorConfig {
    /// Rows sent in the first response, before the client requests a window.
    pub min_push_size: usize,
    /// Run a full response immediately on every reset instead of letting the
    /// client re-request. Needed by widgets that cannot issue requests while
    /// closed, such as drop-down lists.
    pub eager_reset: bool,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            min_push_size: DEFAULT_MIN_PUSH_SIZE,
            eager_reset: false,
        }
    }
}

impl CommunicatorConfig {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// Builder for communicators with custom configuration.
pub struct CommunicatorBuilder<T: DataItem> {
    config: CommunicatorConfig,
    key_mapper: Option<Arc<dyn DataKeyMapper<T>>>,
}

impl<T: DataItem> Default for CommunicatorBuilder<T> {
    fn default() -> Self {
        Self {
            config: CommunicatorConfig::default(),
            key_mapper: None,
        }
    }
}

impl<T: DataItem> CommunicatorBuilder<T> {
    /// Create a new CommunicatorBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: CommunicatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of rows pushed before the first client request.
    pub fn min_push_size(mut self, min_push_size: usize) -> Self {
        self.config.min_push_size = min_push_size;
        self
    }

    /// Respond immediately on reset.
    pub fn eager_reset(mut self, eager_reset: bool) -> Self {
        self.config.eager_reset = eager_reset;
        self
    }

    /// Use a custom key mapper instead of [`KeyMapper`].
    pub fn key_mapper(mut self, key_mapper: Arc<dyn DataKeyMapper<T>>) -> Self {
        self.key_mapper = Some(key_mapper);
        self
    }

    fn take_key_mapper(&mut self) -> Arc<dyn DataKeyMapper<T>> {
        self.key_mapper
            .take()
            .unwrap_or_else(|| Arc::new(KeyMapper::new()))
    }

    /// Build a flat communicator pushing to `channel`.
    pub fn build<F>(mut self, channel: Arc<dyn ClientChannel>) -> Arc<DataCommunicator<T, F>>
    where
        F: FilterValue,
    {
        let key_mapper = self.take_key_mapper();
        DataCommunicator::with_parts(self.config, key_mapper, channel)
    }

    /// Build a hierarchical communicator pushing to `channel`.
    pub fn build_hierarchical<F>(
        mut self,
        channel: Arc<dyn ClientChannel>,
    ) -> HierarchicalDataCommunicator<T, F>
    where
        F: FilterValue,
    {
        let key_mapper = self.take_key_mapper();
        HierarchicalDataCommunicator::from_communicator(DataCommunicator::with_parts(
            self.config,
            key_mapper,
            channel,
        ))
    }
}
