//! Per-row record generation.
//!
//! Every row sent to the client is a [`RowRecord`]: an open JSON object that
//! the communicator seeds with the row key and then hands to each registered
//! [`DataGenerator`] in registration order. Generators may also keep caches
//! per item; the lifecycle callbacks tell them when to release those.

use serde_json::{Map, Value};

use crate::error::Result;

/// An outgoing row: an open JSON object filled by generators.
pub type RowRecord = Map<String, Value>;

/// Field names reserved in every row record.
pub mod fields {
    /// Client key of the row.
    pub const KEY: &str = "k";
    /// Nested hierarchy metadata object.
    pub const ROW_HIERARCHY_DESCRIPTION: &str = "rhd";
    /// Depth of the row below the root level.
    pub const ROW_DEPTH: &str = "d";
    /// Whether a non-leaf row is collapsed.
    pub const ROW_COLLAPSED: &str = "c";
    /// Whether the row has no children.
    pub const ROW_LEAF: &str = "l";
    /// Whether the user may collapse the row.
    pub const ROW_COLLAPSE_ALLOWED: &str = "ca";
}

/// Attaches extra fields to outgoing rows and tracks their lifecycle.
///
/// # Example
///
/// ```
/// use horizon_dataflow::communicator::{DataGenerator, RowRecord};
/// use horizon_dataflow::Result;
///
/// struct Caption;
///
/// impl DataGenerator<String> for Caption {
///     fn generate_data(&self, item: &String, record: &mut RowRecord) -> Result<()> {
///         record.insert("caption".into(), item.to_uppercase().into());
///         Ok(())
///     }
/// }
///
/// let mut record = RowRecord::new();
/// Caption.generate_data(&"ada".to_string(), &mut record).unwrap();
/// assert_eq!(record["caption"], "ADA");
/// ```
pub trait DataGenerator<T>: Send + Sync {
    /// Adds this generator's fields for `item` to `record`.
    fn generate_data(&self, item: &T, record: &mut RowRecord) -> Result<()>;

    /// `item` is no longer present on the client.
    fn destroy_data(&self, _item: &T) {}

    /// Every item is gone from the client.
    fn destroy_all_data(&self) {}

    /// `item` was updated in place and will be sent again.
    fn refresh_data(&self, _item: &T) {}
}
