//! Built-in region plugins.
//!
//! Each plugin pairs a [`RegionConfig`] naming the council's published files
//! with a mapper for their columns. Register further regions by building a
//! [`RegionPlugin`] the same way; nothing in the importer changes.

mod braintree;
mod bromsgrove;
mod dundee;
mod reading;

use camino::Utf8Path;

use crate::config::RegionPlugin;

pub use braintree::Braintree;
pub use bromsgrove::Bromsgrove;
pub use dundee::Dundee;
pub use reading::Reading;

/// Region ids with a built-in plugin.
pub const BUILTIN_REGIONS: [&str; 4] = [
    reading::REGION_ID,
    braintree::REGION_ID,
    bromsgrove::REGION_ID,
    dundee::REGION_ID,
];

/// Plugin for a built-in region reading from `base_dir`, or `None` when the
/// region has none.
///
/// ```
/// use ballotmap_data::{adapters::FormatFamily, builtin_plugin};
/// use camino::Utf8Path;
///
/// let plugin = builtin_plugin("S12000042", Utf8Path::new("/data/dundee")).expect("built in");
/// assert_eq!(plugin.config.format, FormatFamily::GeoJsonCsv);
/// assert!(builtin_plugin("X01000000", Utf8Path::new("/data")).is_none());
/// ```
pub fn builtin_plugin(region_id: &str, base_dir: &Utf8Path) -> Option<RegionPlugin> {
    match region_id.trim() {
        reading::REGION_ID => reading::plugin(base_dir),
        braintree::REGION_ID => braintree::plugin(base_dir),
        bromsgrove::REGION_ID => bromsgrove::plugin(base_dir),
        dundee::REGION_ID => dundee::plugin(base_dir),
        _ => None,
    }
}
