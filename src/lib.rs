//! Reader and writer for MapInfo vector datasets.
//!
//! Two on-disk flavours are supported: the binary TAB quartet
//! (`.tab` header, `.map` geometry, `.dat` attributes, `.id` index) and the
//! text MIF/MID pair. Both are reached through [`vector::Dataset`].
//!
//! ## Use
//!
//! ```no_run
//! use mitab::vector::Dataset;
//!
//! let dataset = Dataset::open("fixtures/towns.mif").unwrap();
//! for feature in dataset.features() {
//!     let feature = feature.unwrap();
//!     let name = feature.field("Name").unwrap();
//!     println!("{:?} {:?}", name, feature.geometry());
//! }
//! ```

#![crate_name = "mitab"]
#![crate_type = "lib"]

pub mod config;
pub mod errors;
pub mod mif;
pub mod options;
pub mod spatial_ref;
pub mod tab;
pub mod utils;
pub mod vector;
pub mod version;

pub use config::ProjectionBoundsTable;
pub use errors::{ErrorCategory, MitabError, Result};
pub use options::{DatasetOptions, Format};
pub use spatial_ref::{Bounds, CoordSys};
pub use vector::Dataset;
pub use version::version_num;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
fn assert_almost_eq(a: f64, b: f64) {
    let diff: f64 = b - a;
    assert!(diff.abs() < 1e-9, "{a} != {b}");
}
