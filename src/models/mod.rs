//! API types for the `cdn.k8s.toms.place` group.
//!
//! `File` is the metadata record, `FileContent` is the response shape of its
//! content subresource, and `Table` is the tabular rendering used by listing
//! clients. All types serialize as camelCase JSON via `serde`.

pub mod file;
pub mod status;
pub mod table;

/// API group served by this process.
pub const GROUP_NAME: &str = "cdn.k8s.toms.place";

/// The single served version of [`GROUP_NAME`].
pub const VERSION: &str = "v1alpha1";

/// `apiVersion` string for objects in this group.
pub fn group_version() -> String {
    format!("{}/{}", GROUP_NAME, VERSION)
}
