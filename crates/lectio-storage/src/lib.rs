//! Lectio Storage Library
//!
//! The [`MediaStore`] trait is the boundary to durable object storage for uploaded
//! lecture videos. Every upload returns an opaque `asset_id` that callers persist and
//! later pass back to [`MediaStore::delete`]; URLs are never parsed to recover it.
//!
//! # Asset id format
//!
//! Backends in this crate use `{folder}/{uuid}.{ext}` where `folder` comes from
//! [`MediaKind::folder`]. Ids must not contain `..` or a leading `/`.

pub mod local;
pub mod traits;

pub use local::LocalMediaStore;
pub use traits::{MediaKind, MediaStore, StorageError, StorageResult, StoredAsset};
