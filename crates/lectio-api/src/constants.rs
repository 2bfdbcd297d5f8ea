//! API constants.

/// Prefix of every versioned route.
pub const API_PREFIX: &str = "/api/v1";

/// Where uploaded media is served from when the local media store is used.
pub const MEDIA_ROUTE: &str = "/media";

/// Helper macro for building versioned route paths at compile time.
///
/// `api_path!("/classes")` expands to `"/api/v1/classes"`.
#[macro_export]
macro_rules! api_path {
    ($path:expr) => {
        concat!("/api/v1", $path)
    };
}
