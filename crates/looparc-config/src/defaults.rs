//! Default values applied when a configuration document omits optional fields.

/// Pattern used when a source does not list any; selects the immediate children.
pub const DEFAULT_PATTERN: &str = "*";
/// Device path template used when a device source omits `path_format`.
pub const DEFAULT_DEVICE_PATH_FORMAT: &str = "/dev/disk/by-uuid/{uuid}";
/// Log level used when the document has no `logging` section.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Placeholder substituted with the device UUID in `path_format`.
pub(crate) const UUID_PLACEHOLDER: &str = "{uuid}";
