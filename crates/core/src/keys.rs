//! Content identity keys.
//!
//! A media key must stay stable across re-scans of an unchanged file and
//! across case-only path differences, and must change when the content
//! does. On unix the local key leans on the filesystem identity (device
//! and inode) so a rename inside the share keeps the key; remote backends
//! only have the path and observed metadata to work with.

/// Key for an entry reached over a network backend, or anywhere no stable
/// filesystem identity exists. Absent mtimes hash as zero so a backend
/// that never reports timestamps still yields stable keys.
pub fn remote_media_key(share_id: &str, path: &str, size: u64, mtime: Option<i64>) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        share_id,
        path.to_lowercase(),
        size,
        mtime.unwrap_or(0)
    );
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Key for a local file, from the platform file identity plus size.
/// Platforms without a usable identity go through the remote form.
#[cfg(unix)]
pub fn local_media_key(share_id: &str, meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    let input = format!("{}|{}:{}|{}", share_id, meta.dev(), meta.ino(), meta.len());
    blake3::hash(input.as_bytes()).to_hex().to_string()
}
