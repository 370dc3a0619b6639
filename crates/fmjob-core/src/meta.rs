//! Cross-platform metadata helpers.

use std::fs::Metadata;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Get the device ID from metadata.
#[cfg(unix)]
pub fn device(metadata: &Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
pub fn device(_metadata: &Metadata) -> u64 {
    0 // Windows doesn't have device IDs in the same way
}

/// Get the inode number from metadata.
#[cfg(unix)]
pub fn inode(metadata: &Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
pub fn inode(_metadata: &Metadata) -> u64 {
    0
}

/// Get the number of 512-byte blocks from metadata.
#[cfg(unix)]
pub fn blocks(metadata: &Metadata) -> u64 {
    metadata.blocks()
}

#[cfg(not(unix))]
pub fn blocks(metadata: &Metadata) -> u64 {
    // Estimate blocks from file size (512-byte blocks, rounded up)
    metadata.len().div_ceil(512)
}

/// Get the permission bits and file type bits.
#[cfg(unix)]
pub fn mode(metadata: &Metadata) -> u32 {
    metadata.mode()
}

#[cfg(not(unix))]
pub fn mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

/// Get the owner (uid, gid).
#[cfg(unix)]
pub fn owner(metadata: &Metadata) -> (u32, u32) {
    (metadata.uid(), metadata.gid())
}

#[cfg(not(unix))]
pub fn owner(_metadata: &Metadata) -> (u32, u32) {
    (0, 0)
}
