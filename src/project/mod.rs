//! Project layer: source enumeration and manifest reading.

pub mod manifest;
pub mod walker;

pub use manifest::Manifest;
pub use walker::SourceWalker;
