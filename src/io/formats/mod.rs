//! Interchange formats.

pub mod opml;

pub use opml::{DecodedGroup, DecodedOutline, OutlineDescriptor, decode, encode};
