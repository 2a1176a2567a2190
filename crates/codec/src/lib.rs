//! Process-wide serialization codecs.
//!
//! Two codecs are shared by every part of a keystone process: a human-readable JSON
//! codec and a compact binary codec. Types become encodable by registering a
//! [`SerializationExtension`] on a [`Codec`]; the bootstrap registers every extension
//! on both codecs so they agree on the same set of domain types.

mod codec;
pub mod error;
mod extension;
mod shared;

pub use codec::{Codec, CodecFormat, Tagged};
pub use error::{CodecError, Result};
pub use extension::{Document, SerializationExtension, TypeBinding, TypeRegistrations};
pub use shared::SharedCodecs;
