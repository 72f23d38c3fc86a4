//! Container formats. Only MPEG transport streams are supported.

pub mod ts;
