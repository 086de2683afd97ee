//! The storage layer's two codecs: [`keycode`]/[`key`] build
//! order-preserving keys, and [`row_codec`] is the self-describing row
//! value encoding.

pub mod keycode;
pub mod key;
pub mod row_codec;
