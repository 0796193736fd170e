//! Multi-pass effects drawn after a batch's shader stages
//!
//! Both passes reuse the positions already uploaded for the batch and only
//! regenerate colors and texture coordinates.

pub mod dlight;
pub mod fog;
