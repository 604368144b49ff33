//! Flutter bridge for the Remindr core.

pub mod api;
