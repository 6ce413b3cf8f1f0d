mod mirror;

pub use mirror::{MirrorConfig, ValidationError};
