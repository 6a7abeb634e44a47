// Security module for filesystem access control
//
// The explorer reads partition files from a configured data root. Every
// file it opens is checked here first so that a crafted partition value or
// a stray symlink cannot make it read outside that root.

pub mod path_validator;

pub use path_validator::{PathSecurityError, validate_data_path};
