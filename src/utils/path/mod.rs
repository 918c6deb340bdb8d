//! Path utilities.
//!
//! - [`fs`]: Filesystem helpers (`normalize_path`, `walk_relative`, `copy_dir_all`)

pub mod fs;

pub use fs::{WalkEntry, copy_dir_all, normalize_path, remove_dir_if_exists, walk_relative};
