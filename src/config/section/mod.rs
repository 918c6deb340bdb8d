//! Configuration section definitions.
//!
//! Each module corresponds to a section in `tutorial.toml`:
//!
//! | Module   | TOML Section      | Purpose                              |
//! |----------|-------------------|--------------------------------------|
//! | `app`    | `[app]`           | Content source, target tree, parts   |
//! | `part`   | `[parts.<name>]`  | Per-part deployment policy and paths |
//! | `serve`  | `[server]`        | HTTP server                          |
//! | `live`   | `[live]`          | CGI bridge                           |

mod app;
mod live;
mod part;
mod serve;

pub use app::AppConfig;
pub use live::LiveConfig;
pub use part::{Part, PartConfig, PartKind};
pub use serve::ServeConfig;
