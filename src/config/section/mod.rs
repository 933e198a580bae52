//! Configuration section definitions.
//!
//! | Module   | TOML Section | Purpose                              |
//! |----------|--------------|--------------------------------------|
//! | `serve`  | `[serve]`    | Listeners, watch, browser launch     |
//! | `render` | `[render]`   | Markdown rendering and cache         |
//! | `search` | `[search]`   | Full-text search limits              |

mod render;
mod search;
mod serve;

pub use render::RenderConfig;
pub use search::SearchConfig;
pub use serve::ServeConfig;
