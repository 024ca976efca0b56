mod bookmarks;
mod config;
mod delete;
mod github;
mod layout;
mod logging;
mod popup;
mod scan;
mod status;
mod tmux;
mod watch;

pub use bookmarks::*;
pub use config::*;
pub use delete::*;
pub use github::*;
pub use layout::*;
pub use logging::*;
pub use popup::*;
pub use scan::*;
pub use status::*;
pub use tmux::*;
pub use watch::*;
