//! CLI command implementations.
//!
//! | Module      | Commands handled |
//! |-------------|------------------|
//! | `serve`     | `Serve`          |
//! | `supervise` | `Supervise`      |
//! | `projects`  | `Projects`       |

pub mod projects;
pub mod serve;
pub mod supervise;

pub use projects::cmd_projects;
pub use serve::cmd_serve;
pub use supervise::cmd_supervise;
