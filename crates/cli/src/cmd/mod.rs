mod detect;
mod info;
mod run;

pub use detect::cmd_detect;
pub use info::cmd_info;
pub use run::cmd_run;
