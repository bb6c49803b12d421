pub mod add;
pub mod common;
pub mod completions;
pub mod create_list;
pub mod delete;
pub mod recent;
pub mod rename;
pub mod reset;
pub mod show;
pub mod suggest;
pub mod sync;
pub mod update;
pub mod watch;
