//! Subcommands implemented by dockscript itself

pub mod project;
