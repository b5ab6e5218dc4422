#![doc(hidden)]

pub(crate) mod dptree_ext;

pub(crate) use dptree_ext::{command_filter, CommandArgs};
