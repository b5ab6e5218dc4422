pub(crate) mod chat;
pub(crate) mod config;
pub(crate) mod imagine;
pub(crate) mod relay;
pub(crate) mod welcome;
