use teloxide::prelude::*;

use crate::{config::SharedConfig, module_mgr::Module};

pub(crate) struct Config {
    config: Option<SharedConfig>,
}

impl Config {
    pub(crate) fn new(config: SharedConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl Module for Config {
    fn register_dependency(&mut self, dep_map: &mut DependencyMap) {
        if let Some(config) = self.config.take() {
            dep_map.insert(config);
        }
    }
}
