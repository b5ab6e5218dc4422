use teloxide::prelude::*;

use crate::{module_mgr::Module, relay::InferenceRelay};

/// Provides the [`InferenceRelay`] to the handlers of the other modules.
pub(crate) struct Relay {
    relay: Option<InferenceRelay>,
}

impl Relay {
    pub(crate) fn new(relay: InferenceRelay) -> Self {
        Self { relay: Some(relay) }
    }
}

impl Module for Relay {
    fn register_dependency(&mut self, dep_map: &mut DependencyMap) {
        if let Some(relay) = self.relay.take() {
            dep_map.insert(relay);
        }
    }
}
