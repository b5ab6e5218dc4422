#![doc(hidden)]

use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::types::TeloxideHandler;

pub trait Module {
    fn register_dependency(&mut self, _dep_map: &mut DependencyMap) {}

    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry()
    }

    fn commands(&self) -> Vec<BotCommand> {
        vec![]
    }
}

#[derive(Default)]
pub struct ModuleManager {
    modules: Vec<Box<dyn Module + Send + 'static>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self { modules: vec![] }
    }

    pub fn register_module<M>(&mut self, module: M)
    where
        M: Module + Send + 'static,
    {
        self.modules.push(Box::new(module));
    }

    pub fn with_all_modules<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn Module),
    {
        for module in self.modules.iter_mut() {
            f(module.as_mut());
        }
    }

    /// Collects the commands of every module for the bot menu.
    pub fn commands(&mut self) -> Vec<BotCommand> {
        let mut commands = vec![];
        self.with_all_modules(|m| commands.extend(m.commands()));
        commands
    }
}
