//! Weak registry of every shared runtime object the interpreter allocates.
//!
//! Closures capture environments, environments hold instances, instances hold
//! bound methods whose closure points back at them: plain `Rc` counting never
//! frees such graphs.  The heap keeps a `Weak` handle to each allocation and,
//! when the owning interpreter is dropped, empties whatever is still alive so
//! every cycle falls apart.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::environment::{EnvRef, Environment};
use crate::value::{ArrayRef, Class, Instance, InstanceRef, Value};

/// Dead handles are pruned once the registry grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

pub struct Heap {
    environments: Vec<Weak<RefCell<Environment>>>,
    instances: Vec<Weak<RefCell<Instance>>>,
    arrays: Vec<Weak<RefCell<Vec<Value>>>>,
    next_prune: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            environments: Vec::new(),
            instances: Vec::new(),
            arrays: Vec::new(),
            next_prune: PRUNE_THRESHOLD,
        }
    }

    pub fn environment(&mut self, enclosing: Option<EnvRef>) -> EnvRef {
        let env: EnvRef = Rc::new(RefCell::new(match enclosing {
            Some(enclosing) => Environment::with_enclosing(enclosing),
            None => Environment::new(),
        }));

        self.environments.push(Rc::downgrade(&env));
        self.maybe_prune();
        env
    }

    pub fn instance(&mut self, class: Option<Rc<Class>>) -> InstanceRef {
        let instance: InstanceRef = Rc::new(RefCell::new(Instance::new(class)));

        self.instances.push(Rc::downgrade(&instance));
        self.maybe_prune();
        instance
    }

    pub fn array(&mut self, items: Vec<Value>) -> ArrayRef {
        let array: ArrayRef = Rc::new(RefCell::new(items));

        self.arrays.push(Rc::downgrade(&array));
        self.maybe_prune();
        array
    }

    /// Number of tracked objects still reachable from somewhere.
    pub fn live_objects(&self) -> usize {
        let live = |count: usize, alive: bool| count + usize::from(alive);

        self.environments
            .iter()
            .map(|w| w.strong_count() > 0)
            .chain(self.instances.iter().map(|w| w.strong_count() > 0))
            .chain(self.arrays.iter().map(|w| w.strong_count() > 0))
            .fold(0, live)
    }

    fn maybe_prune(&mut self) {
        let tracked: usize = self.environments.len() + self.instances.len() + self.arrays.len();

        if tracked < self.next_prune {
            return;
        }

        self.environments.retain(|w| w.strong_count() > 0);
        self.instances.retain(|w| w.strong_count() > 0);
        self.arrays.retain(|w| w.strong_count() > 0);

        let remaining: usize =
            self.environments.len() + self.instances.len() + self.arrays.len();
        self.next_prune = (remaining * 2).max(PRUNE_THRESHOLD);

        debug!("Heap pruned: {} of {} handles still live", remaining, tracked);
    }

    /// Empties every live object.  Contents are moved out before being
    /// dropped so no `RefCell` borrow is held while destructors run.
    pub fn sweep(&mut self) {
        let mut cleared: usize = 0;

        for env in self.environments.drain(..).filter_map(|w| w.upgrade()) {
            let contents = env.borrow_mut().clear();
            drop(contents);
            cleared += 1;
        }

        for instance in self.instances.drain(..).filter_map(|w| w.upgrade()) {
            let fields = std::mem::take(&mut instance.borrow_mut().fields);
            drop(fields);
            cleared += 1;
        }

        for array in self.arrays.drain(..).filter_map(|w| w.upgrade()) {
            let items = std::mem::take(&mut *array.borrow_mut());
            drop(items);
            cleared += 1;
        }

        debug!("Heap swept {} live object(s)", cleared);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionDecl;
    use crate::value::{Callable, Function};

    #[test]
    fn sweep_breaks_closure_cycles() {
        let mut heap = Heap::new();
        let env: EnvRef = heap.environment(None);

        // env → function → closure (env)
        let decl = Rc::new(FunctionDecl {
            name: None,
            params: vec![],
            body: vec![],
        });
        let function = Function::new(decl, Rc::clone(&env), false);
        env.borrow_mut()
            .define("f", Value::Callable(Callable::Function(Rc::new(function))));

        let weak_env = Rc::downgrade(&env);
        drop(env);

        assert!(weak_env.upgrade().is_some());
        assert_eq!(heap.live_objects(), 1);

        heap.sweep();

        assert!(weak_env.upgrade().is_none());
        assert_eq!(heap.live_objects(), 0);
    }
}
