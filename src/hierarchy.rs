use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::debug;

use crate::classpath::ClassPool;
use crate::error::Error;
use crate::ir::Class;

/// Internal name of the hierarchy root.
pub(crate) const OBJECT: &str = "java/lang/Object";

/// Supertype information for one class, as needed by hierarchy queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ClassDescriptor {
    pub(crate) name: String,
    /// `None` only for the root object type.
    pub(crate) super_name: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) is_interface: bool,
}

impl ClassDescriptor {
    pub(crate) fn from_class(class: &Class) -> Self {
        Self {
            name: class.name.clone(),
            super_name: class.super_name.clone(),
            interfaces: class.interfaces.clone(),
            is_interface: class.is_interface(),
        }
    }

    fn root() -> Self {
        Self {
            name: OBJECT.to_string(),
            super_name: None,
            interfaces: Vec::new(),
            is_interface: false,
        }
    }
}

/// Fallback source for classes outside the registered set.
pub(crate) trait ClassLoader {
    fn load(&self, name: &str) -> Option<ClassDescriptor>;
}

/// Tries each loader in order.
#[derive(Default)]
pub(crate) struct LoaderChain {
    loaders: Vec<Box<dyn ClassLoader>>,
}

impl LoaderChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, loader: impl ClassLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl ClassLoader for LoaderChain {
    fn load(&self, name: &str) -> Option<ClassDescriptor> {
        self.loaders.iter().find_map(|loader| loader.load(name))
    }
}

/// Answers subtype and common-supertype queries over a registered class pool.
///
/// Descriptors and interface closures are memoized for the resolver's lifetime. The pool is
/// borrowed, so it cannot change underneath the caches; [`HierarchyResolver::invalidate`]
/// covers loaders whose answers change.
pub(crate) struct HierarchyResolver<'a> {
    pool: &'a ClassPool,
    loader: &'a dyn ClassLoader,
    descriptors: RefCell<BTreeMap<String, Rc<ClassDescriptor>>>,
    interfaces: RefCell<BTreeMap<String, Rc<BTreeSet<String>>>>,
}

impl<'a> HierarchyResolver<'a> {
    pub(crate) fn new(pool: &'a ClassPool, loader: &'a dyn ClassLoader) -> Self {
        Self {
            pool,
            loader,
            descriptors: RefCell::new(BTreeMap::new()),
            interfaces: RefCell::new(BTreeMap::new()),
        }
    }

    /// Drops every memoized descriptor and interface closure. Call after mutating the pool's
    /// classes out of band.
    #[allow(dead_code)]
    pub(crate) fn invalidate(&self) {
        self.descriptors.borrow_mut().clear();
        self.interfaces.borrow_mut().clear();
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<Rc<ClassDescriptor>, Error> {
        if let Some(descriptor) = self.descriptors.borrow().get(name) {
            return Ok(Rc::clone(descriptor));
        }
        let descriptor = if name == OBJECT {
            ClassDescriptor::root()
        } else if let Some(class) = self.pool.get(name) {
            ClassDescriptor::from_class(class)
        } else if let Some(descriptor) = self.loader.load(name) {
            debug!("resolved {name} through fallback loader");
            descriptor
        } else {
            return Err(Error::Resolution {
                name: name.to_string(),
            });
        };
        let descriptor = Rc::new(descriptor);
        self.descriptors
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Whether a value of type `sub_candidate` is assignable to `super_candidate`.
    pub(crate) fn is_subtype(&self, super_candidate: &str, sub_candidate: &str) -> Result<bool, Error> {
        let target = self.resolve(super_candidate)?;
        if target.is_interface {
            return Ok(self.all_interfaces(sub_candidate)?.contains(&target.name));
        }
        let mut current = self.resolve(sub_candidate)?;
        let mut seen = BTreeSet::new();
        loop {
            if current.name == target.name {
                return Ok(true);
            }
            let Some(super_name) = current.super_name.as_deref() else {
                return Ok(false);
            };
            if !seen.insert(super_name.to_string()) {
                return Err(cyclic(super_name));
            }
            current = self.resolve(super_name)?;
        }
    }

    /// Transitive closure of implemented interfaces, including those of every superclass.
    /// An interface is part of its own closure.
    pub(crate) fn all_interfaces(&self, name: &str) -> Result<Rc<BTreeSet<String>>, Error> {
        self.collect_interfaces(name, &mut BTreeSet::new())
    }

    fn collect_interfaces(
        &self,
        name: &str,
        visiting: &mut BTreeSet<String>,
    ) -> Result<Rc<BTreeSet<String>>, Error> {
        if let Some(closure) = self.interfaces.borrow().get(name) {
            return Ok(Rc::clone(closure));
        }
        if !visiting.insert(name.to_string()) {
            return Err(cyclic(name));
        }
        let descriptor = self.resolve(name)?;
        let mut closure = BTreeSet::new();
        if descriptor.is_interface {
            closure.insert(descriptor.name.clone());
        }
        for interface in &descriptor.interfaces {
            closure.insert(interface.clone());
            closure.extend(self.collect_interfaces(interface, visiting)?.iter().cloned());
        }
        if let Some(super_name) = &descriptor.super_name {
            closure.extend(self.collect_interfaces(super_name, visiting)?.iter().cloned());
        }
        visiting.remove(name);
        let closure = Rc::new(closure);
        self.interfaces
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&closure));
        Ok(closure)
    }

    /// Most specific common supertype, following the verifier's merge rules.
    pub(crate) fn common_superclass(&self, a: &str, b: &str) -> Result<Rc<ClassDescriptor>, Error> {
        let a = self.resolve(a)?;
        let mut b = self.resolve(b)?;
        let mut seen = BTreeSet::new();
        loop {
            if a.name == OBJECT {
                return Ok(a);
            }
            if b.name == OBJECT {
                return Ok(b);
            }
            if self.is_subtype(&a.name, &b.name)? {
                return Ok(a);
            }
            if self.is_subtype(&b.name, &a.name)? {
                return Ok(b);
            }
            if a.is_interface || b.is_interface {
                return self.resolve(OBJECT);
            }
            let super_name = b.super_name.clone().unwrap_or_else(|| OBJECT.to_string());
            if !seen.insert(super_name.clone()) {
                return Err(cyclic(&super_name));
            }
            b = self.resolve(&super_name)?;
        }
    }
}

fn cyclic(name: &str) -> Error {
    Error::Resolution {
        name: format!("{name} (cyclic hierarchy)"),
    }
}

/// Direct subclasses per superclass name, over the given classes.
pub(crate) fn subclass_index<'c>(
    classes: impl IntoIterator<Item = &'c Class>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for class in classes {
        if let Some(super_name) = &class.super_name {
            children
                .entry(super_name.clone())
                .or_default()
                .insert(class.name.clone());
        }
    }
    children
}

/// Every transitive subclass of `name` known to the index.
pub(crate) fn descendants(
    children: &BTreeMap<String, BTreeSet<String>>,
    name: &str,
) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut pending = vec![name];
    while let Some(current) = pending.pop() {
        if let Some(direct) = children.get(current) {
            for child in direct {
                if found.insert(child.clone()) {
                    pending.push(child);
                }
            }
        }
    }
    found.remove(name);
    found
}
