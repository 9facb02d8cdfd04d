use std::collections::BTreeMap;

use crate::error::Error;
use crate::hierarchy::{ClassDescriptor, ClassLoader, OBJECT};
use crate::ir::Class;

/// Registered class set keyed by internal name.
#[derive(Clone, Debug, Default)]
pub(crate) struct ClassPool {
    classes: Vec<Class>,
    index: BTreeMap<String, usize>,
}

impl ClassPool {
    pub(crate) fn new(classes: Vec<Class>) -> Result<Self, Error> {
        let mut pool = Self {
            classes,
            index: BTreeMap::new(),
        };
        pool.reindex()?;
        Ok(pool)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Class> {
        self.index.get(name).map(|index| &self.classes[*index])
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub(crate) fn insert(&mut self, class: Class) -> Result<(), Error> {
        if self.index.contains_key(&class.name) {
            return Err(Error::DuplicateClass { name: class.name });
        }
        self.index.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Class> {
        let position = self.index.remove(name)?;
        let class = self.classes.remove(position);
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        Some(class)
    }

    pub(crate) fn clear(&mut self) {
        self.classes.clear();
        self.index.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes in registration order.
    pub(crate) fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Mutable access for in-place rewrites; call [`ClassPool::reindex`] after renaming.
    pub(crate) fn classes_mut(&mut self) -> &mut [Class] {
        &mut self.classes
    }

    /// Rebuilds the name index, failing if two classes now share a name.
    pub(crate) fn reindex(&mut self) -> Result<(), Error> {
        let mut index = BTreeMap::new();
        let mut duplicates = Vec::new();
        for (position, class) in self.classes.iter().enumerate() {
            if index.insert(class.name.clone(), position).is_some() {
                duplicates.push(class.name.clone());
            }
        }
        if !duplicates.is_empty() {
            duplicates.sort();
            duplicates.dedup();
            return Err(Error::DuplicateClass {
                name: duplicates.join(", "),
            });
        }
        self.index = index;
        Ok(())
    }

    pub(crate) fn into_classes(self) -> Vec<Class> {
        self.classes
    }
}

impl ClassLoader for ClassPool {
    fn load(&self, name: &str) -> Option<ClassDescriptor> {
        self.get(name).map(ClassDescriptor::from_class)
    }
}

/// Built-in knowledge of common JDK types, used as the last fallback loader.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PlatformClasses;

struct PlatformClass {
    name: &'static str,
    super_name: &'static str,
    interfaces: &'static [&'static str],
    is_interface: bool,
}

const fn class(
    name: &'static str,
    super_name: &'static str,
    interfaces: &'static [&'static str],
) -> PlatformClass {
    PlatformClass {
        name,
        super_name,
        interfaces,
        is_interface: false,
    }
}

const fn interface(name: &'static str, interfaces: &'static [&'static str]) -> PlatformClass {
    PlatformClass {
        name,
        super_name: OBJECT,
        interfaces,
        is_interface: true,
    }
}

const SERIALIZABLE: &str = "java/io/Serializable";
const COMPARABLE: &str = "java/lang/Comparable";
const CLONEABLE: &str = "java/lang/Cloneable";

const PLATFORM_CLASSES: &[PlatformClass] = &[
    interface(SERIALIZABLE, &[]),
    interface(COMPARABLE, &[]),
    interface(CLONEABLE, &[]),
    interface("java/lang/CharSequence", &[]),
    interface("java/lang/Appendable", &[]),
    interface("java/lang/Runnable", &[]),
    interface("java/lang/AutoCloseable", &[]),
    interface("java/io/Closeable", &["java/lang/AutoCloseable"]),
    interface("java/lang/Iterable", &[]),
    interface("java/util/Iterator", &[]),
    interface("java/util/RandomAccess", &[]),
    interface("java/util/Collection", &["java/lang/Iterable"]),
    interface("java/util/List", &["java/util/Collection"]),
    interface("java/util/Set", &["java/util/Collection"]),
    interface("java/util/SortedSet", &["java/util/Set"]),
    interface("java/util/NavigableSet", &["java/util/SortedSet"]),
    interface("java/util/Queue", &["java/util/Collection"]),
    interface("java/util/Deque", &["java/util/Queue"]),
    interface("java/util/Map", &[]),
    interface("java/util/SortedMap", &["java/util/Map"]),
    interface("java/util/NavigableMap", &["java/util/SortedMap"]),
    class("java/lang/String", OBJECT, &[SERIALIZABLE, COMPARABLE, "java/lang/CharSequence"]),
    class("java/lang/AbstractStringBuilder", OBJECT, &["java/lang/Appendable", "java/lang/CharSequence"]),
    class("java/lang/StringBuilder", "java/lang/AbstractStringBuilder", &[SERIALIZABLE, COMPARABLE, "java/lang/CharSequence"]),
    class("java/lang/Class", OBJECT, &[SERIALIZABLE]),
    class("java/lang/Enum", OBJECT, &[COMPARABLE, SERIALIZABLE]),
    class("java/lang/Record", OBJECT, &[]),
    class("java/lang/Number", OBJECT, &[SERIALIZABLE]),
    class("java/lang/Byte", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Short", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Integer", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Long", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Float", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Double", "java/lang/Number", &[COMPARABLE]),
    class("java/lang/Boolean", OBJECT, &[SERIALIZABLE, COMPARABLE]),
    class("java/lang/Character", OBJECT, &[SERIALIZABLE, COMPARABLE]),
    class("java/lang/Throwable", OBJECT, &[SERIALIZABLE]),
    class("java/lang/Exception", "java/lang/Throwable", &[]),
    class("java/lang/Error", "java/lang/Throwable", &[]),
    class("java/lang/RuntimeException", "java/lang/Exception", &[]),
    class("java/lang/IllegalArgumentException", "java/lang/RuntimeException", &[]),
    class("java/lang/IllegalStateException", "java/lang/RuntimeException", &[]),
    class("java/lang/NullPointerException", "java/lang/RuntimeException", &[]),
    class("java/lang/UnsupportedOperationException", "java/lang/RuntimeException", &[]),
    class("java/io/IOException", "java/lang/Exception", &[]),
    class("java/util/AbstractCollection", OBJECT, &["java/util/Collection"]),
    class("java/util/AbstractList", "java/util/AbstractCollection", &["java/util/List"]),
    class("java/util/AbstractSequentialList", "java/util/AbstractList", &[]),
    class("java/util/ArrayList", "java/util/AbstractList", &["java/util/List", "java/util/RandomAccess", CLONEABLE, SERIALIZABLE]),
    class("java/util/LinkedList", "java/util/AbstractSequentialList", &["java/util/List", "java/util/Deque", CLONEABLE, SERIALIZABLE]),
    class("java/util/Vector", "java/util/AbstractList", &["java/util/List", "java/util/RandomAccess", CLONEABLE, SERIALIZABLE]),
    class("java/util/Stack", "java/util/Vector", &[]),
    class("java/util/AbstractSet", "java/util/AbstractCollection", &["java/util/Set"]),
    class("java/util/HashSet", "java/util/AbstractSet", &["java/util/Set", CLONEABLE, SERIALIZABLE]),
    class("java/util/LinkedHashSet", "java/util/HashSet", &["java/util/Set", CLONEABLE, SERIALIZABLE]),
    class("java/util/TreeSet", "java/util/AbstractSet", &["java/util/NavigableSet", CLONEABLE, SERIALIZABLE]),
    class("java/util/ArrayDeque", "java/util/AbstractCollection", &["java/util/Deque", CLONEABLE, SERIALIZABLE]),
    class("java/util/AbstractMap", OBJECT, &["java/util/Map"]),
    class("java/util/HashMap", "java/util/AbstractMap", &["java/util/Map", CLONEABLE, SERIALIZABLE]),
    class("java/util/LinkedHashMap", "java/util/HashMap", &["java/util/Map"]),
    class("java/util/TreeMap", "java/util/AbstractMap", &["java/util/NavigableMap", CLONEABLE, SERIALIZABLE]),
];

impl ClassLoader for PlatformClasses {
    fn load(&self, name: &str) -> Option<ClassDescriptor> {
        let class = PLATFORM_CLASSES.iter().find(|class| class.name == name)?;
        Some(ClassDescriptor {
            name: class.name.to_string(),
            super_name: Some(class.super_name.to_string()),
            interfaces: class.interfaces.iter().map(|name| name.to_string()).collect(),
            is_interface: class.is_interface,
        })
    }
}
