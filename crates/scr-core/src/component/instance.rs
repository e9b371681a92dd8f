use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A service or component object as handed out by the registry
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a module (bundle) that owns components or requests services
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One live, activated instance of a component configuration
#[derive(Clone)]
pub struct ComponentInstance {
    id: u64,
    object: ServiceObject,
    /// Owner whose service request triggered the build, if any
    using_owner: Option<OwnerId>,
}

impl ComponentInstance {
    pub fn new(object: ServiceObject, using_owner: Option<OwnerId>) -> Self {
        Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            object,
            using_owner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn object(&self) -> ServiceObject {
        self.object.clone()
    }

    pub fn using_owner(&self) -> Option<&OwnerId> {
        self.using_owner.as_ref()
    }

    /// Downcast the component object to its concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::downcast::<T>(self.object.clone()).ok()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("using_owner", &self.using_owner)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ComponentInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentInstance {}
