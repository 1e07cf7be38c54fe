use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Marker stored by [`Handle::sentinel`].
struct Present;

/// Opaque reference to a loaded library.
///
/// The cache never looks inside a handle; it only stores and clones it. Cloning
/// is cheap (reference-counted) and every clone refers to the same value, so
/// all callers waiting on the same load receive interchangeable handles.
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The "it loaded, but there's nothing to hand back" value, used when a
    /// library was requested without a presence check.
    pub fn sentinel() -> Self {
        Self::new(Present)
    }

    pub fn is_sentinel(&self) -> bool {
        self.0.is::<Present>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Whether both handles refer to the same underlying value.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_sentinel() {
            true => f.write_str("Handle(<sentinel>)"),
            false => f.write_str("Handle(..)"),
        }
    }
}
