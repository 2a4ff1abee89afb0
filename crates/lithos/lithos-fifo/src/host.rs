//! Registration of the device with its host environment.
//!
//! The host owns identifiers and visible names; the fifo only asks for them in
//! a fixed order and gives them back in reverse order.
//!
//! ```text
//! start:  alloc_region ─► create_class ─► add_cdev ─► create_node
//! stop:   remove_node  ─► del_cdev     ─► destroy_class ─► release_region
//! ```

use std::fmt;

/// Major/minor number pair identifying the device within the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevNum {
    pub major: u32,
    pub minor: u32,
}

impl DevNum {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Opaque handle to a device class created by the host.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// Error reported by a host step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrarError {
    #[error("no device numbers left")]
    Exhausted,

    #[error("'{0}' is already registered")]
    AlreadyExists(String),

    #[error("host refused the request: {0}")]
    Refused(String),
}

/// The steps a host performs to make the device visible.
///
/// Teardown methods are infallible: they are called during rollback and at
/// stop, where there is nothing useful to do with a failure.
pub trait HostRegistrar {
    /// Reserves a device number under `name`.
    fn alloc_region(&mut self, name: &str) -> Result<DevNum, RegistrarError>;

    fn create_class(&mut self, name: &str) -> Result<ClassId, RegistrarError>;

    /// Attaches the fifo's operations to `dev`.
    fn add_cdev(&mut self, dev: DevNum) -> Result<(), RegistrarError>;

    /// Publishes a node called `node_name` for `dev` under `class`.
    fn create_node(
        &mut self,
        class: ClassId,
        dev: DevNum,
        node_name: &str,
    ) -> Result<(), RegistrarError>;

    fn remove_node(&mut self, class: ClassId, dev: DevNum);

    fn del_cdev(&mut self, dev: DevNum);

    fn destroy_class(&mut self, class: ClassId);

    fn release_region(&mut self, dev: DevNum);
}

impl<H: HostRegistrar + ?Sized> HostRegistrar for &mut H {
    fn alloc_region(&mut self, name: &str) -> Result<DevNum, RegistrarError> {
        (**self).alloc_region(name)
    }

    fn create_class(&mut self, name: &str) -> Result<ClassId, RegistrarError> {
        (**self).create_class(name)
    }

    fn add_cdev(&mut self, dev: DevNum) -> Result<(), RegistrarError> {
        (**self).add_cdev(dev)
    }

    fn create_node(
        &mut self,
        class: ClassId,
        dev: DevNum,
        node_name: &str,
    ) -> Result<(), RegistrarError> {
        (**self).create_node(class, dev, node_name)
    }

    fn remove_node(&mut self, class: ClassId, dev: DevNum) {
        (**self).remove_node(class, dev)
    }

    fn del_cdev(&mut self, dev: DevNum) {
        (**self).del_cdev(dev)
    }

    fn destroy_class(&mut self, class: ClassId) {
        (**self).destroy_class(class)
    }

    fn release_region(&mut self, dev: DevNum) {
        (**self).release_region(dev)
    }
}
