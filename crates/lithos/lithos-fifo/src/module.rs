//! Device lifecycle: register with the host at start, unregister at stop.

use crate::device::{FifoDevice, FifoFile, OpenMode};
use crate::error::{FifoError, StartError};
use crate::host::{ClassId, DevNum, HostRegistrar};
use tracing::{debug, info, warn};

/// Names and limits used when bringing the device up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSettings {
    /// Region and class name, e.g. `simpleFifo`.
    pub device_name: String,
    /// Node name prefix; the node is called `{node_prefix}-{minor}`.
    pub node_prefix: String,
    pub handle_budget: Option<usize>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            device_name: "simpleFifo".into(),
            node_prefix: "simplefifo".into(),
            handle_budget: None,
        }
    }
}

/// A fifo device registered with a host.
///
/// Handles borrow the module, so it cannot be stopped while any of them is
/// still open.
pub struct FifoModule<H: HostRegistrar> {
    host: H,
    dev: DevNum,
    class: ClassId,
    node: String,
    device: FifoDevice,
}

impl<H: HostRegistrar> FifoModule<H> {
    /// Registers the device with `host` and creates its empty registry.
    ///
    /// Steps run in order: region, class, character device, node. If one fails,
    /// the steps already done are undone in reverse order and the failing step
    /// is reported. The registry only comes into existence once every step has
    /// succeeded.
    pub fn start(mut host: H, settings: &ModuleSettings) -> Result<Self, StartError> {
        let name = settings.device_name.as_str();

        let dev = host.alloc_region(name).map_err(|source| StartError::Region {
            name: name.to_string(),
            source,
        })?;
        debug!(%dev, name, "device region allocated");

        let class = match host.create_class(name) {
            Ok(class) => class,
            Err(source) => {
                warn!(name, error = %source, "class creation failed, releasing region");
                host.release_region(dev);
                return Err(StartError::Class {
                    name: name.to_string(),
                    source,
                });
            }
        };

        if let Err(source) = host.add_cdev(dev) {
            warn!(%dev, error = %source, "cdev add failed, rolling back");
            host.destroy_class(class);
            host.release_region(dev);
            return Err(StartError::Cdev(source));
        }

        let node = format!("{}-{}", settings.node_prefix, dev.minor);
        if let Err(source) = host.create_node(class, dev, &node) {
            warn!(%node, error = %source, "node creation failed, rolling back");
            host.del_cdev(dev);
            host.destroy_class(class);
            host.release_region(dev);
            return Err(StartError::Node { node, source });
        }

        let device = match settings.handle_budget {
            Some(budget) => FifoDevice::with_handle_budget(budget),
            None => FifoDevice::new(),
        };

        info!(%dev, %node, "simple fifo registered");
        Ok(Self {
            host,
            dev,
            class,
            node,
            device,
        })
    }

    pub fn device(&self) -> &FifoDevice {
        &self.device
    }

    /// Opens a handle on the registered device.
    pub fn open(&self, mode: OpenMode) -> Result<FifoFile<'_>, FifoError> {
        self.device.open(mode)
    }

    pub fn dev_num(&self) -> DevNum {
        self.dev
    }

    /// Name of the node published for this device.
    pub fn node_name(&self) -> &str {
        &self.node
    }

    /// Unregisters the device from its host.
    pub fn stop(self) {
        // Teardown happens in Drop.
        drop(self);
    }
}

impl<H: HostRegistrar> Drop for FifoModule<H> {
    fn drop(&mut self) {
        self.host.remove_node(self.class, self.dev);
        self.host.del_cdev(self.dev);
        self.host.destroy_class(self.class);
        self.host.release_region(self.dev);
        info!(dev = %self.dev, node = %self.node, "simple fifo unregistered");
    }
}
