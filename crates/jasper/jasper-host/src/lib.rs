//! In-process stand-in for the host device namespace.
//!
//! Hands out device numbers, keeps a table of classes and visible nodes, and
//! can be told to refuse a given registration step.

use lithos_fifo::{ClassId, DevNum, HostRegistrar, RegistrarError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// First major number handed out, the start of the dynamic range.
pub const FIRST_DYNAMIC_MAJOR: u32 = 240;

/// Last major number handed out.
pub const LAST_DYNAMIC_MAJOR: u32 = 254;

/// Registration step that [`InProcessHost::fail_at`] can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Region,
    Class,
    Cdev,
    Node,
}

#[derive(Debug, Default)]
pub struct InProcessHost {
    /// Allocated regions by major number, with the name they were taken under.
    regions: BTreeMap<u32, String>,
    classes: BTreeMap<u32, String>,
    cdevs: BTreeSet<DevNum>,
    /// Visible nodes by name.
    nodes: BTreeMap<String, (ClassId, DevNum)>,
    next_class: u32,
    fail: Option<Stage>,
}

impl InProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next attempt at `stage` fail with [`RegistrarError::Refused`].
    pub fn fail_at(&mut self, stage: Stage) -> &mut Self {
        self.fail = Some(stage);
        self
    }

    fn refuse(&mut self, stage: Stage) -> Result<(), RegistrarError> {
        if self.fail == Some(stage) {
            self.fail = None;
            return Err(RegistrarError::Refused(format!("{stage:?} disabled")));
        }
        Ok(())
    }

    /// Device number published under `node_name`, if any.
    pub fn lookup(&self, node_name: &str) -> Option<DevNum> {
        self.nodes.get(node_name).map(|&(_, dev)| dev)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// True when nothing is registered.
    pub fn is_clean(&self) -> bool {
        self.regions.is_empty()
            && self.classes.is_empty()
            && self.cdevs.is_empty()
            && self.nodes.is_empty()
    }
}

impl HostRegistrar for InProcessHost {
    fn alloc_region(&mut self, name: &str) -> Result<DevNum, RegistrarError> {
        self.refuse(Stage::Region)?;
        let major = (FIRST_DYNAMIC_MAJOR..=LAST_DYNAMIC_MAJOR)
            .find(|m| !self.regions.contains_key(m))
            .ok_or(RegistrarError::Exhausted)?;
        self.regions.insert(major, name.to_string());
        debug!(major, name, "region allocated");
        Ok(DevNum::new(major, 0))
    }

    fn create_class(&mut self, name: &str) -> Result<ClassId, RegistrarError> {
        self.refuse(Stage::Class)?;
        if self.classes.values().any(|n| n == name) {
            return Err(RegistrarError::AlreadyExists(name.to_string()));
        }
        let id = self.next_class;
        self.next_class += 1;
        self.classes.insert(id, name.to_string());
        Ok(ClassId(id))
    }

    fn add_cdev(&mut self, dev: DevNum) -> Result<(), RegistrarError> {
        self.refuse(Stage::Cdev)?;
        if !self.cdevs.insert(dev) {
            return Err(RegistrarError::AlreadyExists(dev.to_string()));
        }
        Ok(())
    }

    fn create_node(
        &mut self,
        class: ClassId,
        dev: DevNum,
        node_name: &str,
    ) -> Result<(), RegistrarError> {
        self.refuse(Stage::Node)?;
        if self.nodes.contains_key(node_name) {
            return Err(RegistrarError::AlreadyExists(node_name.to_string()));
        }
        self.nodes.insert(node_name.to_string(), (class, dev));
        debug!(node = node_name, %dev, "node created");
        Ok(())
    }

    fn remove_node(&mut self, class: ClassId, dev: DevNum) {
        self.nodes.retain(|_, &mut entry| entry != (class, dev));
    }

    fn del_cdev(&mut self, dev: DevNum) {
        self.cdevs.remove(&dev);
    }

    fn destroy_class(&mut self, class: ClassId) {
        self.classes.remove(&class.0);
    }

    fn release_region(&mut self, dev: DevNum) {
        self.regions.remove(&dev.major);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_fifo::{FifoModule, ModuleSettings, OpenMode, StartError};

    #[test]
    fn module_publishes_node_and_cleans_up() {
        let mut host = InProcessHost::new();
        let module = FifoModule::start(&mut host, &ModuleSettings::default()).unwrap();
        assert_eq!(module.node_name(), "simplefifo-0");
        assert_eq!(module.dev_num().major, FIRST_DYNAMIC_MAJOR);

        let file = module.open(OpenMode::ReadWrite).unwrap();
        assert_eq!(file.write(b"simple char").unwrap(), 11);
        file.close();
        module.stop();

        assert!(host.is_clean());
    }

    #[test]
    fn majors_are_allocated_upward() {
        let mut host = InProcessHost::new();
        let a = host.alloc_region("a").unwrap();
        let b = host.alloc_region("b").unwrap();
        assert_eq!(a.major, FIRST_DYNAMIC_MAJOR);
        assert_eq!(b.major, FIRST_DYNAMIC_MAJOR + 1);
        // A released major is the lowest free one again.
        host.release_region(a);
        assert_eq!(host.alloc_region("c").unwrap(), a);
    }

    #[test]
    fn dynamic_range_runs_out() {
        let mut host = InProcessHost::new();
        for major in FIRST_DYNAMIC_MAJOR..=LAST_DYNAMIC_MAJOR {
            assert_eq!(host.alloc_region("x").unwrap().major, major);
        }
        assert!(matches!(
            host.alloc_region("x"),
            Err(RegistrarError::Exhausted)
        ));
    }

    #[test]
    fn failed_start_leaves_host_clean() {
        for stage in [Stage::Region, Stage::Class, Stage::Cdev, Stage::Node] {
            let mut host = InProcessHost::new();
            host.fail_at(stage);
            let result = FifoModule::start(&mut host, &ModuleSettings::default());
            assert!(result.is_err(), "{stage:?} should fail");
            drop(result);
            assert!(host.is_clean(), "{stage:?} left registrations behind");
        }
    }

    #[test]
    fn duplicate_node_name_is_refused() {
        let settings = ModuleSettings::default();
        let mut host = InProcessHost::new();
        // Another driver already published the node name.
        host.create_node(ClassId(99), DevNum::new(1, 0), "simplefifo-0")
            .unwrap();
        let err = FifoModule::start(&mut host, &ModuleSettings {
            device_name: "other".into(),
            ..settings
        })
        .err()
        .unwrap();
        assert!(matches!(err, StartError::Node { .. }));
        assert_eq!(host.node_names().collect::<Vec<_>>(), ["simplefifo-0"]);
        assert_eq!(host.lookup("simplefifo-0"), Some(DevNum::new(1, 0)));
    }
}
