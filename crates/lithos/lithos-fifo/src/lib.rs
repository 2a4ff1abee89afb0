mod device;
mod error;
mod host;
mod module;
mod ring;
mod transfer;

pub use device::{
    BufferStats, FifoDevice, FifoFile, HandleId, O_ACCMODE, O_RDONLY, O_RDWR, O_WRONLY, OpenMode,
};
pub use error::{CopyFault, FifoError, StartError};
pub use host::{ClassId, DevNum, HostRegistrar, RegistrarError};
pub use module::{FifoModule, ModuleSettings};
pub use ring::{FIFO_CAPACITY, RingBuffer};
pub use transfer::{UserSink, UserSource};
