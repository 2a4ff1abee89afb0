use crate::host::RegistrarError;

/// Errors returned by the open/read/write data path.
///
/// Short counts are not errors: a write that returns fewer bytes than requested
/// (or zero) means some handle is out of room, and a read returning zero means
/// the caller's buffer is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FifoError {
    /// Handle storage could not be allocated. Nothing was registered.
    #[error("out of memory while allocating a fifo handle")]
    OutOfMemory,

    /// The caller's buffer could not be transferred.
    ///
    /// On write no handle was touched. On read the bytes had already been
    /// taken out of the caller's ring and are gone.
    #[error("bad address while copying fifo data")]
    CopyFault,
}

/// Marker returned by a [`UserSource`](crate::UserSource) or
/// [`UserSink`](crate::UserSink) whose memory cannot be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("copy across the trust boundary failed")]
pub struct CopyFault;

impl From<CopyFault> for FifoError {
    fn from(_: CopyFault) -> Self {
        FifoError::CopyFault
    }
}

/// Failure while registering the device with its host.
///
/// Each variant names the step that failed; every earlier step has already been
/// undone when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to allocate device region '{name}'")]
    Region {
        name: String,
        #[source]
        source: RegistrarError,
    },

    #[error("failed to create device class '{name}'")]
    Class {
        name: String,
        #[source]
        source: RegistrarError,
    },

    #[error("failed to add character device")]
    Cdev(#[source] RegistrarError),

    #[error("failed to create device node '{node}'")]
    Node {
        node: String,
        #[source]
        source: RegistrarError,
    },
}
