//! The shared fifo device: a registry of open handles behind one lock.
//!
//! Every open handle owns a private [`RingBuffer`]. A write through any handle
//! is broadcast into the rings of all open handles; a read only ever drains the
//! caller's own ring.
//!
//! # Locking
//!
//! One device-wide mutex guards registry membership and every ring. Each
//! operation (open insert, write, read, close removal) holds it from start to
//! finish, so operations on the same device are totally ordered. Nothing ever
//! waits for data: a write that does not fit returns a short count, a read of
//! an empty ring returns zero.
//!
//! # Write sizing
//!
//! A write is planned and committed under the same lock hold:
//!
//! ```text
//! plan:    any ring full?        ──yes──► return 0, nothing copied
//!          admissible = min(len, free(ring) for every ring)
//! copy:    copy_in(admissible)   ──err──► CopyFault, nothing mutated
//! commit:  append the same bytes to every ring
//!          (except the writer's own, when it was opened write-only)
//! ```
//!
//! Every ring therefore advances by the same count for each accepted write,
//! at the price of the slowest reader throttling all writers.

use crate::error::FifoError;
use crate::ring::{FIFO_CAPACITY, RingBuffer};
use crate::transfer::{UserSink, UserSource, VecSink};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, trace, warn};

/// Access-mode bits as found in the low bits of open flags.
pub const O_RDONLY: u32 = 0o0;
pub const O_WRONLY: u32 = 0o1;
pub const O_RDWR: u32 = 0o2;
pub const O_ACCMODE: u32 = 0o3;

/// How a handle was opened.
///
/// Only [`OpenMode::WriteOnly`] changes behaviour: such a handle does not
/// receive the bytes it writes itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl OpenMode {
    /// Decodes the access mode from raw open flags.
    ///
    /// ```
    /// use lithos_fifo::{OpenMode, O_WRONLY};
    /// assert_eq!(OpenMode::from_flags(O_WRONLY | 0o100), OpenMode::WriteOnly);
    /// ```
    pub fn from_flags(flags: u32) -> Self {
        match flags & O_ACCMODE {
            O_RDONLY => OpenMode::ReadOnly,
            O_WRONLY => OpenMode::WriteOnly,
            _ => OpenMode::ReadWrite,
        }
    }

    #[inline]
    pub fn is_write_only(self) -> bool {
        self == OpenMode::WriteOnly
    }
}

/// Identifier of an open handle, unique for the lifetime of a device.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of one handle's ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferStats {
    pub len: usize,
    pub read_cursor: usize,
    pub write_cursor: usize,
}

impl BufferStats {
    fn of(ring: &RingBuffer) -> Self {
        Self {
            len: ring.len(),
            read_cursor: ring.read_cursor(),
            write_cursor: ring.write_cursor(),
        }
    }
}

/// Per-handle state owned by the registry.
#[derive(Debug)]
struct Client {
    id: HandleId,
    write_only: bool,
    ring: RingBuffer,
}

#[derive(Debug, Default)]
struct Registry {
    clients: Vec<Client>,
    next_id: u64,
}

impl Registry {
    fn get_mut(&mut self, id: HandleId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    fn get(&self, id: HandleId) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }
}

/// A shared broadcast fifo that any number of handles can open.
#[derive(Debug, Default)]
pub struct FifoDevice {
    registry: Mutex<Registry>,
    /// Upper bound on simultaneously open handles; reaching it fails `open`
    /// with `OutOfMemory`, as an exhausted allocator would.
    handle_budget: Option<usize>,
}

impl FifoDevice {
    /// Creates a device with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device that can hold at most `budget` open handles.
    pub fn with_handle_budget(budget: usize) -> Self {
        Self {
            registry: Mutex::default(),
            handle_budget: Some(budget),
        }
    }

    /// Opens a new handle with an empty ring.
    ///
    /// The ring is allocated before the lock is taken. If allocation or
    /// registration fails the registry is left untouched and
    /// [`FifoError::OutOfMemory`] is returned.
    pub fn open(&self, mode: OpenMode) -> Result<FifoFile<'_>, FifoError> {
        let ring = RingBuffer::try_new().map_err(|_| FifoError::OutOfMemory)?;

        let mut registry = self.registry.lock();
        if self
            .handle_budget
            .is_some_and(|budget| registry.clients.len() >= budget)
        {
            debug!(open = registry.clients.len(), "fifo handle budget exhausted");
            return Err(FifoError::OutOfMemory);
        }
        registry
            .clients
            .try_reserve(1)
            .map_err(|_| FifoError::OutOfMemory)?;

        let id = HandleId(registry.next_id);
        registry.next_id += 1;
        registry.clients.push(Client {
            id,
            write_only: mode.is_write_only(),
            ring,
        });
        let open = registry.clients.len();
        drop(registry);

        debug!(handle = %id, ?mode, open, "fifo opened");
        Ok(FifoFile {
            device: self,
            id,
            mode,
        })
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.registry.lock().clients.len()
    }

    /// Broadcasts the leading bytes of `src` on behalf of `writer`.
    ///
    /// `writer` only matters for the write-only exclusion; an id that is not
    /// registered excludes nobody.
    fn write_from<S: UserSource + ?Sized>(
        &self,
        writer: HandleId,
        src: &S,
    ) -> Result<usize, FifoError> {
        let mut registry = self.registry.lock();

        // Plan: the write must fit in every ring, including ones that will not
        // receive it.
        let mut admissible = src.len();
        for client in &registry.clients {
            if client.ring.is_full() {
                trace!(writer = %writer, full = %client.id, "fifo write rejected, peer full");
                return Ok(0);
            }
            admissible = admissible.min(client.ring.free());
        }

        let mut stack = [0u8; FIFO_CAPACITY];
        let mut heap: Vec<u8> = Vec::new();
        let staging: &mut [u8] = if admissible <= FIFO_CAPACITY {
            &mut stack[..admissible]
        } else {
            // Only reachable with an empty registry.
            heap.resize(admissible, 0);
            &mut heap
        };

        if let Err(fault) = src.copy_in(staging) {
            warn!(writer = %writer, admissible, "fifo write copy-in failed");
            return Err(fault.into());
        }

        // Commit.
        let skip = registry
            .get(writer)
            .filter(|c| c.write_only)
            .map(|c| c.id);
        for client in registry
            .clients
            .iter_mut()
            .filter(|c| Some(c.id) != skip)
        {
            let appended = client.ring.append(staging);
            debug_assert_eq!(appended, admissible);
        }

        trace!(writer = %writer, requested = src.len(), admissible, "fifo write");
        Ok(admissible)
    }

    /// Drains up to `dst.capacity()` bytes of `reader`'s ring into `dst`.
    ///
    /// The bytes leave the ring before the copy-out is attempted. If the copy
    /// fails they are not put back.
    fn read_into<S: UserSink + ?Sized>(
        &self,
        reader: HandleId,
        dst: &mut S,
    ) -> Result<usize, FifoError> {
        let mut registry = self.registry.lock();
        let Some(client) = registry.get_mut(reader) else {
            debug_assert!(false, "read through unregistered handle {reader}");
            return Ok(0);
        };
        if client.ring.is_empty() {
            return Ok(0);
        }

        let mut staging = [0u8; FIFO_CAPACITY];
        let want = dst.capacity().min(FIFO_CAPACITY);
        let n = client.ring.consume_into(&mut staging[..want]);

        // Still under the lock: the copy-out is part of the same critical section.
        if let Err(fault) = dst.copy_out(&staging[..n]) {
            warn!(reader = %reader, lost = n, "fifo read copy-out failed, bytes dropped");
            return Err(fault.into());
        }
        drop(registry);

        trace!(reader = %reader, read = n, "fifo read");
        Ok(n)
    }

    fn stats_of(&self, id: HandleId) -> Option<BufferStats> {
        self.registry
            .lock()
            .get(id)
            .map(|client| BufferStats::of(&client.ring))
    }

    fn remove(&self, id: HandleId) {
        let mut registry = self.registry.lock();
        let pos = registry.clients.iter().position(|c| c.id == id);
        let removed = pos.map(|pos| registry.clients.swap_remove(pos));
        let open = registry.clients.len();
        drop(registry);

        debug_assert!(removed.is_some(), "handle {id} closed twice");
        // The ring is freed here, outside the lock.
        drop(removed);
        debug!(handle = %id, open, "fifo closed");
    }
}

/// An open session on a [`FifoDevice`].
///
/// The session exclusively owns its registry entry. Dropping it (or calling
/// [`close`](Self::close)) removes the entry and frees the ring; after that
/// nothing can reach it.
#[derive(Debug)]
pub struct FifoFile<'d> {
    device: &'d FifoDevice,
    id: HandleId,
    mode: OpenMode,
}

impl<'d> FifoFile<'d> {
    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Broadcasts `src` to every open handle.
    ///
    /// Returns how many leading bytes of `src` were accepted. That count is the
    /// smallest free space across all open rings, and 0 as soon as one of them
    /// is full. Every receiving ring gets exactly those bytes.
    ///
    /// # Errors
    /// [`FifoError::CopyFault`] if `src` could not be read; no ring changed.
    pub fn write<S: UserSource + ?Sized>(&self, src: &S) -> Result<usize, FifoError> {
        self.device.write_from(self.id, src)
    }

    /// Moves up to `dst.capacity()` bytes from this handle's ring into `dst`.
    ///
    /// Returns 0 when the ring is empty.
    ///
    /// # Errors
    /// [`FifoError::CopyFault`] if `dst` could not be written. The bytes were
    /// already removed from the ring and are lost.
    pub fn read<S: UserSink + ?Sized>(&self, dst: &mut S) -> Result<usize, FifoError> {
        self.device.read_into(self.id, dst)
    }

    /// Reads up to `max_count` bytes into a fresh vector.
    pub fn read_to_vec(&self, max_count: usize) -> Result<Vec<u8>, FifoError> {
        let mut sink = VecSink::new(max_count);
        self.read(&mut sink)?;
        Ok(sink.buf)
    }

    /// Snapshot of this handle's ring, taken under the device lock.
    pub fn stats(&self) -> BufferStats {
        self.device
            .stats_of(self.id)
            .unwrap_or(BufferStats {
                len: 0,
                read_cursor: 0,
                write_cursor: 0,
            })
    }

    /// Closes the handle, removing it from the device.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FifoFile<'_> {
    fn drop(&mut self) {
        self.device.remove(self.id);
    }
}
