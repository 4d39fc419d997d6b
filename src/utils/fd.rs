//! Anonymous shared-memory helpers backing the cross-process sync fence
//! and the MIT-SHM software presentation path (spec §4.4).

#![forbid(unsafe_op_in_unsafe_fn)]

use std::{io, os::fd::OwnedFd, ptr::NonNull};

use rustix::{
    fs::{ftruncate, memfd_create, MemfdFlags},
    mm::{mmap, munmap, MapFlags, ProtFlags},
};

/// Size of the anonymous file backing a sync fence. A single 64-bit
/// futex word, rounded up to a page by the kernel regardless.
pub const FENCE_MEM_SIZE: usize = 8;

/// An anonymous, memory-mapped file used as the client side of a
/// cross-process sync fence (spec §4.4 "Create a shared-memory fence").
///
/// The server is handed the same file's descriptor via
/// `dri3_fence_from_fd` and triggers the word at offset 0 when the image
/// becomes idle; the client side here only ever reads it.
#[derive(Debug)]
pub struct AnonymousMapping {
    fd: OwnedFd,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is exclusively owned by this handle; no interior
// mutability is exposed beyond what atomic reads on the mapped word
// require, and those are valid from any thread.
unsafe impl Send for AnonymousMapping {}
unsafe impl Sync for AnonymousMapping {}

impl AnonymousMapping {
    /// Creates a `memfd`-backed anonymous file of `len` bytes and maps it
    /// read/write into this process.
    pub fn new(name: &str, len: usize) -> io::Result<Self> {
        let fd = memfd_create(name, MemfdFlags::CLOEXEC).map_err(io::Error::from)?;
        ftruncate(&fd, len as u64).map_err(io::Error::from)?;

        // SAFETY: `fd` was just created with exactly `len` bytes and is
        // held alive by this struct for the mapping's whole lifetime.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )
        }
        .map_err(io::Error::from)?;

        Ok(Self {
            fd,
            ptr: NonNull::new(ptr as *mut u8).expect("mmap returned a null pointer"),
            len,
        })
    }

    /// Borrows the mapped file descriptor, e.g. to hand a duplicate to
    /// `dri3_fence_from_fd` or `shm_attach_fd`.
    pub fn as_fd(&self) -> &OwnedFd {
        &self.fd
    }

    /// Raw pointer to the mapping, for atomic access to the fence word.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the mapping is zero-length (never constructed this
    /// way in practice, kept for the `len`/`is_empty` pair convention).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for AnonymousMapping {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe exactly the mapping created in `new`.
        let _ = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_round_trips_a_written_word() {
        let mapping = AnonymousMapping::new("x11-wsi-fence-test", FENCE_MEM_SIZE).unwrap();
        unsafe {
            std::ptr::write(mapping.as_ptr().cast::<u64>(), 0x1122_3344_5566_7788);
            assert_eq!(std::ptr::read(mapping.as_ptr().cast::<u64>()), 0x1122_3344_5566_7788);
        }
    }
}
