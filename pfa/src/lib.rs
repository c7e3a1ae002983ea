//! Best-fit physical frame allocator.
//!
//! Given a firmware-supplied physical memory map, partitions usable DRAM
//! into a single coalesced free pool and services `allocate`/`free` of
//! frame-aligned physical memory for the remainder of the kernel's
//! lifetime. Free-region metadata lives in-band (header + boundary tag);
//! the free set is indexed by a red-black tree whose nodes are the free
//! regions themselves, at zero auxiliary allocation cost.
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod alloc;
pub mod dbg;
pub mod mmap;
pub mod region;
pub mod translate;

mod tree;

pub use alloc::{InitError, PhysicalAllocator};
pub use dbg::{NullLog, PfaLog};
pub use mmap::{MemoryDescriptor, MemoryMap, MemoryType};
pub use region::FRAME_SIZE;
pub use translate::{OffsetTranslator, PhysicalAddressTranslator};
