//! The public allocator: initial pool construction, best-fit allocation
//! with splitting, and boundary-tag coalescing on free.

use core::marker::PhantomData;

use crate::{
	dbg::{NullLog, PfaLog},
	mmap::MemoryMap,
	pfa_dbg, pfa_err, pfa_warn,
	region::{
		self, AllocView, BoundaryTagView, Colour, FreeView, FRAME_SIZE,
	},
	translate::PhysicalAddressTranslator,
	tree::RedBlackIndex,
};

/// Errors that can occur while constructing the initial free pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InitError {
	/// The memory map ran out of entries mid-scan. Any memory past the
	/// point of exhaustion is forever unusable for this boot.
	MapExhaustion,
}

/// Rounds `size` up to the next multiple of `FRAME_SIZE`.
const fn round_up_to_frame(size: u64) -> u64 {
	(size + FRAME_SIZE - 1) & !(FRAME_SIZE - 1)
}

/// A best-fit physical frame allocator over a firmware-supplied memory
/// map.
///
/// Single-threaded, synchronous, non-reentrant: no lock is taken or
/// required by this type. Wrapping it for multi-CPU access is the
/// caller's responsibility, applied at a layer above this one.
pub struct PhysicalAllocator<'a, T, L = NullLog>
where
	T: PhysicalAddressTranslator,
	L: PfaLog,
{
	memory_map: MemoryMap<'a>,
	tree: RedBlackIndex,
	translator: T,
	_log: PhantomData<L>,
}

impl<'a, T, L> PhysicalAllocator<'a, T, L>
where
	T: PhysicalAddressTranslator,
	L: PfaLog,
{
	/// Builds the initial coalesced free pool from `memory_map`.
	///
	/// `sentinel_address` must name at least [`FreeView::HEADER_SIZE`]
	/// bytes of writable memory, outside any region this allocator will
	/// manage, that remains valid for the allocator's entire lifetime.
	pub fn new(
		memory_map: MemoryMap<'a>,
		sentinel_address: u64,
		translator: T,
	) -> Result<Self, InitError> {
		let mut tree = RedBlackIndex::new(sentinel_address, &translator);

		let mut cursor: u64 = 0;
		loop {
			if memory_map.is_usable(cursor) {
				let first = cursor;
				let mut accumulated: u64 = 0;

				while memory_map.is_usable(cursor) {
					let region = memory_map.region_of(cursor).ok_or(InitError::MapExhaustion)?;
					accumulated += region.size;

					let expected_end = memory_map.expected_end_of(cursor);
					let next = memory_map.next_region_after(cursor);
					cursor = next;
					if expected_end != next {
						break;
					}
					if cursor == 0 {
						break;
					}
				}

				region::write_free_region(&translator, first, accumulated, Colour::Black);
				tree.insert(first, &translator);

				pfa_dbg!(
					L,
					"init: pooled {} bytes at {:#x}",
					accumulated,
					first
				);
			} else {
				cursor = memory_map.next_region_after(cursor);
			}

			if cursor == 0 {
				break;
			}
		}

		Ok(Self {
			memory_map,
			tree,
			translator,
			_log: PhantomData,
		})
	}

	fn size_and_flags_at(&self, addr: u64) -> region::SizeAndFlags {
		FreeView::from_raw(addr).size_and_flags(&self.translator)
	}

	/// Allocates at least `size` bytes of frame-aligned physical memory.
	///
	/// Returns a pointer to the usable payload; the underlying region is
	/// frame-aligned and a multiple of [`FRAME_SIZE`] bytes. Returns
	/// null on exhaustion. Does not mutate allocator state on failure.
	pub fn allocate(&mut self, size: u64) -> *mut u8 {
		let needed = round_up_to_frame(size + AllocView::HEADER_SIZE + BoundaryTagView::SIZE);

		let victim = self.tree.find_best_fit(needed, &self.translator);
		if victim == self.tree.sentinel {
			pfa_warn!(L, "allocate: out of memory, needed {} bytes", needed);
			return core::ptr::null_mut();
		}

		self.tree.delete(victim, &self.translator);

		let have = self.size_and_flags_at(victim).total_size();
		if have > needed {
			region::write_alloc_region(&self.translator, victim, needed);

			let remainder = victim + needed;
			region::write_free_region(&self.translator, remainder, have - needed, Colour::Black);
			self.tree.insert(remainder, &self.translator);
		} else {
			region::write_alloc_region(&self.translator, victim, have);
		}

		pfa_dbg!(L, "allocate: {} bytes at {:#x}", needed, victim);

		let payload = victim + AllocView::HEADER_SIZE;
		self.translator.to_virtual_addr(payload) as *mut u8
	}

	/// Releases memory previously returned by [`Self::allocate`].
	///
	/// # Safety
	/// `ptr` must have been returned by a prior `allocate` call on this
	/// same allocator, and must not have already been freed.
	pub unsafe fn free(&mut self, ptr: *mut u8) {
		let region = self.translator.to_physical_addr(ptr as usize) - AllocView::HEADER_SIZE;

		#[cfg(debug_assertions)]
		self.debug_assert_valid_free(region);

		let region_size = self.size_and_flags_at(region).total_size();

		// Boundary-tag and header reads are only performed when the
		// neighbour address actually lies in a usable region: memory
		// just outside the managed pool need not be backed by anything
		// this allocator is entitled to dereference.
		let left_tag_addr = region - BoundaryTagView::SIZE;
		let (left_free, left_size) = if self.memory_map.is_usable(left_tag_addr) {
			let tag = BoundaryTagView::from_raw(left_tag_addr).size_and_flags(&self.translator);
			(!tag.is_allocated(), tag.total_size())
		} else {
			(false, 0)
		};
		let left_start = region - left_size;

		let right_start = region + region_size;
		let (right_free, right_size) = if self.memory_map.is_usable(right_start) {
			let header = self.size_and_flags_at(right_start);
			(!header.is_allocated(), header.total_size())
		} else {
			(false, 0)
		};

		match (left_free, right_free) {
			(true, true) => {
				let coalesced = left_size + region_size + right_size;
				self.tree.delete(left_start, &self.translator);
				self.tree.delete(right_start, &self.translator);
				region::write_free_region(&self.translator, left_start, coalesced, Colour::Black);
				self.tree.insert(left_start, &self.translator);
			}
			(false, true) => {
				let coalesced = region_size + right_size;
				self.tree.delete(right_start, &self.translator);
				region::write_free_region(&self.translator, region, coalesced, Colour::Black);
				self.tree.insert(region, &self.translator);
			}
			(true, false) => {
				let coalesced = region_size + left_size;
				self.tree.delete(left_start, &self.translator);
				region::write_free_region(&self.translator, left_start, coalesced, Colour::Black);
				self.tree.insert(left_start, &self.translator);
			}
			(false, false) => {
				region::write_free_region(&self.translator, region, region_size, Colour::Black);
				self.tree.insert(region, &self.translator);
			}
		}

		pfa_dbg!(L, "free: region at {:#x}", region);
	}

	/// Debug-only detection of an invalid free: `p` not in a usable
	/// region, or its header already free. Panics rather than silently
	/// corrupting the pool, mirroring the lineage's
	/// `debug_assert!`-gated allocator invariants.
	#[cfg(debug_assertions)]
	fn debug_assert_valid_free(&self, region: u64) {
		if !self.memory_map.is_usable(region) {
			pfa_err!(L, "free: {:#x} is not in a usable region", region);
			panic!("pfa: invalid free (region not usable): {region:#x}");
		}
		if !self.size_and_flags_at(region).is_allocated() {
			pfa_err!(L, "free: {:#x} is already free", region);
			panic!("pfa: invalid free (double free): {region:#x}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_up_to_frame_is_ceiling() {
		assert_eq!(round_up_to_frame(1), FRAME_SIZE);
		assert_eq!(round_up_to_frame(FRAME_SIZE), FRAME_SIZE);
		assert_eq!(round_up_to_frame(FRAME_SIZE + 1), 2 * FRAME_SIZE);
	}
}
