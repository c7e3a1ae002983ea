//! A hosted test harness for the physical frame allocator.
//!
//! `pfa` is `no_std` and reasons entirely in terms of firmware-reported
//! physical addresses, which makes it awkward to drive directly from a
//! host test: there is no firmware, and "physical" addresses are not
//! otherwise dereferenceable. This crate bridges the gap by backing
//! synthetic memory banks with real, leaked host allocations and using
//! an identity [`OffsetTranslator`] so the allocator's physical
//! addresses are simply host pointers.

use std::alloc::{alloc_zeroed, Layout};

use pfa::{FRAME_SIZE, MemoryDescriptor, MemoryMap, MemoryType, OffsetTranslator, PfaLog, PhysicalAllocator};

/// A [`PfaLog`] that forwards to `stderr`, visible under
/// `cargo test -- --nocapture`.
pub struct StdLog;

impl PfaLog for StdLog {
	fn log(args: core::fmt::Arguments<'_>) {
		eprintln!("{args}");
	}
}

/// A host-backed "physical" memory bank: a leaked, frame-aligned buffer
/// whose address range stands in for a single firmware-reported region.
///
/// Intentionally leaked (never deallocated): test processes are
/// short-lived and the allocator under test retains pointers into the
/// bank for its entire lifetime.
pub struct Bank {
	/// Address of the first byte of the bank, doubling as both the
	/// "physical" and virtual address under the identity translator.
	pub start: u64,
	/// Size of the bank in bytes.
	pub size: u64,
}

impl Bank {
	/// Allocates a zeroed, frame-aligned bank of `pages` frames.
	#[must_use]
	pub fn new(pages: u64) -> Self {
		let size = (pages * FRAME_SIZE) as usize;
		let layout = Layout::from_size_align(size, FRAME_SIZE as usize).expect("valid bank layout");
		// SAFETY: `size` is nonzero for every bank built by this harness.
		let ptr = unsafe { alloc_zeroed(layout) };
		assert!(!ptr.is_null(), "host allocation failed");
		Self {
			start: ptr as u64,
			size: size as u64,
		}
	}

	/// The address one past the last byte of the bank.
	#[must_use]
	pub const fn end(&self) -> u64 {
		self.start + self.size
	}
}

/// Builds a raw, 40-byte-stride descriptor array from `(type, bank)`
/// pairs, in the byte format [`MemoryMap`] expects.
#[must_use]
pub fn build_map(entries: &[(MemoryType, &Bank)]) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(entries.len() * MemoryDescriptor::MIN_SIZE);
	for &(ty, bank) in entries {
		let d = MemoryDescriptor::new(ty as u32, bank.start, bank.start, bank.size / FRAME_SIZE, 0);
		// SAFETY: `MemoryDescriptor` is `repr(C)` and exactly `MIN_SIZE` bytes.
		let raw: [u8; MemoryDescriptor::MIN_SIZE] = unsafe { core::mem::transmute(d) };
		bytes.extend_from_slice(&raw);
	}
	bytes
}

/// A single reusable allocator fixture: the backing banks, the
/// descriptor bytes built from them, and a sentinel.
///
/// The banks, descriptor bytes, and sentinel must outlive any allocator
/// built over them, hence the owning struct rather than returning an
/// allocator alone.
pub struct Fixture {
	/// The backing host banks (kept alive; indexable by test code that
	/// wants to assert on a particular bank's address range).
	pub banks: Vec<Bank>,
	descriptor_bytes: Vec<u8>,
	sentinel: Bank,
}

impl Fixture {
	/// Builds a fixture with a single `pages`-frame `Conventional` bank.
	#[must_use]
	pub fn single_bank(pages: u64) -> Self {
		let bank = Bank::new(pages);
		let entries = [(MemoryType::Conventional, &bank)];
		Self::from_banks(&entries)
	}

	/// Builds a fixture from an arbitrary set of `(type, bank)` pairs,
	/// preserving the order given (the order a real UEFI memory map
	/// would be walked in).
	#[must_use]
	pub fn from_banks(entries: &[(MemoryType, &Bank)]) -> Self {
		let sentinel = Bank::new(1);
		let descriptor_bytes = build_map(entries);
		let banks = entries
			.iter()
			.map(|&(_, bank)| Bank {
				start: bank.start,
				size: bank.size,
			})
			.collect();
		Self {
			banks,
			descriptor_bytes,
			sentinel,
		}
	}

	/// Constructs an allocator over this fixture's descriptor bytes.
	///
	/// Borrows `self`; the returned allocator must not outlive it.
	pub fn allocator(&self) -> PhysicalAllocator<'_, OffsetTranslator, StdLog> {
		let map = MemoryMap::new(&self.descriptor_bytes, MemoryDescriptor::MIN_SIZE);
		PhysicalAllocator::new(map, self.sentinel.start, OffsetTranslator::identity())
			.expect("map exhaustion building a fixture")
	}
}
