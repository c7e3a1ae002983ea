//! A read-only view over the firmware-supplied physical memory map.
//!
//! The map is a fixed-stride array of descriptors; the stride is given by
//! the caller rather than derived from [`MemoryDescriptor`]'s own size,
//! since UEFI's `GetMemoryMap` is free to report a descriptor size larger
//! than the current `EFI_MEMORY_DESCRIPTOR` definition, reserving room for
//! forward-compatible extension.

use core::ptr;

/// UEFI memory region type, as reported by `GetMemoryMap`. Numeric values
/// match the UEFI specification exactly so a descriptor's raw `u32` type
/// tag can be matched against these variants without translation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum MemoryType {
	/// Not usable.
	Reserved = 0,
	/// Bootloader code; excluded from the usable set so the allocator
	/// never overwrites the boot stub's own image.
	LoaderCode = 1,
	/// Bootloader data; excluded for the same reason as `LoaderCode`.
	LoaderData = 2,
	/// Usable once boot services have exited.
	BootServicesCode = 3,
	/// Usable once boot services have exited.
	BootServicesData = 4,
	/// Must remain mapped for the lifetime of the OS; not usable.
	RuntimeServicesCode = 5,
	/// Must remain mapped for the lifetime of the OS; not usable.
	RuntimeServicesData = 6,
	/// Free, usable memory.
	Conventional = 7,
	/// Memory that failed a hardware self-test; not usable.
	Unusable = 8,
	/// Holds ACPI tables until reclaimed; not usable here.
	AcpiReclaim = 9,
	/// Must be preserved in the S4/S5 save; not usable.
	AcpiNvs = 10,
	/// Memory-mapped I/O; not usable as general memory.
	MemoryMappedIo = 11,
	/// Address space reserved for memory-mapped I/O; not usable.
	MemoryMappedIoPortSpace = 12,
	/// Reserved for processor-specific code; not usable.
	PalCode = 13,
	/// Usable, and persists across reset (NVDIMM-backed).
	Persistent = 14,
	/// Not yet accepted by the OS in a confidential-computing environment.
	Unaccepted = 15,
	/// Sentinel marking the end of the defined range; never itself used.
	Max = 16,
}

impl MemoryType {
	/// Recovers a [`MemoryType`] from a descriptor's raw `u32` type tag.
	#[must_use]
	pub fn from_raw(raw: u32) -> Option<Self> {
		Some(match raw {
			0 => Self::Reserved,
			1 => Self::LoaderCode,
			2 => Self::LoaderData,
			3 => Self::BootServicesCode,
			4 => Self::BootServicesData,
			5 => Self::RuntimeServicesCode,
			6 => Self::RuntimeServicesData,
			7 => Self::Conventional,
			8 => Self::Unusable,
			9 => Self::AcpiReclaim,
			10 => Self::AcpiNvs,
			11 => Self::MemoryMappedIo,
			12 => Self::MemoryMappedIoPortSpace,
			13 => Self::PalCode,
			14 => Self::Persistent,
			15 => Self::Unaccepted,
			16 => Self::Max,
			_ => return None,
		})
	}

	/// Whether the allocator may manage memory of this type.
	///
	/// `LoaderCode`/`LoaderData` are deliberately excluded: the boot
	/// stub's own image and data live there and must not be overwritten
	/// before the kernel is fully resident.
	#[must_use]
	pub const fn is_usable(self) -> bool {
		matches!(
			self,
			Self::BootServicesCode
				| Self::BootServicesData
				| Self::Conventional
				| Self::Persistent
		)
	}
}

/// A single firmware memory-map descriptor.
///
/// Field layout matches the leading 40 bytes of `EFI_MEMORY_DESCRIPTOR`;
/// a given map's actual descriptor stride may be wider, with the extra
/// trailing bytes of every entry simply ignored.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct MemoryDescriptor {
	/// Raw UEFI memory type tag; see [`MemoryType::from_raw`].
	pub ty: u32,
	_padding: u32,
	/// First physical address of the region.
	pub physical_start: u64,
	/// First virtual address of the region, post-mapping. Unused by the
	/// allocator, which only ever reasons about physical addresses.
	pub virtual_start: u64,
	/// Number of contiguous 4 KiB pages in the region.
	pub number_of_pages: u64,
	/// Firmware-reported capability/attribute bits. Unused by the
	/// allocator.
	pub attribute: u64,
}

impl MemoryDescriptor {
	/// Size, in bytes, of `[ty, physical_start, virtual_start,
	/// number_of_pages, attribute]`. The map's actual per-entry stride
	/// may exceed this.
	pub const MIN_SIZE: usize = core::mem::size_of::<Self>();

	/// Builds a descriptor directly, without going through a raw
	/// firmware-supplied byte buffer. Mainly useful for assembling
	/// synthetic memory maps in tests.
	#[must_use]
	pub const fn new(
		ty: u32,
		physical_start: u64,
		virtual_start: u64,
		number_of_pages: u64,
		attribute: u64,
	) -> Self {
		Self {
			ty,
			_padding: 0,
			physical_start,
			virtual_start,
			number_of_pages,
			attribute,
		}
	}

	/// End address of the region (exclusive), i.e. `physical_start +
	/// number_of_pages * 4096`.
	#[must_use]
	pub const fn end(&self) -> u64 {
		self.physical_start + self.number_of_pages * crate::region::FRAME_SIZE
	}

	/// Size of the region in bytes.
	#[must_use]
	pub const fn size(&self) -> u64 {
		self.number_of_pages * crate::region::FRAME_SIZE
	}

	/// Whether `addr` falls within `[physical_start, end())`.
	#[must_use]
	pub const fn contains(&self, addr: u64) -> bool {
		addr >= self.physical_start && addr < self.end()
	}

	/// Whether the allocator may manage this descriptor's memory.
	///
	/// The zero-page exclusion is deliberate: it keeps a null pointer
	/// distinguishable from any legitimate region address.
	#[must_use]
	pub fn is_usable(&self) -> bool {
		self.physical_start != 0 && MemoryType::from_raw(self.ty).is_some_and(MemoryType::is_usable)
	}
}

/// A region reported by [`MemoryMap::region_of`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
	/// First physical address of the region.
	pub start: u64,
	/// Size of the region in bytes.
	pub size: u64,
}

/// A read-only view over a firmware-supplied, fixed-stride array of
/// [`MemoryDescriptor`] records.
#[derive(Clone, Copy)]
pub struct MemoryMap<'a> {
	/// Raw descriptor bytes, `entries.len() / desc_stride` entries long.
	entries: &'a [u8],
	/// Byte stride between consecutive descriptors.
	desc_stride: usize,
}

impl<'a> MemoryMap<'a> {
	/// Wraps a firmware-supplied descriptor buffer. `desc_stride` is the
	/// per-entry byte stride reported alongside the map (not
	/// `size_of::<MemoryDescriptor>()`), since firmware may report a
	/// larger stride to reserve room for descriptor fields this crate
	/// does not know about.
	///
	/// # Panics
	/// Panics if `desc_stride` is smaller than
	/// [`MemoryDescriptor::MIN_SIZE`].
	#[must_use]
	pub fn new(entries: &'a [u8], desc_stride: usize) -> Self {
		assert!(
			desc_stride >= MemoryDescriptor::MIN_SIZE,
			"descriptor stride too small to hold a memory descriptor"
		);
		Self {
			entries,
			desc_stride,
		}
	}

	/// Number of descriptors in the map.
	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len() / self.desc_stride
	}

	/// Whether the map has no descriptors.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Reads the descriptor at `index`.
	#[must_use]
	pub fn descriptor(&self, index: usize) -> MemoryDescriptor {
		let offset = index * self.desc_stride;
		let ptr = self.entries[offset..].as_ptr().cast::<MemoryDescriptor>();
		// SAFETY: `index < self.len()` is the caller's contract; the
		// descriptor's fields occupy the leading `MIN_SIZE` bytes of
		// every stride-sized entry, regardless of stride width.
		unsafe { ptr::read_unaligned(ptr) }
	}

	fn descriptors(&self) -> impl Iterator<Item = MemoryDescriptor> + '_ {
		(0..self.len()).map(|i| self.descriptor(i))
	}

	/// True iff `addr` lies inside a usable descriptor.
	#[must_use]
	pub fn is_usable(&self, addr: u64) -> bool {
		self.descriptors()
			.any(|d| d.contains(addr) && d.is_usable())
	}

	/// The region containing `addr`, if any (usable or not).
	#[must_use]
	pub fn region_of(&self, addr: u64) -> Option<Region> {
		self.descriptors().find(|d| d.contains(addr)).map(|d| Region {
			start: d.physical_start,
			size: d.size(),
		})
	}

	/// The smallest `physical_start > addr` across every descriptor, or 0
	/// if none exists.
	#[must_use]
	pub fn next_region_after(&self, addr: u64) -> u64 {
		self.descriptors()
			.map(|d| d.physical_start)
			.filter(|&start| start > addr)
			.min()
			.unwrap_or(0)
	}

	/// `physical_start + number_of_pages * 4096` of the descriptor
	/// containing `addr`, or 0 if `addr` is in no descriptor.
	#[must_use]
	pub fn expected_end_of(&self, addr: u64) -> u64 {
		self.descriptors()
			.find(|d| d.contains(addr))
			.map_or(0, |d| d.end())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn descriptor_bytes(ty: u32, physical_start: u64, pages: u64) -> [u8; 40] {
		let d = MemoryDescriptor::new(ty, physical_start, 0, pages, 0);
		// SAFETY: `MemoryDescriptor` is `repr(C)` and exactly 40 bytes.
		unsafe { core::mem::transmute(d) }
	}

	#[test]
	fn single_bank_is_usable_and_bounded() {
		let bytes = descriptor_bytes(7, 0x100000, 256);
		let map = MemoryMap::new(&bytes, 40);
		assert!(map.is_usable(0x100000));
		assert!(!map.is_usable(0x100000 + 256 * 4096));
		assert_eq!(
			map.region_of(0x100000),
			Some(Region {
				start: 0x100000,
				size: 256 * 4096
			})
		);
		assert_eq!(map.next_region_after(0x100000), 0);
		assert_eq!(map.expected_end_of(0x100000), 0x100000 + 256 * 4096);
	}

	#[test]
	fn zero_page_is_excluded() {
		let mut bytes = Vec::new();
		bytes.extend_from_slice(&descriptor_bytes(7, 0x0, 1));
		bytes.extend_from_slice(&descriptor_bytes(7, 0x1000, 1));
		let map = MemoryMap::new(&bytes, 40);
		assert!(!map.is_usable(0x0));
		assert!(map.is_usable(0x1000));
	}

	#[test]
	fn loader_code_is_excluded() {
		let mut bytes = Vec::new();
		bytes.extend_from_slice(&descriptor_bytes(1, 0x100000, 1));
		bytes.extend_from_slice(&descriptor_bytes(7, 0x101000, 1));
		let map = MemoryMap::new(&bytes, 40);
		assert!(!map.is_usable(0x100000));
		assert!(map.is_usable(0x101000));
	}
}
