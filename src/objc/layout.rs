//! Objective-C runtime structure layouts.
//!
//! Three families exist: ObjC2 with 64-bit pointers, ObjC2 with 32-bit
//! pointers and the legacy ObjC1 runtime, which only exists for 32-bit
//! images. The structs mirror the on-disk layout; pointer fields are read
//! through the reader's pointer cache at the offsets recorded in the
//! [`Layout`] tables rather than from the struct copies.

use std::mem::{offset_of, size_of};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::macho::impl_swap;

// =============================================================================
// Flags
// =============================================================================

/// `class_ro_t.flags`: the class is a metaclass.
pub const RO_META: u32 = 1 << 0;
/// `class_ro_t.flags`: the class is a root class.
pub const RO_ROOT: u32 = 1 << 1;

/// ObjC1 `objc_class.info`: the structure is a class.
pub const CLS_CLASS: u32 = 0x1;
/// ObjC1 `objc_class.info`: the structure is a metaclass.
pub const CLS_META: u32 = 0x2;
/// ObjC1 `objc_class.info`: `methodLists` points at a single list.
pub const CLS_NO_METHOD_ARRAY: u32 = 0x4000;
/// ObjC1 `objc_class.info`: the class has an `ext` field.
pub const CLS_EXT: u32 = 0x20000;

/// Method list entries are 32-bit relative offsets.
pub const METHOD_LIST_RELATIVE_FLAG: u32 = 0x8000_0000;
/// Relative method names point at the selector string, not a selref.
pub const METHOD_LIST_SELECTORS_DIRECT_FLAG: u32 = 0x4000_0000;

/// Image info: categories carry a class properties list.
pub const OBJC_IMAGE_HAS_CATEGORY_CLASS_PROPERTIES: u32 = 1 << 6;

/// Swift tag bits in `objc_class.data` for 64-bit images.
pub const FAST_DATA_TAG_MASK_64: u64 = 0x7;
/// Swift tag bits in `objc_class.data` for 32-bit images.
pub const FAST_DATA_TAG_MASK_32: u64 = 0x3;

/// Size of a relative method entry.
pub const RELATIVE_METHOD_SIZE: u64 = 12;

// =============================================================================
// Shared Structures
// =============================================================================

/// Header of method, property and ivar lists.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ListHeader {
    /// Entry size with flags in the high bits
    pub entsize_and_flags: u32,
    /// Number of entries
    pub count: u32,
}

impl_swap!(ListHeader { entsize_and_flags, count });

impl ListHeader {
    /// Returns true for relative method lists.
    #[inline]
    pub fn is_relative(&self) -> bool {
        self.entsize_and_flags & METHOD_LIST_RELATIVE_FLAG != 0
    }

    /// Returns true if relative names address strings directly.
    #[inline]
    pub fn has_direct_selectors(&self) -> bool {
        self.entsize_and_flags & METHOD_LIST_SELECTORS_DIRECT_FLAG != 0
    }
}

/// `objc_image_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ImageInfo {
    /// Version (0)
    pub version: u32,
    /// Flags, with the Swift ABI version in bits 8..16
    pub flags: u32,
}

impl_swap!(ImageInfo { version, flags });

impl ImageInfo {
    /// Returns the raw Swift ABI version.
    #[inline]
    pub fn swift_version(&self) -> u32 {
        (self.flags >> 8) & 0xFF
    }

    /// Returns true if categories carry class properties.
    #[inline]
    pub fn has_category_class_properties(&self) -> bool {
        self.flags & OBJC_IMAGE_HAS_CATEGORY_CLASS_PROPERTIES != 0
    }
}

/// Maps a raw Swift ABI version to its display name.
pub fn swift_abi_name(version: u32) -> &'static str {
    match version {
        0 => "",
        1 => "1.0",
        2 => "1.1",
        3 => "2.0",
        4 => "3.0",
        5 => "4.0",
        6 => "4.1/4.2",
        7 => "5.0 or later",
        _ => "future/unknown",
    }
}

// =============================================================================
// ObjC2 64-bit
// =============================================================================

/// `class_t` (64-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Class64 {
    pub isa: u64,
    pub superclass: u64,
    pub cache: u64,
    pub vtable: u64,
    pub data: u64,
}

impl_swap!(Class64 { isa, superclass, cache, vtable, data });

/// `class_ro_t` (64-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ClassRo64 {
    pub flags: u32,
    pub instance_start: u32,
    pub instance_size: u32,
    pub reserved: u32,
    pub ivar_layout: u64,
    pub name: u64,
    pub base_methods: u64,
    pub base_protocols: u64,
    pub ivars: u64,
    pub weak_ivar_layout: u64,
    pub base_properties: u64,
}

impl_swap!(ClassRo64 {
    flags, instance_start, instance_size, reserved, ivar_layout, name, base_methods,
    base_protocols, ivars, weak_ivar_layout, base_properties
});

/// `category_t` (64-bit), without the optional class properties field.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Category64 {
    pub name: u64,
    pub cls: u64,
    pub instance_methods: u64,
    pub class_methods: u64,
    pub protocols: u64,
    pub instance_properties: u64,
}

impl_swap!(Category64 { name, cls, instance_methods, class_methods, protocols, instance_properties });

/// `protocol_t` (64-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Protocol64 {
    pub isa: u64,
    pub name: u64,
    pub protocols: u64,
    pub instance_methods: u64,
    pub class_methods: u64,
    pub optional_instance_methods: u64,
    pub optional_class_methods: u64,
    pub instance_properties: u64,
    pub size: u32,
    pub flags: u32,
}

impl_swap!(Protocol64 {
    isa, name, protocols, instance_methods, class_methods, optional_instance_methods,
    optional_class_methods, instance_properties, size, flags
});

/// `method_t` (64-bit, absolute).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Method64 {
    pub name: u64,
    pub types: u64,
    pub imp: u64,
}

impl_swap!(Method64 { name, types, imp });

/// `property_t` (64-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Property64 {
    pub name: u64,
    pub attributes: u64,
}

impl_swap!(Property64 { name, attributes });

/// `ivar_t` (64-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Ivar64 {
    pub offset: u64,
    pub name: u64,
    pub types: u64,
    pub alignment: u32,
    pub size: u32,
}

impl_swap!(Ivar64 { offset, name, types, alignment, size });

// =============================================================================
// ObjC2 32-bit
// =============================================================================

/// `class_t` (32-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Class32 {
    pub isa: u32,
    pub superclass: u32,
    pub cache: u32,
    pub vtable: u32,
    pub data: u32,
}

impl_swap!(Class32 { isa, superclass, cache, vtable, data });

/// `class_ro_t` (32-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ClassRo32 {
    pub flags: u32,
    pub instance_start: u32,
    pub instance_size: u32,
    pub ivar_layout: u32,
    pub name: u32,
    pub base_methods: u32,
    pub base_protocols: u32,
    pub ivars: u32,
    pub weak_ivar_layout: u32,
    pub base_properties: u32,
}

impl_swap!(ClassRo32 {
    flags, instance_start, instance_size, ivar_layout, name, base_methods, base_protocols,
    ivars, weak_ivar_layout, base_properties
});

/// `category_t` (32-bit), without the optional class properties field.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Category32 {
    pub name: u32,
    pub cls: u32,
    pub instance_methods: u32,
    pub class_methods: u32,
    pub protocols: u32,
    pub instance_properties: u32,
}

impl_swap!(Category32 { name, cls, instance_methods, class_methods, protocols, instance_properties });

/// `protocol_t` (32-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Protocol32 {
    pub isa: u32,
    pub name: u32,
    pub protocols: u32,
    pub instance_methods: u32,
    pub class_methods: u32,
    pub optional_instance_methods: u32,
    pub optional_class_methods: u32,
    pub instance_properties: u32,
    pub size: u32,
    pub flags: u32,
}

impl_swap!(Protocol32 {
    isa, name, protocols, instance_methods, class_methods, optional_instance_methods,
    optional_class_methods, instance_properties, size, flags
});

/// `method_t` (32-bit, absolute). Also the ObjC1 `objc_method` layout.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Method32 {
    pub name: u32,
    pub types: u32,
    pub imp: u32,
}

impl_swap!(Method32 { name, types, imp });

/// `property_t` (32-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Property32 {
    pub name: u32,
    pub attributes: u32,
}

impl_swap!(Property32 { name, attributes });

/// `ivar_t` (32-bit).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Ivar32 {
    pub offset: u32,
    pub name: u32,
    pub types: u32,
    pub alignment: u32,
    pub size: u32,
}

impl_swap!(Ivar32 { offset, name, types, alignment, size });

// =============================================================================
// ObjC1
// =============================================================================

/// `objc_module`.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Module {
    pub version: u32,
    pub size: u32,
    pub name: u32,
    pub symtab: u32,
}

impl_swap!(Objc1Module { version, size, name, symtab });

/// `objc_symtab` header. Class slots follow, then category slots.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Symtab {
    pub sel_ref_cnt: u32,
    pub refs: u32,
    pub cls_def_cnt: u16,
    pub cat_def_cnt: u16,
}

impl_swap!(Objc1Symtab { sel_ref_cnt, refs, cls_def_cnt, cat_def_cnt });

/// `objc_class` (ObjC1).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Class {
    pub isa: u32,
    pub super_class: u32,
    pub name: u32,
    pub version: u32,
    pub info: u32,
    pub instance_size: u32,
    pub ivars: u32,
    pub method_lists: u32,
    pub cache: u32,
    pub protocols: u32,
}

impl_swap!(Objc1Class {
    isa, super_class, name, version, info, instance_size, ivars, method_lists, cache, protocols
});

/// Trailing fields present when `CLS_EXT` is set.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1ClassTail {
    pub ivar_layout: u32,
    pub ext: u32,
}

impl_swap!(Objc1ClassTail { ivar_layout, ext });

/// `objc_class_ext`.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1ClassExt {
    pub size: u32,
    pub weak_ivar_layout: u32,
    pub properties: u32,
}

impl_swap!(Objc1ClassExt { size, weak_ivar_layout, properties });

/// `objc_category` (ObjC1).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Category {
    pub category_name: u32,
    pub class_name: u32,
    pub instance_methods: u32,
    pub class_methods: u32,
    pub protocols: u32,
}

impl_swap!(Objc1Category { category_name, class_name, instance_methods, class_methods, protocols });

/// `objc_protocol` (ObjC1).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Protocol {
    pub isa: u32,
    pub protocol_name: u32,
    pub protocol_list: u32,
    pub instance_methods: u32,
    pub class_methods: u32,
}

impl_swap!(Objc1Protocol { isa, protocol_name, protocol_list, instance_methods, class_methods });

/// `objc_protocol_list` header (ObjC1). Protocol pointers follow.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1ProtocolList {
    pub next: u32,
    pub count: u32,
}

impl_swap!(Objc1ProtocolList { next, count });

/// `objc_method_list` header (ObjC1). `objc_method` entries follow.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1MethodList {
    pub obsolete: u32,
    pub count: u32,
}

impl_swap!(Objc1MethodList { obsolete, count });

/// `objc_ivar` (ObjC1). Entries follow a `u32` count.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1Ivar {
    pub name: u32,
    pub types: u32,
    pub offset: u32,
}

impl_swap!(Objc1Ivar { name, types, offset });

/// `objc_method_description` (ObjC1). Entries follow a `u32` count.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
#[allow(missing_docs)]
pub struct Objc1MethodDescription {
    pub name: u32,
    pub types: u32,
}

impl_swap!(Objc1MethodDescription { name, types });

// =============================================================================
// Field Offset Tables
// =============================================================================

/// Field offsets of a class structure.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ClassLayout {
    pub isa: u64,
    pub superclass: u64,
    pub data: u64,
}

/// Field offsets of a read-only class data structure.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ClassRoLayout {
    pub flags: u64,
    pub name: u64,
    pub base_methods: u64,
    pub base_protocols: u64,
    pub ivars: u64,
    pub base_properties: u64,
}

/// Field offsets of a category structure.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct CategoryLayout {
    pub name: u64,
    pub cls: u64,
    pub instance_methods: u64,
    pub class_methods: u64,
    pub protocols: u64,
    pub instance_properties: u64,
    pub class_properties: u64,
}

/// Field offsets of a protocol structure.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ProtocolLayout {
    pub name: u64,
    pub protocols: u64,
    pub instance_methods: u64,
    pub class_methods: u64,
    pub optional_instance_methods: u64,
    pub optional_class_methods: u64,
    pub instance_properties: u64,
}

/// Field offsets and sizes of list entries.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct EntryLayout {
    pub method_size: u64,
    pub method_types: u64,
    pub property_size: u64,
    pub property_attributes: u64,
    pub ivar_size: u64,
    pub ivar_offset: u64,
    pub ivar_name: u64,
    pub ivar_types: u64,
}

/// ObjC2 field offsets for one pointer width.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct Layout {
    pub pointer_size: u64,
    pub tag_mask: u64,
    pub class: ClassLayout,
    pub class_ro: ClassRoLayout,
    pub category: CategoryLayout,
    pub protocol: ProtocolLayout,
    pub entry: EntryLayout,
}

macro_rules! off {
    ($ty:ty, $field:ident) => {
        offset_of!($ty, $field) as u64
    };
}

/// ObjC2 layout of 64-bit images.
pub const LAYOUT_64: Layout = Layout {
    pointer_size: 8,
    tag_mask: FAST_DATA_TAG_MASK_64,
    class: ClassLayout {
        isa: off!(Class64, isa),
        superclass: off!(Class64, superclass),
        data: off!(Class64, data),
    },
    class_ro: ClassRoLayout {
        flags: off!(ClassRo64, flags),
        name: off!(ClassRo64, name),
        base_methods: off!(ClassRo64, base_methods),
        base_protocols: off!(ClassRo64, base_protocols),
        ivars: off!(ClassRo64, ivars),
        base_properties: off!(ClassRo64, base_properties),
    },
    category: CategoryLayout {
        name: off!(Category64, name),
        cls: off!(Category64, cls),
        instance_methods: off!(Category64, instance_methods),
        class_methods: off!(Category64, class_methods),
        protocols: off!(Category64, protocols),
        instance_properties: off!(Category64, instance_properties),
        class_properties: size_of::<Category64>() as u64,
    },
    protocol: ProtocolLayout {
        name: off!(Protocol64, name),
        protocols: off!(Protocol64, protocols),
        instance_methods: off!(Protocol64, instance_methods),
        class_methods: off!(Protocol64, class_methods),
        optional_instance_methods: off!(Protocol64, optional_instance_methods),
        optional_class_methods: off!(Protocol64, optional_class_methods),
        instance_properties: off!(Protocol64, instance_properties),
    },
    entry: EntryLayout {
        method_size: size_of::<Method64>() as u64,
        method_types: off!(Method64, types),
        property_size: size_of::<Property64>() as u64,
        property_attributes: off!(Property64, attributes),
        ivar_size: size_of::<Ivar64>() as u64,
        ivar_offset: off!(Ivar64, offset),
        ivar_name: off!(Ivar64, name),
        ivar_types: off!(Ivar64, types),
    },
};

/// ObjC2 layout of 32-bit images.
pub const LAYOUT_32: Layout = Layout {
    pointer_size: 4,
    tag_mask: FAST_DATA_TAG_MASK_32,
    class: ClassLayout {
        isa: off!(Class32, isa),
        superclass: off!(Class32, superclass),
        data: off!(Class32, data),
    },
    class_ro: ClassRoLayout {
        flags: off!(ClassRo32, flags),
        name: off!(ClassRo32, name),
        base_methods: off!(ClassRo32, base_methods),
        base_protocols: off!(ClassRo32, base_protocols),
        ivars: off!(ClassRo32, ivars),
        base_properties: off!(ClassRo32, base_properties),
    },
    category: CategoryLayout {
        name: off!(Category32, name),
        cls: off!(Category32, cls),
        instance_methods: off!(Category32, instance_methods),
        class_methods: off!(Category32, class_methods),
        protocols: off!(Category32, protocols),
        instance_properties: off!(Category32, instance_properties),
        class_properties: size_of::<Category32>() as u64,
    },
    protocol: ProtocolLayout {
        name: off!(Protocol32, name),
        protocols: off!(Protocol32, protocols),
        instance_methods: off!(Protocol32, instance_methods),
        class_methods: off!(Protocol32, class_methods),
        optional_instance_methods: off!(Protocol32, optional_instance_methods),
        optional_class_methods: off!(Protocol32, optional_class_methods),
        instance_properties: off!(Protocol32, instance_properties),
    },
    entry: EntryLayout {
        method_size: size_of::<Method32>() as u64,
        method_types: off!(Method32, types),
        property_size: size_of::<Property32>() as u64,
        property_attributes: off!(Property32, attributes),
        ivar_size: size_of::<Ivar32>() as u64,
        ivar_offset: off!(Ivar32, offset),
        ivar_name: off!(Ivar32, name),
        ivar_types: off!(Ivar32, types),
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(size_of::<Class64>(), 40);
        assert_eq!(size_of::<ClassRo64>(), 72);
        assert_eq!(size_of::<Protocol64>(), 72);
        assert_eq!(size_of::<Ivar64>(), 32);
        assert_eq!(size_of::<Class32>(), 20);
        assert_eq!(size_of::<ClassRo32>(), 40);
        assert_eq!(size_of::<Objc1Symtab>(), 12);
        assert_eq!(size_of::<Objc1Class>(), 40);
        assert_eq!(size_of::<Objc1Module>(), 16);
    }

    #[test]
    fn test_layout_offsets() {
        assert_eq!(LAYOUT_64.class.data, 32);
        assert_eq!(LAYOUT_64.class_ro.name, 24);
        assert_eq!(LAYOUT_64.category.class_properties, 48);
        assert_eq!(LAYOUT_32.class.data, 16);
        assert_eq!(LAYOUT_32.class_ro.name, 16);
        assert_eq!(LAYOUT_32.entry.method_size, 12);
    }

    #[test]
    fn test_swift_abi_names() {
        let info = ImageInfo {
            version: 0,
            flags: 7 << 8,
        };
        assert_eq!(swift_abi_name(info.swift_version()), "5.0 or later");
        assert_eq!(swift_abi_name(0), "");
        assert_eq!(swift_abi_name(6), "4.1/4.2");
        assert_eq!(swift_abi_name(42), "future/unknown");
    }
}
