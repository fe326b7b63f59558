//! Lazy Objective-C entity wrappers.
//!
//! Each wrapper is a `(reader, address)` pair. Accessors re-read the image
//! on every call and nothing is cached. Equality, ordering and hashing use
//! the address alone.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::reader::ObjCMetaDataReader;
use crate::error::Result;

/// Implements address-only identity and a compact `Debug` for a wrapper.
macro_rules! address_identity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl PartialEq for $ty<'_> {
                fn eq(&self, other: &Self) -> bool {
                    self.addr == other.addr
                }
            }

            impl Eq for $ty<'_> {}

            impl PartialOrd for $ty<'_> {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }

            impl Ord for $ty<'_> {
                fn cmp(&self, other: &Self) -> Ordering {
                    self.addr.cmp(&other.addr)
                }
            }

            impl Hash for $ty<'_> {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.addr.hash(state);
                }
            }

            impl fmt::Debug for $ty<'_> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({:#x})", stringify!($ty), self.addr)
                }
            }

            impl<'r> $ty<'r> {
                /// Returns the virtual address this wrapper denotes.
                #[inline]
                pub fn address(&self) -> u64 {
                    self.addr
                }
            }
        )*
    };
}

address_identity!(
    ObjCClass,
    ObjCCategory,
    ObjCProtocol,
    ObjCMethod,
    ObjCProperty,
    ObjCIvar,
    ObjCSelectorRef,
    ObjCClassRef,
    ObjCCategoryRef,
    ObjCProtocolRef,
);

// =============================================================================
// Classes
// =============================================================================

/// A class or metaclass structure.
#[derive(Clone, Copy)]
pub struct ObjCClass<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCClass<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Placeholder for a class defined in another image.
    pub(crate) fn null(reader: &'r ObjCMetaDataReader<'r>) -> Self {
        Self { reader, addr: 0 }
    }

    /// Returns true for the external-class placeholder.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.class_name(self.addr)
    }

    /// Returns the superclass name, empty for a root class.
    pub fn super_class_name(&self) -> Result<&'r str> {
        self.reader.class_super_name(self.addr)
    }

    /// Returns true for metaclasses.
    pub fn is_meta_class(&self) -> Result<bool> {
        self.reader.class_is_meta(self.addr)
    }

    /// Returns true if the class data carries Swift tag bits.
    pub fn is_swift(&self) -> Result<bool> {
        self.reader.class_is_swift(self.addr)
    }

    /// Returns the metaclass, or the null placeholder when it is external.
    pub fn meta_class(&self) -> Result<ObjCClass<'r>> {
        let meta = self.reader.class_meta(self.addr)?;
        Ok(ObjCClass::new(self.reader, meta))
    }

    /// Returns the instance methods.
    pub fn instance_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.class_own_methods(self.addr)
    }

    /// Returns the class methods, which live on the metaclass.
    pub fn class_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        let meta = self.meta_class()?;
        if meta.is_null() {
            return Ok(Vec::new());
        }
        self.reader.class_own_methods(meta.addr)
    }

    /// Returns the instance properties.
    pub fn properties(&self) -> Result<Vec<ObjCProperty<'r>>> {
        self.reader.class_own_properties(self.addr)
    }

    /// Returns the class properties.
    pub fn class_properties(&self) -> Result<Vec<ObjCProperty<'r>>> {
        let meta = self.meta_class()?;
        if meta.is_null() {
            return Ok(Vec::new());
        }
        self.reader.class_own_properties(meta.addr)
    }

    /// Returns the instance variables.
    pub fn ivars(&self) -> Result<Vec<ObjCIvar<'r>>> {
        self.reader.class_ivars(self.addr)
    }

    /// Returns the protocols the class declares conformance to.
    pub fn protocols(&self) -> Result<Vec<ObjCProtocolRef<'r>>> {
        self.reader.class_protocols(self.addr)
    }
}

// =============================================================================
// Categories
// =============================================================================

/// A category structure.
#[derive(Clone, Copy)]
pub struct ObjCCategory<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCCategory<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns true for the external placeholder.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.category_name(self.addr)
    }

    /// Returns the name of the extended class.
    pub fn base_class_name(&self) -> Result<&'r str> {
        self.reader.category_base_class_name(self.addr)
    }

    /// Returns the slot referencing the extended class. ObjC1 categories
    /// name their class by string and have no slot.
    pub fn base_class(&self) -> Option<ObjCClassRef<'r>> {
        self.reader
            .category_base_class_slot(self.addr)
            .map(|slot| ObjCClassRef::new(self.reader, slot))
    }

    /// Returns the instance methods.
    pub fn instance_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.category_methods(self.addr, true)
    }

    /// Returns the class methods.
    pub fn class_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.category_methods(self.addr, false)
    }

    /// Returns the instance properties.
    pub fn properties(&self) -> Result<Vec<ObjCProperty<'r>>> {
        self.reader.category_properties(self.addr, true)
    }

    /// Returns the class properties. Empty unless the image info flags
    /// categories as carrying them.
    pub fn class_properties(&self) -> Result<Vec<ObjCProperty<'r>>> {
        self.reader.category_properties(self.addr, false)
    }

    /// Returns the adopted protocols.
    pub fn protocols(&self) -> Result<Vec<ObjCProtocolRef<'r>>> {
        self.reader.category_protocols(self.addr)
    }
}

// =============================================================================
// Protocols
// =============================================================================

/// A protocol structure.
#[derive(Clone, Copy)]
pub struct ObjCProtocol<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCProtocol<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns true for the external placeholder.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.protocol_name(self.addr)
    }

    /// Returns the protocols this protocol inherits from.
    pub fn protocols(&self) -> Result<Vec<ObjCProtocolRef<'r>>> {
        self.reader.protocol_protocols(self.addr)
    }

    /// Returns the instance methods.
    pub fn instance_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.protocol_methods(self.addr, true, false)
    }

    /// Returns the class methods.
    pub fn class_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.protocol_methods(self.addr, false, false)
    }

    /// Returns the optional instance methods.
    pub fn optional_instance_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.protocol_methods(self.addr, true, true)
    }

    /// Returns the optional class methods.
    pub fn optional_class_methods(&self) -> Result<Vec<ObjCMethod<'r>>> {
        self.reader.protocol_methods(self.addr, false, true)
    }

    /// Returns the instance properties.
    pub fn properties(&self) -> Result<Vec<ObjCProperty<'r>>> {
        self.reader.protocol_properties(self.addr)
    }
}

// =============================================================================
// List Entries
// =============================================================================

/// How a method list entry stores its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodEncoding {
    /// Pointer fields
    Absolute,
    /// 32-bit offsets; the name offset addresses a selector reference
    Relative,
    /// 32-bit offsets; the name offset addresses the selector string
    RelativeDirect,
}

/// A method list entry.
#[derive(Clone, Copy)]
pub struct ObjCMethod<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
    encoding: MethodEncoding,
}

impl<'r> ObjCMethod<'r> {
    pub(crate) fn new(
        reader: &'r ObjCMetaDataReader<'r>,
        addr: u64,
        encoding: MethodEncoding,
    ) -> Self {
        Self {
            reader,
            addr,
            encoding,
        }
    }

    /// Returns the selector name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.method_name(self.addr, self.encoding)
    }

    /// Returns the type encoding, empty when absent.
    pub fn types(&self) -> Result<&'r str> {
        self.reader.method_types(self.addr, self.encoding)
    }

    /// Returns true for relative method list entries.
    #[inline]
    pub fn is_relative(&self) -> bool {
        self.encoding != MethodEncoding::Absolute
    }

    /// Returns the entry encoding.
    #[inline]
    pub fn encoding(&self) -> MethodEncoding {
        self.encoding
    }
}

/// A property list entry.
#[derive(Clone, Copy)]
pub struct ObjCProperty<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCProperty<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.property_name(self.addr)
    }

    /// Returns the attribute string, e.g. `T@"NSString",R,N,V_name`.
    pub fn attributes(&self) -> Result<&'r str> {
        self.reader.property_attributes(self.addr)
    }
}

/// An instance variable list entry.
#[derive(Clone, Copy)]
pub struct ObjCIvar<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCIvar<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.ivar_name(self.addr)
    }

    /// Returns the type encoding.
    pub fn types(&self) -> Result<&'r str> {
        self.reader.ivar_types(self.addr)
    }

    /// Returns the byte offset of the ivar in the instance.
    pub fn offset(&self) -> Result<u32> {
        self.reader.ivar_offset(self.addr)
    }
}

/// A selector reference slot.
#[derive(Clone, Copy)]
pub struct ObjCSelectorRef<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCSelectorRef<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.selector_name(self.addr)
    }
}

// =============================================================================
// References
// =============================================================================

/// A slot pointing at a class, possibly in another image.
#[derive(Clone, Copy)]
pub struct ObjCClassRef<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCClassRef<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns true if the slot refers to another image.
    pub fn is_external(&self) -> Result<bool> {
        self.reader.slot_is_external(self.addr)
    }

    /// Returns the class name, derived from the bound symbol when external.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.class_ref_name(self.addr)
    }

    /// Returns the class, or the null placeholder when external.
    pub fn class(&self) -> Result<ObjCClass<'r>> {
        match self.reader.slot_target(self.addr)? {
            0 => Ok(ObjCClass::null(self.reader)),
            addr => Ok(ObjCClass::new(self.reader, addr)),
        }
    }
}

/// A slot pointing at a category.
#[derive(Clone, Copy)]
pub struct ObjCCategoryRef<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCCategoryRef<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns true if the slot refers to another image.
    pub fn is_external(&self) -> Result<bool> {
        self.reader.slot_is_external(self.addr)
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        if self.is_external()? {
            return Ok(self.reader.symbol_at(self.addr).unwrap_or(""));
        }
        self.category()?.name()
    }

    /// Returns the category, or a null placeholder when external.
    pub fn category(&self) -> Result<ObjCCategory<'r>> {
        let addr = self.reader.slot_target(self.addr)?;
        Ok(ObjCCategory::new(self.reader, addr))
    }
}

/// A slot pointing at a protocol.
#[derive(Clone, Copy)]
pub struct ObjCProtocolRef<'r> {
    reader: &'r ObjCMetaDataReader<'r>,
    addr: u64,
}

impl<'r> ObjCProtocolRef<'r> {
    pub(crate) fn new(reader: &'r ObjCMetaDataReader<'r>, addr: u64) -> Self {
        Self { reader, addr }
    }

    /// Returns true if the slot refers to another image.
    pub fn is_external(&self) -> Result<bool> {
        self.reader.slot_is_external(self.addr)
    }

    /// Returns the name.
    pub fn name(&self) -> Result<&'r str> {
        self.reader.protocol_ref_name(self.addr)
    }

    /// Returns the protocol, or a null placeholder when external.
    pub fn protocol(&self) -> Result<ObjCProtocol<'r>> {
        let addr = self.reader.slot_target(self.addr)?;
        Ok(ObjCProtocol::new(self.reader, addr))
    }
}
