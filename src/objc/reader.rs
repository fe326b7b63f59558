//! Objective-C metadata reader.
//!
//! [`ObjCMetaDataReader`] turns virtual addresses into typed reads over one
//! Mach-O image and walks the ObjC runtime structures found there. Every
//! read is bounds-checked against the covering section, corrected for byte
//! order and gated on the image's encrypted ranges. Pointer-sized reads
//! consult the [`AddressCache`] first so fixed-up slots read as their
//! resolved values.

use std::collections::{BTreeSet, HashSet};
use std::mem::{offset_of, size_of};

use tracing::{debug, trace};
use zerocopy::FromBytes;

use super::cache::AddressCache;
use super::layout::*;
use super::model::*;
use crate::error::{Error, Result};
use crate::macho::{EncryptedRange, MachOFile, SectionInfo, Swap};

/// String returned for reads inside an encrypted range.
pub const ENCRYPTED_PLACEHOLDER: &str = "~~ENCRYPTED~~";

/// Symbol prefixes naming class and metaclass objects.
const CLASS_SYMBOL_PREFIXES: &[&str] = &[
    "_OBJC_CLASS_$_",
    "_OBJC_METACLASS_$_",
    ".objc_class_name_",
];

/// Symbol prefixes naming protocol objects.
const PROTOCOL_SYMBOL_PREFIXES: &[&str] = &["__OBJC_PROTOCOL_$_", "_OBJC_PROTOCOL_$_"];

fn strip_symbol_prefix<'s>(symbol: &'s str, prefixes: &[&str]) -> &'s str {
    prefixes
        .iter()
        .find_map(|prefix| symbol.strip_prefix(prefix))
        .unwrap_or(symbol)
}

// =============================================================================
// Runtime Detection
// =============================================================================

/// Objective-C runtime ABI of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjCRuntime {
    /// Legacy runtime (`__OBJC` segment), 32-bit only
    ObjC1,
    /// Modern runtime
    ObjC2,
    /// No ObjC metadata, or ObjC1 markers in a 64-bit image
    Unsupported,
}

impl ObjCRuntime {
    /// Detects the runtime from section markers.
    pub fn detect(file: &MachOFile<'_>) -> Self {
        if file.section("__OBJC", "__module_info").is_some() {
            return if file.is_64() {
                ObjCRuntime::Unsupported
            } else {
                ObjCRuntime::ObjC1
            };
        }

        let objc2 = file.section("__OBJC2", "__module_info").is_some()
            || file.section("__DATA", "__objc_imageinfo").is_some()
            || file.section("__DATA_CONST", "__objc_imageinfo").is_some();
        if objc2 {
            ObjCRuntime::ObjC2
        } else {
            ObjCRuntime::Unsupported
        }
    }
}

/// Computes the class and category slot addresses of an ObjC1 symtab.
pub(crate) fn objc1_symtab_slots(symtab: u64, header: &Objc1Symtab) -> (Vec<u64>, Vec<u64>) {
    let first = symtab + size_of::<Objc1Symtab>() as u64;
    let classes = (0..header.cls_def_cnt as u64)
        .map(|i| first + i * 4)
        .collect();
    let category_base = first + header.cls_def_cnt as u64 * 4;
    let categories = (0..header.cat_def_cnt as u64)
        .map(|i| category_base + i * 4)
        .collect();
    (classes, categories)
}

// =============================================================================
// Reader
// =============================================================================

/// Reads Objective-C metadata from one Mach-O image.
///
/// Entities are handed out as lightweight `(reader, address)` wrappers that
/// borrow the reader; every accessor re-reads the image.
pub struct ObjCMetaDataReader<'a> {
    file: &'a MachOFile<'a>,
    cache: AddressCache,
    runtime: ObjCRuntime,
    encrypted: Vec<EncryptedRange>,
}

impl<'a> ObjCMetaDataReader<'a> {
    /// Creates a reader and builds its address resolution cache.
    pub fn new(file: &'a MachOFile<'a>) -> Result<Self> {
        let runtime = ObjCRuntime::detect(file);
        let cache = AddressCache::build(file)?;
        let encrypted = file.encrypted_ranges();

        debug!(
            "{} image: {:?}, {} encrypted ranges",
            file.arch_name(),
            runtime,
            encrypted.len()
        );

        Ok(Self {
            file,
            cache,
            runtime,
            encrypted,
        })
    }

    /// Returns the underlying image.
    #[inline]
    pub fn file(&self) -> &'a MachOFile<'a> {
        self.file
    }

    /// Returns the detected runtime.
    #[inline]
    pub fn runtime(&self) -> ObjCRuntime {
        self.runtime
    }

    /// Returns the address resolution cache.
    #[inline]
    pub fn cache(&self) -> &AddressCache {
        &self.cache
    }

    /// Returns true for 64-bit images.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.file.is_64()
    }

    /// Returns the pointer width in bytes.
    #[inline]
    pub fn pointer_size(&self) -> u64 {
        self.file.pointer_size()
    }

    #[inline]
    fn layout(&self) -> &'static Layout {
        if self.is_64() {
            &LAYOUT_64
        } else {
            &LAYOUT_32
        }
    }

    #[inline]
    fn is_objc1(&self) -> bool {
        self.runtime == ObjCRuntime::ObjC1
    }

    fn supported_runtime(&self) -> Result<ObjCRuntime> {
        match self.runtime {
            ObjCRuntime::Unsupported => Err(Error::UnsupportedRuntime),
            runtime => Ok(runtime),
        }
    }

    // =========================================================================
    // Raw Struct Accessor
    // =========================================================================

    /// Returns true if the address lies in an encrypted file range.
    pub fn is_encrypted(&self, addr: u64) -> bool {
        if self.encrypted.is_empty() {
            return false;
        }
        let Some(segment) = self.file.segment_containing(addr) else {
            return false;
        };
        let offset = segment.fileoff + (addr - segment.vmaddr);
        self.encrypted.iter().any(|range| range.contains(offset))
    }

    /// Locates `len` bytes at `addr` inside one section, returning the
    /// section and the file offset.
    fn locate(&self, addr: u64, len: u64) -> Result<(&'a SectionInfo, u64)> {
        let section = self
            .file
            .section_containing(addr)
            .ok_or(Error::out_of_bounds(addr, len))?;
        let delta = addr - section.addr;
        if len > section.size - delta {
            return Err(Error::out_of_bounds(addr, len));
        }
        Ok((section, section.offset as u64 + delta))
    }

    /// Returns the raw bytes at `addr`.
    pub fn get_bytes(&self, addr: u64, len: u64) -> Result<&'a [u8]> {
        if self.is_encrypted(addr) {
            return Err(Error::Encrypted { addr });
        }
        let (_, offset) = self.locate(addr, len)?;
        self.file
            .read_at(offset as usize, len as usize)
            .map_err(|_| Error::out_of_bounds(addr, len))
    }

    /// Reads a `T` at `addr`, swapped to host byte order.
    pub fn get_data<T: FromBytes + Swap>(&self, addr: u64) -> Result<T> {
        if self.is_encrypted(addr) {
            return Err(Error::Encrypted { addr });
        }
        let len = size_of::<T>() as u64;
        let (_, offset) = self.locate(addr, len)?;
        self.file
            .read_struct(offset as usize)
            .map_err(|_| Error::out_of_bounds(addr, len))
    }

    /// Reads the NUL-terminated string at `addr`.
    ///
    /// Inside an encrypted range this returns [`ENCRYPTED_PLACEHOLDER`]
    /// instead of failing.
    pub fn get_string(&self, addr: u64, allow_empty: bool) -> Result<&'a str> {
        if self.is_encrypted(addr) {
            return Ok(ENCRYPTED_PLACEHOLDER);
        }
        let section = self
            .file
            .section_containing(addr)
            .ok_or(Error::out_of_bounds(addr, 1))?;
        let remaining = section.size - (addr - section.addr);
        let bytes = self.get_bytes(addr, remaining)?;

        let len = memchr::memchr(0, bytes).ok_or(Error::out_of_bounds(addr, remaining))?;
        if len == 0 && !allow_empty {
            return Err(Error::EmptyString { addr });
        }
        std::str::from_utf8(&bytes[..len]).map_err(|_| Error::malformed(addr, "string is not UTF-8"))
    }

    /// Reads a 32-bit pointer, preferring the resolved value.
    pub fn get_pointer_value32(&self, addr: u64) -> Result<u32> {
        match self.cache.pointer_at(addr) {
            Some(value) => Ok(value as u32),
            None => self.get_data::<u32>(addr),
        }
    }

    /// Reads a 64-bit pointer, preferring the resolved value.
    pub fn get_pointer_value64(&self, addr: u64) -> Result<u64> {
        match self.cache.pointer_at(addr) {
            Some(value) => Ok(value),
            None => self.get_data::<u64>(addr),
        }
    }

    /// Reads a pointer of the image's width, preferring the resolved value.
    pub fn get_pointer_value(&self, addr: u64) -> Result<u64> {
        if self.is_64() {
            self.get_pointer_value64(addr)
        } else {
            self.get_pointer_value32(addr).map(u64::from)
        }
    }

    /// Reads a signed 32-bit relative offset.
    pub fn get_i32(&self, addr: u64) -> Result<i32> {
        self.get_data::<u32>(addr).map(|v| v as i32)
    }

    /// Returns the symbol bound at `addr`.
    #[inline]
    pub fn symbol_at(&self, addr: u64) -> Option<&str> {
        self.cache.symbol_at(addr)
    }

    /// Reads the string a pointer field addresses; a null pointer is empty.
    fn optional_string(&self, field: u64) -> Result<&'a str> {
        match self.get_pointer_value(field)? {
            0 => Ok(""),
            ptr => self.get_string(ptr, true),
        }
    }

    /// Reads the non-empty string a pointer field addresses.
    fn required_string(&self, field: u64) -> Result<&'a str> {
        let ptr = self.get_pointer_value(field)?;
        self.get_string(ptr, false)
    }

    /// Fails unless `len` bytes at `addr` fit in one section.
    fn check_span(&self, addr: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        match self.file.section_containing(addr) {
            Some(section) if len <= section.size - (addr - section.addr) => Ok(()),
            Some(section) => Err(Error::malformed(
                addr,
                format!("{} bytes overrun {}", len, section.full_name()),
            )),
            None => Err(Error::malformed(addr, "list is outside every section")),
        }
    }

    /// Returns the slot addresses of a pointer list section.
    fn pointer_slots(&self, section: Option<&SectionInfo>) -> Result<Vec<u64>> {
        let Some(section) = section else {
            return Ok(Vec::new());
        };
        let ps = self.pointer_size();
        if section.size % ps != 0 {
            return Err(Error::MalformedSection {
                segment: section.segment_name.clone(),
                section: section.name.clone(),
                size: section.size,
                element: ps,
            });
        }
        Ok((0..section.size / ps).map(|i| section.addr + i * ps).collect())
    }

    /// Returns the slots of an ObjC2 list section.
    fn objc2_slots(&self, name: &str) -> Result<Vec<u64>> {
        self.pointer_slots(self.file.find_section(name))
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Returns the class list slots.
    pub fn class_refs(&self) -> Result<Vec<ObjCClassRef<'_>>> {
        let slots = match self.supported_runtime()? {
            ObjCRuntime::ObjC1 => self.objc1_symtabs()?.0,
            _ => self.objc2_slots("__objc_classlist")?,
        };
        Ok(slots.into_iter().map(|slot| ObjCClassRef::new(self, slot)).collect())
    }

    /// Returns the classes defined in the image.
    pub fn classes(&self) -> Result<Vec<ObjCClass<'_>>> {
        let mut classes = Vec::new();
        for class_ref in self.class_refs()? {
            let class = class_ref.class()?;
            if class.is_null() {
                debug!("class list slot {:#x} is external", class_ref.address());
                continue;
            }
            classes.push(class);
        }
        Ok(classes)
    }

    /// Returns the category list slots.
    pub fn category_refs(&self) -> Result<Vec<ObjCCategoryRef<'_>>> {
        let slots = match self.supported_runtime()? {
            ObjCRuntime::ObjC1 => self.objc1_symtabs()?.1,
            _ => self.objc2_slots("__objc_catlist")?,
        };
        Ok(slots.into_iter().map(|slot| ObjCCategoryRef::new(self, slot)).collect())
    }

    /// Returns the categories defined in the image.
    pub fn categories(&self) -> Result<Vec<ObjCCategory<'_>>> {
        let mut categories = Vec::new();
        for category_ref in self.category_refs()? {
            let category = category_ref.category()?;
            if category.is_null() {
                debug!("category list slot {:#x} is external", category_ref.address());
                continue;
            }
            categories.push(category);
        }
        Ok(categories)
    }

    /// Returns the protocols defined in the image.
    pub fn protocols(&self) -> Result<Vec<ObjCProtocol<'_>>> {
        match self.supported_runtime()? {
            ObjCRuntime::ObjC1 => {
                let Some(section) = self.file.section("__OBJC", "__protocol") else {
                    return Ok(Vec::new());
                };
                let element = size_of::<Objc1Protocol>() as u64;
                if section.size % element != 0 {
                    return Err(Error::MalformedSection {
                        segment: section.segment_name.clone(),
                        section: section.name.clone(),
                        size: section.size,
                        element,
                    });
                }
                Ok((0..section.size / element)
                    .map(|i| ObjCProtocol::new(self, section.addr + i * element))
                    .collect())
            }
            _ => {
                let mut protocols = Vec::new();
                for slot in self.objc2_slots("__objc_protolist")? {
                    let protocol = ObjCProtocolRef::new(self, slot).protocol()?;
                    if !protocol.is_null() {
                        protocols.push(protocol);
                    }
                }
                Ok(protocols)
            }
        }
    }

    /// Returns the selector reference slots.
    pub fn referenced_selectors(&self) -> Result<Vec<ObjCSelectorRef<'_>>> {
        let slots = match self.supported_runtime()? {
            ObjCRuntime::ObjC1 => {
                self.pointer_slots(self.file.section("__OBJC", "__message_refs"))?
            }
            _ => self.objc2_slots("__objc_selrefs")?,
        };
        Ok(slots
            .into_iter()
            .map(|slot| ObjCSelectorRef::new(self, slot))
            .collect())
    }

    /// Inserts the selectors that may be defined by Swift classes.
    ///
    /// Every pointer-sized word of `__objc_const` whose resolved value lies
    /// in `__objc_methname` names a method; those that are also referenced
    /// from `__objc_selrefs` are inserted into `selectors`.
    pub fn get_all_potentially_defined_selectors(
        &self,
        selectors: &mut BTreeSet<String>,
    ) -> Result<()> {
        if self.supported_runtime()? != ObjCRuntime::ObjC2 {
            return Ok(());
        }
        let (Some(methname), Some(consts)) = (
            self.file.find_section("__objc_methname"),
            self.file.find_section("__objc_const"),
        ) else {
            return Ok(());
        };

        let mut referenced = HashSet::new();
        for selector in self.referenced_selectors()? {
            referenced.insert(selector.name()?);
        }

        let ps = self.pointer_size();
        let before = selectors.len();
        for i in 0..consts.size / ps {
            let Ok(value) = self.get_pointer_value(consts.addr + i * ps) else {
                continue;
            };
            if !methname.contains_addr(value) {
                continue;
            }
            if let Ok(name) = self.get_string(value, false) {
                if referenced.contains(name) {
                    selectors.insert(name.to_string());
                }
            }
        }
        trace!("{} potentially defined selectors", selectors.len() - before);
        Ok(())
    }

    /// Reads `objc_image_info`, if present.
    pub fn image_info(&self) -> Result<Option<ImageInfo>> {
        let section = match self.supported_runtime()? {
            ObjCRuntime::ObjC1 => self.file.section("__OBJC", "__image_info"),
            _ => self.file.find_section("__objc_imageinfo"),
        };
        match section {
            Some(section) => self.get_data(section.addr).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the Swift ABI version the image was built with.
    pub fn swift_abi_version(&self) -> Result<&'static str> {
        Ok(self
            .image_info()?
            .map(|info| swift_abi_name(info.swift_version()))
            .unwrap_or(""))
    }

    /// Returns true if categories carry a class properties list.
    pub fn has_category_class_properties(&self) -> Result<bool> {
        Ok(self
            .image_info()?
            .is_some_and(|info| info.has_category_class_properties()))
    }

    // =========================================================================
    // ObjC1 Symtab Walk
    // =========================================================================

    /// Walks every module's symtab, returning class and category slots.
    fn objc1_symtabs(&self) -> Result<(Vec<u64>, Vec<u64>)> {
        let mut classes = Vec::new();
        let mut categories = Vec::new();

        let Some(section) = self.file.section("__OBJC", "__module_info") else {
            return Ok((classes, categories));
        };
        let element = size_of::<Objc1Module>() as u64;
        if section.size % element != 0 {
            return Err(Error::MalformedSection {
                segment: section.segment_name.clone(),
                section: section.name.clone(),
                size: section.size,
                element,
            });
        }

        for i in 0..section.size / element {
            let module = section.addr + i * element;
            let symtab = self.get_pointer_value(module + offset_of!(Objc1Module, symtab) as u64)?;
            if symtab == 0 {
                continue;
            }

            let header: Objc1Symtab = self.get_data(symtab)?;
            let count = header.cls_def_cnt as u64 + header.cat_def_cnt as u64;
            let span = size_of::<Objc1Symtab>() as u64 + count * 4;
            self.check_span(symtab, span)?;

            let (class_slots, category_slots) = objc1_symtab_slots(symtab, &header);
            trace!(
                "module {:#x}: {} classes, {} categories",
                module,
                class_slots.len(),
                category_slots.len()
            );
            classes.extend(class_slots);
            categories.extend(category_slots);
        }
        Ok((classes, categories))
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Returns true if a slot refers outside the image.
    ///
    /// Slots whose resolved value is null are external. Slots named by the
    /// symbol map are external unless they also resolve into the image.
    pub(crate) fn slot_is_external(&self, slot: u64) -> Result<bool> {
        let value = self.get_pointer_value(slot)?;
        if value == 0 {
            return Ok(true);
        }
        if self.cache.symbol_at(slot).is_some() {
            return Ok(self.file.section_containing(value).is_none());
        }
        Ok(false)
    }

    /// Returns the target of a slot, or 0 when external.
    pub(crate) fn slot_target(&self, slot: u64) -> Result<u64> {
        if self.slot_is_external(slot)? {
            Ok(0)
        } else {
            self.get_pointer_value(slot)
        }
    }

    pub(crate) fn class_ref_name(&self, slot: u64) -> Result<&str> {
        if self.slot_is_external(slot)? {
            return Ok(self
                .cache
                .symbol_at(slot)
                .map(|symbol| strip_symbol_prefix(symbol, CLASS_SYMBOL_PREFIXES))
                .unwrap_or(""));
        }
        let class = self.get_pointer_value(slot)?;
        self.class_name(class)
    }

    pub(crate) fn protocol_ref_name(&self, slot: u64) -> Result<&str> {
        if self.slot_is_external(slot)? {
            return Ok(self
                .cache
                .symbol_at(slot)
                .map(|symbol| strip_symbol_prefix(symbol, PROTOCOL_SYMBOL_PREFIXES))
                .unwrap_or(""));
        }
        let protocol = self.get_pointer_value(slot)?;
        self.protocol_name(protocol)
    }

    pub(crate) fn selector_name(&self, slot: u64) -> Result<&'a str> {
        self.required_string(slot)
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Returns the read-only data of an ObjC2 class and its tag bits.
    fn class_ro(&self, class: u64) -> Result<(u64, u64)> {
        let layout = self.layout();
        let data = self.get_pointer_value(class + layout.class.data)?;
        Ok((data & !layout.tag_mask, data & layout.tag_mask))
    }

    fn objc1_class_field(&self, class: u64, offset: usize) -> Result<u64> {
        self.get_pointer_value(class + offset as u64)
    }

    pub(crate) fn class_name(&self, class: u64) -> Result<&'a str> {
        if self.is_objc1() {
            return self.required_string(class + offset_of!(Objc1Class, name) as u64);
        }
        let (ro, _) = self.class_ro(class)?;
        self.required_string(ro + self.layout().class_ro.name)
    }

    pub(crate) fn class_super_name(&self, class: u64) -> Result<&str> {
        if self.is_objc1() {
            let slot = class + offset_of!(Objc1Class, super_class) as u64;
            if let Some(symbol) = self.cache.symbol_at(slot) {
                return Ok(strip_symbol_prefix(symbol, CLASS_SYMBOL_PREFIXES));
            }
            return self.optional_string(slot);
        }
        self.class_ref_name(class + self.layout().class.superclass)
    }

    pub(crate) fn class_is_meta(&self, class: u64) -> Result<bool> {
        if self.is_objc1() {
            let info: u32 = self.get_data(class + offset_of!(Objc1Class, info) as u64)?;
            return Ok(info & CLS_META != 0);
        }
        let (ro, _) = self.class_ro(class)?;
        let flags: u32 = self.get_data(ro + self.layout().class_ro.flags)?;
        Ok(flags & RO_META != 0)
    }

    pub(crate) fn class_is_swift(&self, class: u64) -> Result<bool> {
        if self.is_objc1() {
            return Ok(false);
        }
        let (_, tag) = self.class_ro(class)?;
        Ok(tag != 0)
    }

    /// Returns the metaclass address, or 0 when it is external.
    pub(crate) fn class_meta(&self, class: u64) -> Result<u64> {
        if self.is_objc1() {
            let isa = self.objc1_class_field(class, offset_of!(Objc1Class, isa))?;
            return Ok(if self.file.section_containing(isa).is_some() {
                isa
            } else {
                0
            });
        }
        self.slot_target(class + self.layout().class.isa)
    }

    /// Returns the methods stored on the class structure itself.
    pub(crate) fn class_own_methods(&self, class: u64) -> Result<Vec<ObjCMethod<'_>>> {
        if self.is_objc1() {
            return self.objc1_class_methods(class);
        }
        let (ro, _) = self.class_ro(class)?;
        let list = self.get_pointer_value(ro + self.layout().class_ro.base_methods)?;
        self.method_list(list)
    }

    pub(crate) fn class_own_properties(&self, class: u64) -> Result<Vec<ObjCProperty<'_>>> {
        if self.is_objc1() {
            return self.objc1_class_properties(class);
        }
        let (ro, _) = self.class_ro(class)?;
        let list = self.get_pointer_value(ro + self.layout().class_ro.base_properties)?;
        self.property_list(list)
    }

    pub(crate) fn class_ivars(&self, class: u64) -> Result<Vec<ObjCIvar<'_>>> {
        if self.is_objc1() {
            let list = self.objc1_class_field(class, offset_of!(Objc1Class, ivars))?;
            return self.objc1_ivar_list(list);
        }
        let (ro, _) = self.class_ro(class)?;
        let list = self.get_pointer_value(ro + self.layout().class_ro.ivars)?;
        self.ivar_list(list)
    }

    pub(crate) fn class_protocols(&self, class: u64) -> Result<Vec<ObjCProtocolRef<'_>>> {
        if self.is_objc1() {
            let list = self.objc1_class_field(class, offset_of!(Objc1Class, protocols))?;
            return self.objc1_protocol_list(list);
        }
        let (ro, _) = self.class_ro(class)?;
        let list = self.get_pointer_value(ro + self.layout().class_ro.base_protocols)?;
        self.protocol_list(list)
    }

    fn objc1_class_methods(&self, class: u64) -> Result<Vec<ObjCMethod<'_>>> {
        let info: u32 = self.get_data(class + offset_of!(Objc1Class, info) as u64)?;
        let lists = self.objc1_class_field(class, offset_of!(Objc1Class, method_lists))?;
        if lists == 0 {
            return Ok(Vec::new());
        }
        if info & CLS_NO_METHOD_ARRAY != 0 {
            return self.objc1_method_list(lists);
        }

        // Array of list pointers ending in 0 or -1.
        let mut methods = Vec::new();
        let mut slot = lists;
        loop {
            let list = self.get_pointer_value32(slot)?;
            if list == 0 || list == u32::MAX {
                break;
            }
            methods.extend(self.objc1_method_list(list as u64)?);
            slot += 4;
        }
        Ok(methods)
    }

    fn objc1_class_properties(&self, class: u64) -> Result<Vec<ObjCProperty<'_>>> {
        let info: u32 = self.get_data(class + offset_of!(Objc1Class, info) as u64)?;
        if info & CLS_EXT == 0 {
            return Ok(Vec::new());
        }
        let tail: Objc1ClassTail = self.get_data(class + size_of::<Objc1Class>() as u64)?;
        if tail.ext == 0 {
            return Ok(Vec::new());
        }
        let ext: Objc1ClassExt = self.get_data(tail.ext as u64)?;
        if (ext.size as usize) < size_of::<Objc1ClassExt>() {
            return Ok(Vec::new());
        }
        self.property_list(ext.properties as u64)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub(crate) fn category_name(&self, category: u64) -> Result<&'a str> {
        if self.is_objc1() {
            return self.required_string(category + offset_of!(Objc1Category, category_name) as u64);
        }
        self.required_string(category + self.layout().category.name)
    }

    pub(crate) fn category_base_class_name(&self, category: u64) -> Result<&str> {
        if self.is_objc1() {
            let slot = category + offset_of!(Objc1Category, class_name) as u64;
            if let Some(symbol) = self.cache.symbol_at(slot) {
                return Ok(strip_symbol_prefix(symbol, CLASS_SYMBOL_PREFIXES));
            }
            return self.required_string(slot);
        }
        self.class_ref_name(category + self.layout().category.cls)
    }

    pub(crate) fn category_base_class_slot(&self, category: u64) -> Option<u64> {
        if self.is_objc1() {
            None
        } else {
            Some(category + self.layout().category.cls)
        }
    }

    pub(crate) fn category_methods(
        &self,
        category: u64,
        instance: bool,
    ) -> Result<Vec<ObjCMethod<'_>>> {
        if self.is_objc1() {
            let offset = if instance {
                offset_of!(Objc1Category, instance_methods)
            } else {
                offset_of!(Objc1Category, class_methods)
            };
            let list = self.get_pointer_value(category + offset as u64)?;
            return self.objc1_method_list(list);
        }
        let layout = &self.layout().category;
        let offset = if instance {
            layout.instance_methods
        } else {
            layout.class_methods
        };
        let list = self.get_pointer_value(category + offset)?;
        self.method_list(list)
    }

    pub(crate) fn category_properties(
        &self,
        category: u64,
        instance: bool,
    ) -> Result<Vec<ObjCProperty<'_>>> {
        if self.is_objc1() {
            return Ok(Vec::new());
        }
        let layout = &self.layout().category;
        let offset = if instance {
            layout.instance_properties
        } else if self.has_category_class_properties()? {
            layout.class_properties
        } else {
            return Ok(Vec::new());
        };
        let list = self.get_pointer_value(category + offset)?;
        self.property_list(list)
    }

    pub(crate) fn category_protocols(&self, category: u64) -> Result<Vec<ObjCProtocolRef<'_>>> {
        if self.is_objc1() {
            let list = self.get_pointer_value(category + offset_of!(Objc1Category, protocols) as u64)?;
            return self.objc1_protocol_list(list);
        }
        let list = self.get_pointer_value(category + self.layout().category.protocols)?;
        self.protocol_list(list)
    }

    // =========================================================================
    // Protocols
    // =========================================================================

    pub(crate) fn protocol_name(&self, protocol: u64) -> Result<&'a str> {
        if self.is_objc1() {
            return self.required_string(protocol + offset_of!(Objc1Protocol, protocol_name) as u64);
        }
        self.required_string(protocol + self.layout().protocol.name)
    }

    pub(crate) fn protocol_protocols(&self, protocol: u64) -> Result<Vec<ObjCProtocolRef<'_>>> {
        if self.is_objc1() {
            let list =
                self.get_pointer_value(protocol + offset_of!(Objc1Protocol, protocol_list) as u64)?;
            return self.objc1_protocol_list(list);
        }
        let list = self.get_pointer_value(protocol + self.layout().protocol.protocols)?;
        self.protocol_list(list)
    }

    pub(crate) fn protocol_methods(
        &self,
        protocol: u64,
        instance: bool,
        optional: bool,
    ) -> Result<Vec<ObjCMethod<'_>>> {
        if self.is_objc1() {
            if optional {
                return Ok(Vec::new());
            }
            let offset = if instance {
                offset_of!(Objc1Protocol, instance_methods)
            } else {
                offset_of!(Objc1Protocol, class_methods)
            };
            let list = self.get_pointer_value(protocol + offset as u64)?;
            return self.objc1_method_descriptions(list);
        }
        let layout = &self.layout().protocol;
        let offset = match (instance, optional) {
            (true, false) => layout.instance_methods,
            (false, false) => layout.class_methods,
            (true, true) => layout.optional_instance_methods,
            (false, true) => layout.optional_class_methods,
        };
        let list = self.get_pointer_value(protocol + offset)?;
        self.method_list(list)
    }

    pub(crate) fn protocol_properties(&self, protocol: u64) -> Result<Vec<ObjCProperty<'_>>> {
        if self.is_objc1() {
            return Ok(Vec::new());
        }
        let list = self.get_pointer_value(protocol + self.layout().protocol.instance_properties)?;
        self.property_list(list)
    }

    // =========================================================================
    // Lists
    // =========================================================================

    fn method_list(&self, list: u64) -> Result<Vec<ObjCMethod<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let header: ListHeader = self.get_data(list)?;
        let (entry_size, encoding) = if header.is_relative() {
            let encoding = if header.has_direct_selectors() {
                MethodEncoding::RelativeDirect
            } else {
                MethodEncoding::Relative
            };
            (RELATIVE_METHOD_SIZE, encoding)
        } else {
            (self.layout().entry.method_size, MethodEncoding::Absolute)
        };

        let start = list + size_of::<ListHeader>() as u64;
        self.check_span(start, entry_size * header.count as u64)?;
        Ok((0..header.count as u64)
            .map(|i| ObjCMethod::new(self, start + i * entry_size, encoding))
            .collect())
    }

    fn property_list(&self, list: u64) -> Result<Vec<ObjCProperty<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let header: ListHeader = self.get_data(list)?;
        let entry_size = self.layout().entry.property_size;
        let start = list + size_of::<ListHeader>() as u64;
        self.check_span(start, entry_size * header.count as u64)?;
        Ok((0..header.count as u64)
            .map(|i| ObjCProperty::new(self, start + i * entry_size))
            .collect())
    }

    fn ivar_list(&self, list: u64) -> Result<Vec<ObjCIvar<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let header: ListHeader = self.get_data(list)?;
        let entry_size = self.layout().entry.ivar_size;
        let start = list + size_of::<ListHeader>() as u64;
        self.check_span(start, entry_size * header.count as u64)?;
        Ok((0..header.count as u64)
            .map(|i| ObjCIvar::new(self, start + i * entry_size))
            .collect())
    }

    fn protocol_list(&self, list: u64) -> Result<Vec<ObjCProtocolRef<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let ps = self.pointer_size();
        let count = if self.is_64() {
            self.get_data::<u64>(list)?
        } else {
            self.get_data::<u32>(list)? as u64
        };
        let start = list + ps;
        self.check_span(start, count.saturating_mul(ps))?;
        Ok((0..count)
            .map(|i| ObjCProtocolRef::new(self, start + i * ps))
            .collect())
    }

    fn objc1_method_list(&self, list: u64) -> Result<Vec<ObjCMethod<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let header: Objc1MethodList = self.get_data(list)?;
        let entry_size = size_of::<Method32>() as u64;
        let start = list + size_of::<Objc1MethodList>() as u64;
        self.check_span(start, entry_size * header.count as u64)?;
        Ok((0..header.count as u64)
            .map(|i| ObjCMethod::new(self, start + i * entry_size, MethodEncoding::Absolute))
            .collect())
    }

    fn objc1_method_descriptions(&self, list: u64) -> Result<Vec<ObjCMethod<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let count: u32 = self.get_data(list)?;
        let entry_size = size_of::<Objc1MethodDescription>() as u64;
        let start = list + 4;
        self.check_span(start, entry_size * count as u64)?;
        Ok((0..count as u64)
            .map(|i| ObjCMethod::new(self, start + i * entry_size, MethodEncoding::Absolute))
            .collect())
    }

    fn objc1_ivar_list(&self, list: u64) -> Result<Vec<ObjCIvar<'_>>> {
        if list == 0 {
            return Ok(Vec::new());
        }
        let count: u32 = self.get_data(list)?;
        let entry_size = size_of::<Objc1Ivar>() as u64;
        let start = list + 4;
        self.check_span(start, entry_size * count as u64)?;
        Ok((0..count as u64)
            .map(|i| ObjCIvar::new(self, start + i * entry_size))
            .collect())
    }

    fn objc1_protocol_list(&self, list: u64) -> Result<Vec<ObjCProtocolRef<'_>>> {
        let mut protocols = Vec::new();
        let mut visited = HashSet::new();
        let mut list = list;
        while list != 0 && visited.insert(list) {
            let header: Objc1ProtocolList = self.get_data(list)?;
            let start = list + size_of::<Objc1ProtocolList>() as u64;
            self.check_span(start, header.count as u64 * 4)?;
            protocols.extend((0..header.count as u64).map(|i| ObjCProtocolRef::new(self, start + i * 4)));
            list = header.next as u64;
        }
        Ok(protocols)
    }

    // =========================================================================
    // Entries
    // =========================================================================

    pub(crate) fn method_name(&self, entry: u64, encoding: MethodEncoding) -> Result<&'a str> {
        match encoding {
            MethodEncoding::Absolute => self.required_string(entry),
            MethodEncoding::Relative => {
                let selref = self.relative_target(entry)?;
                self.required_string(selref)
            }
            MethodEncoding::RelativeDirect => {
                let name = self.relative_target(entry)?;
                self.get_string(name, false)
            }
        }
    }

    pub(crate) fn method_types(&self, entry: u64, encoding: MethodEncoding) -> Result<&'a str> {
        match encoding {
            MethodEncoding::Absolute => {
                self.optional_string(entry + self.layout().entry.method_types)
            }
            MethodEncoding::Relative | MethodEncoding::RelativeDirect => {
                let field = entry + 4;
                match self.get_i32(field)? {
                    0 => Ok(""),
                    offset => self.get_string(field.wrapping_add(offset as i64 as u64), true),
                }
            }
        }
    }

    fn relative_target(&self, field: u64) -> Result<u64> {
        let offset = self.get_i32(field)?;
        Ok(field.wrapping_add(offset as i64 as u64))
    }

    pub(crate) fn property_name(&self, entry: u64) -> Result<&'a str> {
        self.required_string(entry)
    }

    pub(crate) fn property_attributes(&self, entry: u64) -> Result<&'a str> {
        self.optional_string(entry + self.layout().entry.property_attributes)
    }

    pub(crate) fn ivar_name(&self, entry: u64) -> Result<&'a str> {
        if self.is_objc1() {
            return self.required_string(entry + offset_of!(Objc1Ivar, name) as u64);
        }
        self.required_string(entry + self.layout().entry.ivar_name)
    }

    pub(crate) fn ivar_types(&self, entry: u64) -> Result<&'a str> {
        if self.is_objc1() {
            return self.optional_string(entry + offset_of!(Objc1Ivar, types) as u64);
        }
        self.optional_string(entry + self.layout().entry.ivar_types)
    }

    pub(crate) fn ivar_offset(&self, entry: u64) -> Result<u32> {
        if self.is_objc1() {
            return self.get_data(entry + offset_of!(Objc1Ivar, offset) as u64);
        }
        match self.get_pointer_value(entry + self.layout().entry.ivar_offset)? {
            0 => Ok(0),
            variable => self.get_data(variable),
        }
    }
}
