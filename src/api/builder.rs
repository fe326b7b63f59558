//! Builds an [`API`] from one Mach-O slice.

use tracing::{debug, trace, warn};

use super::record::*;
use super::ScanOptions;
use crate::error::Result;
use crate::macho::{
    MachOFile, MachOFlags, PLATFORM_BRIDGEOS, PLATFORM_DRIVERKIT, PLATFORM_IOS,
    PLATFORM_IOSSIMULATOR, PLATFORM_MACCATALYST, PLATFORM_MACOS, PLATFORM_TVOS,
    PLATFORM_TVOSSIMULATOR, PLATFORM_WATCHOS, PLATFORM_WATCHOSSIMULATOR, SECTION_TYPE,
    S_THREAD_LOCAL_VARIABLES,
};
use crate::objc::{
    ObjCCategory, ObjCClass, ObjCMetaDataReader, ObjCMethod, ObjCProperty, ObjCProtocol,
    ObjCProtocolRef, ObjCRuntime,
};

const OBJC_CLASS_PREFIX: &str = "_OBJC_CLASS_$_";
const OBJC_METACLASS_PREFIX: &str = "_OBJC_METACLASS_$_";
const OBJC_EHTYPE_PREFIX: &str = "_OBJC_EHTYPE_$_";
const OBJC_IVAR_PREFIX: &str = "_OBJC_IVAR_$_";
const OBJC1_CLASS_PREFIX: &str = ".objc_class_name_";

/// Reads every API one slice provides.
///
/// The target triple comes from the cpu type and the platform load
/// commands. Exported symbols become globals unless they name ObjC runtime
/// structures, which are folded into the matching interface. A slice
/// without a supported ObjC runtime yields no ObjC records. Malformed ObjC
/// metadata is logged and skips only the enumeration it breaks, so the
/// symbol table records of the slice survive.
pub fn read_binary_api(image: &MachOFile<'_>, options: &ScanOptions) -> Result<API> {
    let mut api = API::new(target_triple(image, options.min_os));
    api.project_name = options.project_name.clone().unwrap_or_default();

    let reader = if options.parse_objc {
        match ObjCMetaDataReader::new(image) {
            Ok(reader) => Some(reader),
            Err(e) => {
                warn!("{}: unreadable ObjC metadata: {}", api.target, e);
                None
            }
        }
    } else {
        None
    };
    let reader = reader
        .as_ref()
        .filter(|r| r.runtime() != ObjCRuntime::Unsupported);

    if options.parse_header {
        api.binary = Some(binary_info(image, reader, &api.target));
    }

    if options.parse_symbol_table {
        add_exported_symbols(&mut api, image)?;
    }

    match reader {
        Some(reader) => add_objc_metadata(&mut api, reader),
        None if options.parse_objc => {
            debug!("{}: no supported ObjC runtime, skipping metadata", api.target)
        }
        None => {}
    }

    debug!(
        "{}: {} globals, {} interfaces, {} categories, {} protocols",
        api.target,
        api.globals.len(),
        api.interfaces.len(),
        api.categories.len(),
        api.protocols.len()
    );
    Ok(api)
}

// =============================================================================
// Header
// =============================================================================

/// Formats `<arch>-apple-<os><version>[-<environment>]`.
///
/// `min_os` only applies to images without a platform load command, which
/// are assumed to target macOS.
pub fn target_triple(image: &MachOFile<'_>, min_os: Option<PackedVersion>) -> String {
    let (os, environment, version) = match image.platform_version() {
        Some((platform, minos)) => {
            let (os, environment) = platform_name(platform);
            (os, environment, PackedVersion(minos))
        }
        None => ("macos", "", min_os.unwrap_or_default()),
    };

    let mut triple = format!("{}-apple-{}", image.arch_name(), os);
    if !version.is_zero() {
        triple.push_str(&version.to_string());
    }
    triple.push_str(environment);
    triple
}

fn platform_name(platform: u32) -> (&'static str, &'static str) {
    match platform {
        PLATFORM_MACOS => ("macos", ""),
        PLATFORM_IOS => ("ios", ""),
        PLATFORM_TVOS => ("tvos", ""),
        PLATFORM_WATCHOS => ("watchos", ""),
        PLATFORM_BRIDGEOS => ("bridgeos", ""),
        PLATFORM_MACCATALYST => ("ios", "-macabi"),
        PLATFORM_IOSSIMULATOR => ("ios", "-simulator"),
        PLATFORM_TVOSSIMULATOR => ("tvos", "-simulator"),
        PLATFORM_WATCHOSSIMULATOR => ("watchos", "-simulator"),
        PLATFORM_DRIVERKIT => ("driverkit", ""),
        _ => ("unknown", ""),
    }
}

fn binary_info(
    image: &MachOFile<'_>,
    reader: Option<&ObjCMetaDataReader<'_>>,
    target: &str,
) -> BinaryInfo {
    let header = image.header();
    let flags = header.macho_flags();

    let mut info = BinaryInfo {
        file_type: BinaryType::from_filetype(header.filetype),
        is_two_level_namespace: flags.contains(MachOFlags::TWOLEVEL),
        is_app_extension_safe: flags.contains(MachOFlags::APP_EXTENSION_SAFE),
        parent_umbrella: image.parent_umbrella().unwrap_or_default().to_string(),
        ..Default::default()
    };

    if let Some((command, name)) = image.id_dylib() {
        info.install_name = name.to_string();
        info.current_version = PackedVersion(command.dylib.current_version);
        info.compatibility_version = PackedVersion(command.dylib.compatibility_version);
    }

    if let Some(reader) = reader {
        match reader.swift_abi_version() {
            Ok(version) => info.swift_abi_version = version.to_string(),
            Err(e) => warn!("{}: unreadable Swift ABI version: {}", target, e),
        }
    }
    info
}

// =============================================================================
// Symbols
// =============================================================================

struct ExportedSymbol<'n> {
    name: &'n str,
    linkage: Linkage,
    kind: GlobalKind,
    weak_defined: bool,
    thread_local: bool,
}

fn add_exported_symbols(api: &mut API, image: &MachOFile<'_>) -> Result<()> {
    let exports = image.exports().unwrap_or_else(|e| {
        debug!("export trie unreadable, using symbol table: {}", e);
        Vec::new()
    });

    if !exports.is_empty() {
        let base = image.base_address();
        for export in &exports {
            let (linkage, kind) = if export.is_reexport() {
                (Linkage::Reexported, GlobalKind::Function)
            } else {
                let address = if export.is_absolute() {
                    export.address
                } else {
                    base.wrapping_add(export.address)
                };
                (Linkage::Exported, symbol_kind(image, address))
            };
            add_symbol(
                api,
                ExportedSymbol {
                    name: &export.name,
                    linkage,
                    kind,
                    weak_defined: export.is_weak(),
                    thread_local: export.is_thread_local(),
                },
            );
        }
        return Ok(());
    }

    for symbol in image.symbols()? {
        if symbol.is_stab()
            || !symbol.is_external()
            || symbol.is_private_external()
            || !symbol.is_defined()
        {
            continue;
        }
        let section = image.section_by_ordinal(symbol.n_sect);
        let thread_local =
            section.is_some_and(|s| s.flags & SECTION_TYPE == S_THREAD_LOCAL_VARIABLES);
        let kind = if section.is_some_and(|s| s.is_text()) {
            GlobalKind::Function
        } else {
            GlobalKind::Variable
        };
        add_symbol(
            api,
            ExportedSymbol {
                name: &symbol.name,
                linkage: Linkage::Exported,
                kind,
                weak_defined: symbol.is_weak_def(),
                thread_local,
            },
        );
    }
    Ok(())
}

fn symbol_kind(image: &MachOFile<'_>, address: u64) -> GlobalKind {
    match image.section_containing(address) {
        Some(section) if !section.is_text() => GlobalKind::Variable,
        _ => GlobalKind::Function,
    }
}

fn add_symbol(api: &mut API, symbol: ExportedSymbol<'_>) {
    let name = symbol.name;

    let class = name
        .strip_prefix(OBJC_CLASS_PREFIX)
        .or_else(|| name.strip_prefix(OBJC_METACLASS_PREFIX))
        .or_else(|| name.strip_prefix(OBJC1_CLASS_PREFIX));
    if let Some(class) = class {
        api.interface_mut(class).container.base.linkage = symbol.linkage;
        return;
    }

    if let Some(class) = name.strip_prefix(OBJC_EHTYPE_PREFIX) {
        let interface = api.interface_mut(class);
        interface.has_exception_type = true;
        interface.container.base.linkage = symbol.linkage;
        return;
    }

    if let Some((class, ivar)) = name
        .strip_prefix(OBJC_IVAR_PREFIX)
        .and_then(|rest| rest.split_once('.'))
    {
        api.interface_mut(class).container.ivar_mut(ivar).base.linkage = symbol.linkage;
        return;
    }

    let name = name.strip_prefix('_').unwrap_or(name);
    trace!("global {} ({:?})", name, symbol.kind);
    api.add_global(GlobalRecord {
        base: APIRecord::with_linkage(name, symbol.linkage),
        kind: symbol.kind,
        weak_defined: symbol.weak_defined,
        thread_local: symbol.thread_local,
    });
}

// =============================================================================
// ObjC metadata
// =============================================================================

/// Adds the ObjC records. Each enumeration fails on its own.
fn add_objc_metadata(api: &mut API, reader: &ObjCMetaDataReader<'_>) {
    let target = api.target.clone();
    let steps: [(&str, fn(&mut API, &ObjCMetaDataReader<'_>) -> Result<()>); 4] = [
        ("classes", add_classes),
        ("protocols", add_protocols),
        ("categories", add_categories),
        ("selectors", add_selectors),
    ];
    for (what, step) in steps {
        if let Err(e) = step(api, reader) {
            warn!("{}: skipping ObjC {}: {}", target, what, e);
        }
    }
}

fn add_classes(api: &mut API, reader: &ObjCMetaDataReader<'_>) -> Result<()> {
    for class in reader.classes()? {
        add_class(api, &class)?;
    }
    Ok(())
}

fn add_protocols(api: &mut API, reader: &ObjCMetaDataReader<'_>) -> Result<()> {
    for protocol in reader.protocols()? {
        api.add_protocol(protocol_record(&protocol)?);
    }
    Ok(())
}

fn add_categories(api: &mut API, reader: &ObjCMetaDataReader<'_>) -> Result<()> {
    for category in reader.categories()? {
        api.add_category(category_record(&category)?);
    }
    Ok(())
}

fn add_selectors(api: &mut API, reader: &ObjCMetaDataReader<'_>) -> Result<()> {
    reader.get_all_potentially_defined_selectors(&mut api.potentially_defined_selectors)
}

fn add_class(api: &mut API, class: &ObjCClass<'_>) -> Result<()> {
    let name = class.name()?;
    let record = api.interface_mut(name);
    record.super_class = class.super_class_name()?.to_string();
    record.is_swift = class.is_swift()?;

    let container = &mut record.container;
    if container.base.linkage == Linkage::Unknown {
        container.base.linkage = Linkage::Internal;
    }
    add_methods(container, &class.instance_methods()?, true, false)?;
    add_methods(container, &class.class_methods()?, false, false)?;
    add_properties(container, &class.properties()?, false)?;
    add_properties(container, &class.class_properties()?, true)?;

    for ivar in class.ivars()? {
        let record = container.ivar_mut(ivar.name()?);
        record.types = ivar.types()?.to_string();
        record.offset = ivar.offset()?;
        if record.base.linkage == Linkage::Unknown {
            record.base.linkage = Linkage::Internal;
        }
    }

    container.protocols = protocol_names(&class.protocols()?)?;
    Ok(())
}

fn category_record(category: &ObjCCategory<'_>) -> Result<ObjCCategoryRecord> {
    let mut record = ObjCCategoryRecord::new(category.base_class_name()?, category.name()?);
    let container = &mut record.container;
    container.base.linkage = Linkage::Internal;
    add_methods(container, &category.instance_methods()?, true, false)?;
    add_methods(container, &category.class_methods()?, false, false)?;
    add_properties(container, &category.properties()?, false)?;
    add_properties(container, &category.class_properties()?, true)?;
    container.protocols = protocol_names(&category.protocols()?)?;
    Ok(record)
}

fn protocol_record(protocol: &ObjCProtocol<'_>) -> Result<ObjCProtocolRecord> {
    let mut record = ObjCProtocolRecord::new(protocol.name()?);
    let container = &mut record.container;
    container.base.linkage = Linkage::Internal;
    add_methods(container, &protocol.instance_methods()?, true, false)?;
    add_methods(container, &protocol.class_methods()?, false, false)?;
    add_methods(container, &protocol.optional_instance_methods()?, true, true)?;
    add_methods(container, &protocol.optional_class_methods()?, false, true)?;
    add_properties(container, &protocol.properties()?, false)?;
    container.protocols = protocol_names(&protocol.protocols()?)?;
    Ok(record)
}

fn add_methods(
    container: &mut ObjCContainerRecord,
    methods: &[ObjCMethod<'_>],
    is_instance: bool,
    is_optional: bool,
) -> Result<()> {
    for method in methods {
        let mut record = ObjCMethodRecord::new(method.name()?, method.types()?, is_instance);
        record.is_optional = is_optional;
        record.base.linkage = Linkage::Internal;
        container.add_method(record);
    }
    Ok(())
}

fn add_properties(
    container: &mut ObjCContainerRecord,
    properties: &[ObjCProperty<'_>],
    is_class: bool,
) -> Result<()> {
    for property in properties {
        let name = property.name()?;
        if container.find_property_mut(name, is_class).is_some() {
            continue;
        }
        let mut record = ObjCPropertyRecord::from_attributes(name, property.attributes()?, is_class);
        record.base.linkage = Linkage::Internal;
        container.properties.push(record);
    }
    Ok(())
}

fn protocol_names(protocols: &[ObjCProtocolRef<'_>]) -> Result<Vec<String>> {
    protocols
        .iter()
        .map(|p| p.name().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::{
        EXPORT_SYMBOL_FLAGS_KIND_THREAD_LOCAL, EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION, MH_BUNDLE,
        N_WEAK_DEF,
    };
    use crate::testutil::{CategorySpec, ClassSpec, ImageBuilder, ProtocolSpec};
    use pretty_assertions::assert_eq;

    fn framework_image() -> Vec<u8> {
        let mut builder = ImageBuilder::new_64();
        builder
            .text_segment()
            .install_name("/System/Library/Frameworks/Foo.framework/Foo", 0x1_0200, 0x1_0000)
            .umbrella("Umbrella")
            .build_version(PLATFORM_MACOS, 0x000E_0000)
            .flags(MachOFlags::TWOLEVEL | MachOFlags::APP_EXTENSION_SAFE);
        builder.objc_image_info(7 << 8);

        let coding = builder.objc_protocol(&ProtocolSpec {
            name: "FooCoding",
            instance_methods: &[("encode", "v16@0:8")],
            optional_class_methods: &[("supportsSecureCoding", "B16@0:8")],
            ..Default::default()
        });
        let foo = builder.objc_class(&ClassSpec {
            name: "Foo",
            superclass: "NSObject",
            instance_methods: &[("bar", "v16@0:8")],
            class_methods: &[("sharedFoo", "@16@0:8")],
            properties: &[("name", "T@\"NSString\",R,N,V_name")],
            ivars: &[("_name", "@\"NSString\"", 8)],
            protocols: &[coding],
            relative: true,
            ..Default::default()
        });
        builder.objc_category(&CategorySpec {
            name: "Extras",
            class_addr: Some(foo),
            instance_methods: &[("baz", "v16@0:8")],
            ..Default::default()
        });

        let text = builder.reserve("__TEXT", "__text", 16);
        let data = builder.reserve("__DATA", "__data", 16);
        builder.export("_FooVersion", data, 0);
        builder.export("_FooRun", text, EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION);
        builder.export("_FooState", data + 8, EXPORT_SYMBOL_FLAGS_KIND_THREAD_LOCAL);
        builder.export("_OBJC_EHTYPE_$_Foo", data, 0);
        builder.export("_OBJC_IVAR_$_Foo._name", data, 0);
        builder.build()
    }

    #[test]
    fn test_binary_info_and_triple() {
        let data = framework_image();
        let file = MachOFile::parse(&data).unwrap();
        let api = read_binary_api(&file, &ScanOptions::default()).unwrap();

        assert_eq!(api.target, "arm64-apple-macos14.0");
        let binary = api.binary.unwrap();
        assert_eq!(binary.file_type, BinaryType::Dylib);
        assert_eq!(binary.install_name, "/System/Library/Frameworks/Foo.framework/Foo");
        assert_eq!(binary.current_version, PackedVersion::new(1, 2, 0));
        assert_eq!(binary.compatibility_version, PackedVersion::new(1, 0, 0));
        assert_eq!(binary.parent_umbrella, "Umbrella");
        assert_eq!(binary.swift_abi_version, "5.0 or later");
        assert!(binary.is_two_level_namespace);
        assert!(binary.is_app_extension_safe);
        assert!(binary.is_installed());
    }

    #[test]
    fn test_exports_become_globals() {
        let data = framework_image();
        let file = MachOFile::parse(&data).unwrap();
        let api = read_binary_api(&file, &ScanOptions::default()).unwrap();

        let names: Vec<_> = api.globals.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["FooRun", "FooState", "FooVersion"]);
        assert_eq!(api.globals["FooRun"].kind, GlobalKind::Function);
        assert!(api.globals["FooRun"].weak_defined);
        assert_eq!(api.globals["FooVersion"].kind, GlobalKind::Variable);
        assert!(api.globals["FooState"].thread_local);
        assert_eq!(api.globals["FooVersion"].base.linkage, Linkage::Exported);
    }

    #[test]
    fn test_objc_records() {
        let data = framework_image();
        let file = MachOFile::parse(&data).unwrap();
        let api = read_binary_api(&file, &ScanOptions::default()).unwrap();

        let foo = &api.interfaces["Foo"];
        assert_eq!(foo.super_class, "NSObject");
        assert!(foo.has_exception_type);
        assert!(!foo.is_swift);
        assert_eq!(foo.container.base.linkage, Linkage::Exported);
        assert_eq!(foo.categories, vec!["Extras".to_string()]);
        assert_eq!(foo.container.protocols, vec!["FooCoding".to_string()]);

        let bar = foo.container.find_method("bar", true).unwrap();
        assert_eq!(bar.types, "v16@0:8");
        assert!(foo.container.find_method("sharedFoo", false).is_some());
        assert!(foo.container.find_method("sharedFoo", true).is_none());

        let ivar = &foo.container.ivars[0];
        assert_eq!(ivar.base.name, "_name");
        assert_eq!(ivar.base.linkage, Linkage::Exported);
        assert_eq!(ivar.offset, 8);

        let property = &foo.container.properties[0];
        assert!(property.attributes.readonly);
        assert_eq!(property.types, "@\"NSString\"");

        let category = &api.categories[&("Foo".to_string(), "Extras".to_string())];
        assert!(category.container.find_method("baz", true).is_some());

        let coding = &api.protocols["FooCoding"];
        let optional = coding.container.find_method("supportsSecureCoding", false).unwrap();
        assert!(optional.is_optional);
        assert!(!coding.container.find_method("encode", true).unwrap().is_optional);
    }

    #[test]
    fn test_options_disable_steps() {
        let data = framework_image();
        let file = MachOFile::parse(&data).unwrap();
        let options = ScanOptions {
            parse_header: false,
            parse_objc: false,
            project_name: Some("Foo".into()),
            ..Default::default()
        };
        let api = read_binary_api(&file, &options).unwrap();

        assert!(api.binary.is_none());
        assert_eq!(api.project_name, "Foo");
        // Symbols still create the interface, but without metadata.
        assert_eq!(api.interfaces["Foo"].super_class, "");
        assert!(api.interfaces["Foo"].container.methods.is_empty());
    }

    #[test]
    fn test_no_runtime_is_not_an_error() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment().filetype(MH_BUNDLE);
        let text = builder.reserve("__TEXT", "__text", 8);
        builder.defined_symbol("_plugin_main", text, 0);
        builder.defined_symbol("_weak_hook", text + 4, N_WEAK_DEF);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let options = ScanOptions {
            min_os: PackedVersion::parse("10.15"),
            ..Default::default()
        };
        let api = read_binary_api(&file, &options).unwrap();
        assert_eq!(api.target, "arm64-apple-macos10.15");
        assert_eq!(api.binary.as_ref().unwrap().file_type, BinaryType::Bundle);
        assert!(api.interfaces.is_empty());
        assert_eq!(api.globals["plugin_main"].kind, GlobalKind::Function);
        assert!(api.globals["weak_hook"].weak_defined);
    }

    #[test]
    fn test_malformed_class_list_keeps_globals() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment();
        builder.objc_image_info(0);
        builder.objc_protocol(&ProtocolSpec {
            name: "Survivor",
            ..Default::default()
        });
        // Not a multiple of the pointer size.
        builder.reserve("__DATA", "__objc_classlist", 12);
        let data = builder.reserve("__DATA", "__data", 8);
        builder.export("_exported_global", data, 0);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let api = read_binary_api(&file, &ScanOptions::default()).unwrap();
        assert_eq!(api.globals["exported_global"].kind, GlobalKind::Variable);
        assert!(api.interfaces.is_empty());
        assert!(api.protocols.contains_key("Survivor"));
    }

    #[test]
    fn test_simulator_triple() {
        let mut builder = ImageBuilder::new_arm64e();
        builder.text_segment().build_version(PLATFORM_IOSSIMULATOR, 0x0011_0200);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();
        assert_eq!(target_triple(&file, None), "arm64e-apple-ios17.2-simulator");
    }
}
