//! Baseline/candidate comparison of canonical tables.

use std::collections::BTreeSet;

use tracing::info;

use super::canonical::{
    method_display_name, CanonicalEntry, CanonicalSdk, CanonicalTarget, ContainerKey, Table,
};
use super::entry::Ranked;
use crate::api::{
    APIRecord, Access, Availability, BinaryInfo, ObjCContainerRecord, ObjCMethodRecord,
};
use crate::diag::{DiagParam, Diagnostic, DiagnosticKind, Diagnostics, Severity};

/// Outcome of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// No error was reported
    pub passed: bool,
    /// Number of regressions reported as errors
    pub regressions: usize,
    /// Number of new public APIs
    pub new_apis: usize,
}

struct Differ<'d> {
    target: String,
    diags: &'d mut Diagnostics,
    result: DiffResult,
}

impl Differ<'_> {
    fn report(&mut self, kind: DiagnosticKind, install_name: &str, params: Vec<DiagParam>) {
        self.report_with(kind, kind.severity(), install_name, params);
    }

    fn report_with(
        &mut self,
        kind: DiagnosticKind,
        severity: Severity,
        install_name: &str,
        params: Vec<DiagParam>,
    ) {
        match (kind, severity) {
            (DiagnosticKind::AccessRegression, Severity::Error) => self.result.regressions += 1,
            (DiagnosticKind::NewApi, _) => self.result.new_apis += 1,
            _ => {}
        }
        let diagnostic = Diagnostic::new(kind, self.target.as_str(), install_name, params)
            .with_severity(severity);
        self.diags.report(diagnostic);
    }

    /// Compares the shared fields of one declaration.
    ///
    /// `baseline_binary` decides whether a regression is an error: records
    /// from bundles and non-installed binaries only warn.
    fn compare_record(
        &mut self,
        name: &str,
        baseline: Option<&APIRecord>,
        candidate: Option<&APIRecord>,
        baseline_binary: Option<&BinaryInfo>,
        install_name: &str,
    ) {
        let regression_severity = match baseline_binary {
            Some(binary) if !binary.is_installed() => Severity::Warning,
            _ => Severity::Error,
        };

        match (baseline, candidate) {
            (Some(old), None) if old.access == Access::Public => self.report_with(
                DiagnosticKind::AccessRegression,
                regression_severity,
                install_name,
                vec![
                    DiagParam::name(name),
                    DiagParam::str(old.access.to_string()),
                    DiagParam::str("missing"),
                ],
            ),
            (None, Some(new)) if new.access == Access::Public => self.report(
                DiagnosticKind::NewApi,
                install_name,
                vec![DiagParam::name(name), DiagParam::str(new.access.to_string())],
            ),
            (Some(old), Some(new)) => {
                if old.access == Access::Public && new.access < Access::Public {
                    self.report_with(
                        DiagnosticKind::AccessRegression,
                        regression_severity,
                        install_name,
                        vec![
                            DiagParam::name(name),
                            DiagParam::str(old.access.to_string()),
                            DiagParam::str(new.access.to_string()),
                        ],
                    );
                } else if old.access < Access::Public && new.access == Access::Public {
                    self.report(
                        DiagnosticKind::NewApi,
                        install_name,
                        vec![DiagParam::name(name), DiagParam::str(new.access.to_string())],
                    );
                }

                if old.access != Access::Public {
                    return;
                }
                if old.linkage != new.linkage {
                    self.report(
                        DiagnosticKind::LinkageChanged,
                        install_name,
                        vec![
                            DiagParam::name(name),
                            DiagParam::str(old.linkage.to_string()),
                            DiagParam::str(new.linkage.to_string()),
                        ],
                    );
                }
                if old.availability != new.availability {
                    let severity = if narrows(&old.availability, &new.availability) {
                        regression_severity
                    } else {
                        Severity::Warning
                    };
                    self.report_with(
                        DiagnosticKind::AvailabilityChanged,
                        severity,
                        install_name,
                        vec![
                            DiagParam::name(name),
                            DiagParam::str(old.availability.to_string()),
                            DiagParam::str(new.availability.to_string()),
                        ],
                    );
                }
            }
            _ => {}
        }
    }

    fn compare_table<K: Ord, R: Ranked>(
        &mut self,
        baseline: (&CanonicalTarget, &Table<K, R>),
        candidate: (&CanonicalTarget, &Table<K, R>),
        display: impl Fn(&K) -> String,
        mut nested: impl FnMut(&mut Self, &K, Option<&R>, Option<&R>, Option<&BinaryInfo>, &str),
    ) {
        let (old_side, old_table) = baseline;
        let (new_side, new_table) = candidate;
        let keys: BTreeSet<&K> = old_table
            .iter()
            .map(|(k, _)| k)
            .chain(new_table.iter().map(|(k, _)| k))
            .chain(old_table.poisoned_keys())
            .chain(new_table.poisoned_keys())
            .collect();

        for key in keys {
            let old: Option<&CanonicalEntry<R>> = old_table.get(key);
            let new: Option<&CanonicalEntry<R>> = new_table.get(key);
            let old_binary = old.and_then(|e| old_side.binary(e.source));
            let new_binary = new.and_then(|e| new_side.binary(e.source));
            let install_name = old_binary
                .or(new_binary)
                .map_or("", BinaryInfo::display_name)
                .to_string();

            let name = display(key);
            // A poisoned side has no record to compare against.
            if old_table.is_poisoned(key) || new_table.is_poisoned(key) {
                self.report(
                    DiagnosticKind::ConflictingDefinition,
                    &install_name,
                    vec![DiagParam::name(name)],
                );
                continue;
            }
            self.compare_record(
                &name,
                old.map(|e| e.record.base()),
                new.map(|e| e.record.base()),
                old_binary,
                &install_name,
            );
            nested(
                self,
                key,
                old.map(|e| &e.record),
                new.map(|e| &e.record),
                old_binary,
                &install_name,
            );
        }
    }

    /// Compares the selectors of a container present on at least one side.
    fn compare_methods(
        &mut self,
        key: &ContainerKey,
        baseline: Option<&ObjCContainerRecord>,
        candidate: Option<&ObjCContainerRecord>,
        baseline_binary: Option<&BinaryInfo>,
        install_name: &str,
    ) {
        let methods = |c: Option<&ObjCContainerRecord>| -> Vec<(String, bool)> {
            c.map(|c| {
                c.methods
                    .iter()
                    .map(|m| (m.base.name.clone(), m.is_instance))
                    .collect()
            })
            .unwrap_or_default()
        };
        let selectors: BTreeSet<(String, bool)> = methods(baseline)
            .into_iter()
            .chain(methods(candidate))
            .collect();

        let find = |c: Option<&ObjCContainerRecord>, selector: &str, is_instance: bool| {
            c.and_then(|c| c.find_method(selector, is_instance))
                .map(|m: &ObjCMethodRecord| m.base.clone())
        };

        for (selector, is_instance) in selectors {
            let name = method_display_name(key, &selector, is_instance);
            let old = find(baseline, &selector, is_instance);
            let new = find(candidate, &selector, is_instance);
            self.compare_record(&name, old.as_ref(), new.as_ref(), baseline_binary, install_name);
        }
    }
}

/// Returns true if `candidate` is available in fewer deployments than
/// `baseline`.
fn narrows(baseline: &Availability, candidate: &Availability) -> bool {
    if baseline.unavailable {
        return false;
    }
    if candidate.unavailable {
        return true;
    }
    let obsoleted_earlier = !candidate.obsoleted.is_zero()
        && (baseline.obsoleted.is_zero() || candidate.obsoleted < baseline.obsoleted);
    obsoleted_earlier || candidate.introduced > baseline.introduced
}

/// Compares a baseline against a candidate, target by target.
///
/// Every difference is reported before the verdict is computed, in target
/// then key order. Records only present in one side's target are compared
/// against nothing.
pub fn diff(
    baseline: &CanonicalSdk,
    candidate: &CanonicalSdk,
    diags: &mut Diagnostics,
) -> DiffResult {
    let errors_before = diags.error_count();
    let empty = CanonicalTarget::default();
    let targets: BTreeSet<&String> = baseline
        .targets
        .keys()
        .chain(candidate.targets.keys())
        .collect();

    let mut result = DiffResult::default();
    for name in targets {
        let old = baseline.targets.get(name).unwrap_or(&empty);
        let new = candidate.targets.get(name).unwrap_or(&empty);

        let mut differ = Differ {
            target: name.clone(),
            diags: &mut *diags,
            result: DiffResult::default(),
        };

        differ.compare_table(
            (old, &old.globals),
            (new, &new.globals),
            |k| k.clone(),
            |_, _, _, _, _, _| {},
        );
        differ.compare_table(
            (old, &old.interfaces),
            (new, &new.interfaces),
            |k| k.clone(),
            |d, k, o, n, binary, install_name| {
                let key = ContainerKey::Interface(k.clone());
                if let (Some(o), Some(n)) = (o, n) {
                    if o.container.base.access == Access::Public && o.super_class != n.super_class {
                        d.report(
                            DiagnosticKind::SuperclassChanged,
                            install_name,
                            vec![
                                DiagParam::name(k.as_str()),
                                DiagParam::name(o.super_class.as_str()),
                                DiagParam::name(n.super_class.as_str()),
                            ],
                        );
                    }
                }
                d.compare_methods(
                    &key,
                    o.map(|o| &o.container),
                    n.map(|n| &n.container),
                    binary,
                    install_name,
                );
            },
        );
        differ.compare_table(
            (old, &old.categories),
            (new, &new.categories),
            |(class, name)| format!("{}({})", class, name),
            |d, (class, name), o, n, binary, install_name| {
                let key = ContainerKey::Category(class.clone(), name.clone());
                d.compare_methods(
                    &key,
                    o.map(|o| &o.container),
                    n.map(|n| &n.container),
                    binary,
                    install_name,
                );
            },
        );
        differ.compare_table(
            (old, &old.protocols),
            (new, &new.protocols),
            |k| k.clone(),
            |d, k, o, n, binary, install_name| {
                let key = ContainerKey::Protocol(k.clone());
                d.compare_methods(
                    &key,
                    o.map(|o| &o.container),
                    n.map(|n| &n.container),
                    binary,
                    install_name,
                );
            },
        );
        differ.compare_table(
            (old, &old.enums),
            (new, &new.enums),
            |k| k.clone(),
            |_, _, _, _, _, _| {},
        );
        differ.compare_table(
            (old, &old.typedefs),
            (new, &new.typedefs),
            |k| k.clone(),
            |_, _, _, _, _, _| {},
        );

        result.regressions += differ.result.regressions;
        result.new_apis += differ.result.new_apis;
    }

    result.passed = diags.error_count() == errors_before;
    info!(
        "diff: {} regressions, {} new APIs, {}",
        result.regressions,
        result.new_apis,
        if result.passed { "passed" } else { "failed" }
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BinaryType, GlobalRecord, Linkage, ObjCInterfaceRecord, PackedVersion};
    use crate::sdkdb::canonical::Source;
    use crate::sdkdb::entry::SourceId;
    use pretty_assertions::assert_eq;

    const TARGET: &str = "arm64-apple-macos14.0";

    fn sdk(file_type: BinaryType, build: impl FnOnce(&mut CanonicalTarget)) -> CanonicalSdk {
        let mut target = CanonicalTarget::new(TARGET);
        target.sources.push(Source {
            binary: Some(BinaryInfo {
                file_type,
                install_name: "/usr/lib/libFoo.dylib".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        build(&mut target);
        let mut sdk = CanonicalSdk::default();
        sdk.targets.insert(TARGET.to_string(), target);
        sdk
    }

    fn global(target: &mut CanonicalTarget, name: &str, access: Access, linkage: Linkage) {
        let mut record = GlobalRecord {
            base: APIRecord::with_linkage(name, linkage),
            ..Default::default()
        };
        record.base.access = access;
        target.globals.insert(
            name.to_string(),
            CanonicalEntry {
                record,
                source: SourceId(0),
            },
        );
    }

    fn interface(target: &mut CanonicalTarget, name: &str, super_class: &str, methods: &[&str]) {
        let mut record = ObjCInterfaceRecord::new(name);
        record.super_class = super_class.to_string();
        record.container.base.access = Access::Public;
        for selector in methods {
            let mut method = ObjCMethodRecord::new(*selector, "", true);
            method.base.access = Access::Public;
            record.container.methods.push(method);
        }
        target.interfaces.insert(
            name.to_string(),
            CanonicalEntry {
                record,
                source: SourceId(0),
            },
        );
    }

    fn available(target: &mut CanonicalTarget, name: &str, availability: Availability) {
        global(target, name, Access::Public, Linkage::Exported);
        if let Some(entry) = target.globals.get_mut(name) {
            entry.record.base.availability = availability;
        }
    }

    fn version(s: &str) -> PackedVersion {
        PackedVersion::parse(s).unwrap()
    }

    fn messages(diags: &Diagnostics) -> Vec<String> {
        diags.entries().iter().map(|d| d.message()).collect()
    }

    #[test]
    fn test_identical_passes() {
        let build = |t: &mut CanonicalTarget| {
            global(t, "foo", Access::Public, Linkage::Exported);
            interface(t, "Foo", "NSObject", &["bar"]);
        };
        let baseline = sdk(BinaryType::Dylib, build);
        let candidate = sdk(BinaryType::Dylib, build);
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(result.passed);
        assert!(diags.entries().is_empty());
    }

    #[test]
    fn test_regressions_fail() {
        let baseline = sdk(BinaryType::Dylib, |t| {
            global(t, "removed", Access::Public, Linkage::Exported);
            global(t, "hidden", Access::Public, Linkage::Exported);
            interface(t, "Foo", "NSObject", &["bar", "baz"]);
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            global(t, "added", Access::Public, Linkage::Exported);
            global(t, "hidden", Access::Private, Linkage::Exported);
            interface(t, "Foo", "NSResponder", &["bar"]);
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(!result.passed);
        assert_eq!(result.regressions, 3);
        assert_eq!(result.new_apis, 1);
        assert_eq!(
            messages(&diags),
            vec![
                "new api: \"added\" is public".to_string(),
                "api access regression: \"hidden\" was public and is now private".to_string(),
                "api access regression: \"removed\" was public and is now missing".to_string(),
                "superclass of \"Foo\" changed from \"NSObject\" to \"NSResponder\"".to_string(),
                "api access regression: \"-[Foo baz]\" was public and is now missing".to_string(),
            ]
        );
    }

    #[test]
    fn test_bundle_regression_only_warns() {
        let baseline = sdk(BinaryType::Bundle, |t| {
            global(t, "plugin_entry", Access::Public, Linkage::Exported);
        });
        let candidate = sdk(BinaryType::Bundle, |_| {});
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(result.passed);
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn test_linkage_change_fails() {
        let baseline = sdk(BinaryType::Dylib, |t| {
            global(t, "foo", Access::Public, Linkage::Exported)
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            global(t, "foo", Access::Public, Linkage::Reexported)
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(!result.passed);
        assert_eq!(
            messages(&diags),
            vec!["linkage type is not equal for \"foo\": exported and reexported".to_string()]
        );
    }

    #[test]
    fn test_more_available_only_warns() {
        let unavailable = Availability {
            unavailable: true,
            ..Default::default()
        };
        let baseline = sdk(BinaryType::Dylib, |t| {
            available(t, "revived", unavailable);
            available(
                t,
                "backported",
                Availability {
                    introduced: version("14.0"),
                    obsoleted: version("15.0"),
                    ..Default::default()
                },
            );
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            available(t, "revived", Availability::default());
            available(
                t,
                "backported",
                Availability {
                    introduced: version("13.0"),
                    ..Default::default()
                },
            );
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(result.passed);
        assert_eq!(diags.warning_count(), 2);
        assert_eq!(
            messages(&diags),
            vec![
                "availability changed for \"backported\": introduced=14.0 obsoleted=15.0 and introduced=13.0"
                    .to_string(),
                "availability changed for \"revived\": unavailable and introduced=0.0".to_string(),
            ]
        );
    }

    #[test]
    fn test_less_available_fails() {
        let baseline = sdk(BinaryType::Dylib, |t| {
            available(t, "dropped", Availability::default());
            available(t, "obsoleted", Availability::default());
            available(
                t,
                "sooner",
                Availability {
                    obsoleted: version("16.0"),
                    ..Default::default()
                },
            );
            available(
                t,
                "later",
                Availability {
                    introduced: version("13.0"),
                    ..Default::default()
                },
            );
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            available(
                t,
                "dropped",
                Availability {
                    unavailable: true,
                    ..Default::default()
                },
            );
            available(
                t,
                "obsoleted",
                Availability {
                    obsoleted: version("15.0"),
                    ..Default::default()
                },
            );
            available(
                t,
                "sooner",
                Availability {
                    obsoleted: version("15.0"),
                    ..Default::default()
                },
            );
            available(
                t,
                "later",
                Availability {
                    introduced: version("14.0"),
                    ..Default::default()
                },
            );
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(!result.passed);
        assert_eq!(diags.error_count(), 4);
        assert_eq!(diags.of_kind(DiagnosticKind::AvailabilityChanged).count(), 4);
    }

    #[test]
    fn test_poisoned_candidate_is_not_missing() {
        let baseline = sdk(BinaryType::Dylib, |t| {
            global(t, "shared", Access::Public, Linkage::Exported);
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            t.globals.poison("shared".to_string());
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(result.passed);
        assert_eq!(result.regressions, 0);
        assert_eq!(
            messages(&diags),
            vec!["\"shared\" has conflicting definitions and is ignored".to_string()]
        );
        assert_eq!(diags.entries()[0].install_name, "/usr/lib/libFoo.dylib");
    }

    #[test]
    fn test_poisoned_baseline_is_not_new() {
        let baseline = sdk(BinaryType::Dylib, |t| {
            t.globals.poison("shared".to_string());
        });
        let candidate = sdk(BinaryType::Dylib, |t| {
            global(t, "shared", Access::Public, Linkage::Exported);
        });
        let mut diags = Diagnostics::new();

        let result = diff(&baseline, &candidate, &mut diags);
        assert!(result.passed);
        assert_eq!(result.new_apis, 0);
        assert_eq!(diags.of_kind(DiagnosticKind::ConflictingDefinition).count(), 1);
    }
}
