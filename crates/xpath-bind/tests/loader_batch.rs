use std::sync::Arc;

use chrono::NaiveDate;
use platynui_xpath_bind::consts::FNS;
use platynui_xpath_bind::{
    Batch, BindError, DependencyProviders, ExpandedName, ExtensionModule, ExtensionRegistry,
    Loader, LoaderOptions, ModuleDescriptor, ModuleRegistry, Severity, SimpleNode,
};
use rstest::rstest;

#[derive(Default)]
struct Math;

impl ExtensionModule<SimpleNode> for Math {
    fn describe() -> Result<ModuleDescriptor<Self, SimpleNode>, BindError> {
        ModuleDescriptor::builder("math")
            .static_module()
            .function("sqrt", |x: f64| x.sqrt())
            .function("abs", |x: f64| x.abs())
            .build()
    }
}

#[derive(Default)]
struct Calendar;

impl ExtensionModule<SimpleNode> for Calendar {
    fn describe() -> Result<ModuleDescriptor<Self, SimpleNode>, BindError> {
        ModuleDescriptor::builder("calendar")
            .static_module()
            .function("next-day", |d: NaiveDate| d.succ_opt())
            .function("label", |s: String| s)
            .build()
    }
}

#[derive(Default)]
struct Other;

fn module<M: Default + Send + Sync + 'static>(
    builder: platynui_xpath_bind::ModuleBuilder<M, SimpleNode>,
) -> Arc<ModuleDescriptor<M, SimpleNode>> {
    Arc::new(builder.build().unwrap())
}

fn compile_err(batch: Batch<SimpleNode>, options: LoaderOptions) -> BindError {
    match Loader::new(options).compile(batch) {
        Ok(_) => panic!("batch compiled unexpectedly"),
        Err(e) => e,
    }
}

#[test]
fn functions_are_emitted_in_registration_order() {
    let registry = ModuleRegistry::new();
    let batch = Batch::new()
        .add::<Math>(&registry)
        .unwrap()
        .add::<Calendar>(&registry)
        .unwrap();
    assert_eq!(batch.len(), 2);
    let loaded = Loader::default().compile(batch).unwrap();

    let emitted: Vec<(&str, &str)> = loaded
        .functions()
        .iter()
        .map(|(m, f)| (m.as_str(), f.local.as_str()))
        .collect();
    assert_eq!(
        emitted,
        [
            ("math", "sqrt"),
            ("math", "abs"),
            ("calendar", "next-day"),
            ("calendar", "label")
        ]
    );
    assert!(loaded.diagnostics().is_empty());

    let mut engine = ExtensionRegistry::new();
    assert_eq!(loaded.register(&mut engine, &DependencyProviders::new()), 4);
    assert!(engine.contains(&ExpandedName::ns("urn:platynui:ext:calendar", "next-day")));
}

#[test]
fn references_cover_every_used_crate() {
    let registry = ModuleRegistry::new();
    let batch = Batch::new()
        .add::<Math>(&registry)
        .unwrap()
        .add::<Calendar>(&registry)
        .unwrap();
    let loaded = Loader::default().compile(batch).unwrap();
    let refs = loaded.references();
    for expected in ["platynui_xpath_bind", "loader_batch", "chrono", "alloc", "core"] {
        assert!(refs.contains(&expected), "{expected} missing from {refs:?}");
    }
    let mut sorted = refs.to_vec();
    sorted.dedup();
    assert_eq!(sorted.len(), refs.len());
}

#[test]
fn duplicate_identity_fails_the_whole_batch() {
    let a = module(
        ModuleDescriptor::<Math, SimpleNode>::builder("a")
            .namespace("urn:shared")
            .static_module()
            .function("f", |x: i32| x),
    );
    let b = module(
        ModuleDescriptor::<Other, SimpleNode>::builder("b")
            .namespace("urn:shared")
            .static_module()
            .function("f", |x: String| x),
    );
    let batch = Batch::new().add_module(a).unwrap().add_module(b).unwrap();
    let err = compile_err(batch, LoaderOptions::default());
    let BindError::Compilation {
        module,
        function,
        diagnostic,
        ..
    } = err
    else {
        panic!("expected a compilation error, got {err}");
    };
    assert_eq!(module, "b");
    assert_eq!(function, "Q{urn:shared}f");
    assert!(diagnostic.contains("'a'"), "{diagnostic}");
}

#[test]
fn reserved_namespaces_are_rejected() {
    let m = module(
        ModuleDescriptor::<Math, SimpleNode>::builder("rogue")
            .namespace(FNS)
            .static_module()
            .function("count", |x: i32| x),
    );
    let err = compile_err(Batch::new().add_module(m).unwrap(), LoaderOptions::default());
    let BindError::Compilation { diagnostic, dump, .. } = &err else {
        panic!("expected a compilation error, got {err}");
    };
    assert!(diagnostic.contains("reserved"), "{diagnostic}");
    assert!(dump.as_deref().is_some_and(|d| d.contains("module rogue")));
}

fn gapped() -> Arc<ModuleDescriptor<Math, SimpleNode>> {
    module(
        ModuleDescriptor::<Math, SimpleNode>::builder("gapped")
            .static_module()
            .function("pick", |a: i32| a)
            .function("pick", |a: String, _b: i32, _c: i32| a),
    )
}

#[test]
fn gaps_and_positional_differences_are_warnings() {
    let loaded = Loader::default()
        .compile(Batch::new().add_module(gapped()).unwrap())
        .unwrap();
    let messages: Vec<&str> = loaded
        .diagnostics()
        .iter()
        .inspect(|d| assert_eq!(d.severity, Severity::Warning))
        .map(|d| d.message.as_str())
        .collect();
    assert!(messages.iter().any(|m| m.contains("arities [2]")), "{messages:?}");
    assert!(
        messages.iter().any(|m| m.starts_with("parameter 1 of #1 is xs:int")),
        "{messages:?}"
    );
}

#[test]
fn warnings_fail_when_requested() {
    let err = compile_err(
        Batch::new().add_module(gapped()).unwrap(),
        LoaderOptions::new().with_fail_on_warnings(true),
    );
    assert!(matches!(err, BindError::Compilation { .. }), "{err}");
    assert_eq!(err.module(), "gapped");
}

#[test]
fn dispatch_plans_are_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let options = LoaderOptions::new().with_dump_dir(dir.path().join("plans"));
    let registry = ModuleRegistry::new();
    Loader::new(options)
        .compile(Batch::new().add::<Math>(&registry).unwrap())
        .unwrap();

    let plan = std::fs::read_to_string(dir.path().join("plans").join("math.plan.txt")).unwrap();
    assert!(plan.starts_with("module math"), "{plan}");
    assert!(plan.contains("Q{urn:platynui:ext:math}sqrt [1..=1]"), "{plan}");
    assert!(plan.contains("#1: (f64 <- xs:double) -> f64 as xs:double"), "{plan}");
}

#[test]
fn failed_batches_are_dumped_too() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile_err(
        Batch::new().add_module(gapped()).unwrap(),
        LoaderOptions::new()
            .with_dump_dir(dir.path())
            .with_fail_on_warnings(true),
    );
    assert!(matches!(err, BindError::Compilation { .. }));
    assert!(dir.path().join("gapped.plan.txt").exists());
}

#[rstest]
#[case("{}", LoaderOptions::default())]
#[case(r#"{"fail_on_warnings": true}"#, LoaderOptions::new().with_fail_on_warnings(true))]
#[case(
    r#"{"dump_dir": "/tmp/plans", "fail_on_warnings": false}"#,
    LoaderOptions::new().with_dump_dir("/tmp/plans")
)]
fn options_from_json(#[case] json: &str, #[case] expected: LoaderOptions) {
    assert_eq!(LoaderOptions::from_json(json).unwrap(), expected);
}

#[test]
fn malformed_options_are_rejected() {
    assert!(LoaderOptions::from_json(r#"{"fail_on_warnings": "yes"}"#).is_err());
}

#[test]
fn options_from_env_never_fail_on_warnings() {
    assert!(!LoaderOptions::from_env().fail_on_warnings);
}

#[test]
fn registry_caches_descriptors() {
    let registry = ModuleRegistry::new();
    assert!(registry.is_empty());
    let a = registry.describe::<Math, SimpleNode>().unwrap();
    let b = registry.describe::<Math, SimpleNode>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 1);
    assert!(registry.get::<Calendar, SimpleNode>().is_none());

    registry.describe::<Calendar, SimpleNode>().unwrap();
    assert!(registry.remove::<Math, SimpleNode>());
    assert!(!registry.remove::<Math, SimpleNode>());
    registry.clear();
    assert!(registry.is_empty());
}
