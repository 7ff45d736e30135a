use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use platynui_xpath_bind::dependency::initialize;
use platynui_xpath_bind::{
    BindError, CallCtx, DependencyProviders, Error, ErrorCode, ExtensionFunction, ItemFactory,
    ModuleDescriptor, ModuleInstance, NamespaceBindings, Node, NodeKind, Processor, ProcessorInfo,
    ProviderKind, QName, SimpleItemFactory, SimpleNode, XdmAtomicValue, XdmItem, XdmNode,
    XdmSequence,
};
use rstest::{fixture, rstest};

/// Value no provider offers.
#[derive(Debug, Clone)]
struct Clock(u64);

#[derive(Default)]
struct Builder {
    factory: Option<Arc<dyn ItemFactory<SimpleNode>>>,
    processor: Option<Arc<dyn Processor>>,
    clock: Option<Arc<Clock>>,
    calls: AtomicUsize,
}

impl Builder {
    fn make(&self, name: String) -> Result<Option<Node<SimpleNode>>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.factory {
            Some(f) => f.element(&QName::local(name), &[], None).map(|n| Some(Node(n))),
            None => Ok(None),
        }
    }
}

#[fixture]
fn builder() -> ModuleDescriptor<Builder, SimpleNode> {
    ModuleDescriptor::builder("builder")
        .dependency::<Arc<dyn ItemFactory<SimpleNode>>, _>("factory", |m: &mut Builder, f| {
            m.factory = Some(f);
        })
        .dependency::<Arc<dyn Processor>, _>("processor", |m: &mut Builder, p| {
            m.processor = Some(p);
        })
        .dependency::<Arc<Clock>, _>("clock", |m: &mut Builder, c| m.clock = Some(c))
        .method("make", Builder::make)
        .method("processor", |m: &Builder| {
            m.processor
                .as_ref()
                .map(|p| format!("{} {}", p.name(), p.version()))
        })
        .method("ticks", |m: &Builder| m.clock.as_ref().map_or(0, |c| c.0))
        .method("calls", |m: &Builder| m.calls.load(Ordering::SeqCst) as u64)
        .build()
        .unwrap()
}

fn full_providers() -> DependencyProviders<SimpleNode> {
    DependencyProviders::new()
        .with_processor(Arc::new(ProcessorInfo::new("platynui", "1.0")))
        .with_item_factory(Arc::new(SimpleItemFactory))
}

fn string(v: &str) -> XdmSequence<SimpleNode> {
    vec![XdmItem::Atomic(XdmAtomicValue::String(v.into()))]
}

fn lookup<'a>(
    functions: &'a [Arc<dyn ExtensionFunction<SimpleNode>>],
    local: &str,
) -> &'a Arc<dyn ExtensionFunction<SimpleNode>> {
    functions.iter().find(|f| f.name().local == local).unwrap()
}

fn instantiate(
    module: ModuleDescriptor<Builder, SimpleNode>,
    providers: &DependencyProviders<SimpleNode>,
) -> Vec<Arc<dyn ExtensionFunction<SimpleNode>>> {
    let batch = platynui_xpath_bind::Batch::new()
        .add_module(Arc::new(module))
        .unwrap();
    platynui_xpath_bind::Loader::default()
        .compile(batch)
        .unwrap()
        .instantiate(providers)
}

#[rstest]
fn item_factory_is_injected(builder: ModuleDescriptor<Builder, SimpleNode>) {
    let functions = instantiate(builder, &full_providers());
    let ns = NamespaceBindings::with_builtins();
    let ctx = CallCtx::new(&ns);

    let out = lookup(&functions, "make").call(&ctx, &[string("item")]).unwrap();
    let [XdmItem::Node(n)] = out.as_slice() else {
        panic!("expected one node, got {out:?}");
    };
    // the factory's document wrapper is kept for an untyped node result
    assert_eq!(n.kind(), NodeKind::Document);
    assert_eq!(n.children()[0].name().unwrap().local, "item");

    let out = lookup(&functions, "processor").call(&ctx, &[]).unwrap();
    assert_eq!(out, string("platynui 1.0"));
}

#[rstest]
fn unmatched_dependencies_keep_defaults(builder: ModuleDescriptor<Builder, SimpleNode>) {
    let functions = instantiate(builder, &DependencyProviders::new());
    let ns = NamespaceBindings::with_builtins();
    let ctx = CallCtx::new(&ns);

    assert!(lookup(&functions, "make").call(&ctx, &[string("x")]).unwrap().is_empty());
    assert!(lookup(&functions, "processor").call(&ctx, &[]).unwrap().is_empty());
    assert_eq!(
        lookup(&functions, "ticks").call(&ctx, &[]).unwrap(),
        vec![XdmItem::Atomic(XdmAtomicValue::UnsignedLong(0))]
    );
}

#[rstest]
fn initialize_reports_first_matching_provider(builder: ModuleDescriptor<Builder, SimpleNode>) {
    let mut instance = Builder::default();
    let report = initialize(
        builder.name(),
        &mut instance,
        builder.dependencies(),
        &full_providers(),
    );
    assert_eq!(
        report.injected,
        vec![
            ("factory".to_string(), ProviderKind::ItemFactory),
            ("processor".to_string(), ProviderKind::Processor),
        ]
    );
    assert_eq!(report.skipped, vec!["clock".to_string()]);
    assert!(instance.factory.is_some());
    assert!(instance.processor.is_some());
    assert!(instance.clock.is_none());
}

#[rstest]
fn instance_is_created_on_first_use(builder: ModuleDescriptor<Builder, SimpleNode>) {
    let instance = ModuleInstance::new(Arc::new(builder), full_providers());
    assert!(!instance.is_initialized());
    assert!(instance.report().is_none());

    assert!(instance.get().factory.is_some());
    assert!(instance.is_initialized());
    assert_eq!(instance.report().unwrap().injected.len(), 2);
}

#[rstest]
fn instantiations_do_not_share_state(builder: ModuleDescriptor<Builder, SimpleNode>) {
    let batch = platynui_xpath_bind::Batch::new()
        .add_module(Arc::new(builder))
        .unwrap();
    let loaded = platynui_xpath_bind::Loader::default().compile(batch).unwrap();
    let ns = NamespaceBindings::with_builtins();
    let ctx = CallCtx::new(&ns);
    let calls = |functions: &[Arc<dyn ExtensionFunction<SimpleNode>>]| {
        lookup(functions, "calls").call(&ctx, &[]).unwrap()
    };

    let first = loaded.instantiate(&full_providers());
    lookup(&first, "make").call(&ctx, &[string("a")]).unwrap();
    lookup(&first, "make").call(&ctx, &[string("b")]).unwrap();
    assert_eq!(calls(&first), vec![XdmItem::Atomic(XdmAtomicValue::UnsignedLong(2))]);

    let second = loaded.instantiate(&full_providers());
    assert_eq!(calls(&second), vec![XdmItem::Atomic(XdmAtomicValue::UnsignedLong(0))]);
}

#[derive(Default)]
struct Pure;

#[test]
fn static_modules_reject_dependencies() {
    let err = ModuleDescriptor::<Pure, SimpleNode>::builder("pure")
        .static_module()
        .dependency::<Arc<dyn Processor>, _>("processor", |_: &mut Pure, _| {})
        .function("one", || 1_i32)
        .build()
        .unwrap_err();
    assert!(matches!(err, BindError::Signature { ref function, .. } if function == "processor"), "{err}");
}

#[test]
fn static_modules_reject_methods() {
    let err = ModuleDescriptor::<Pure, SimpleNode>::builder("pure")
        .static_module()
        .method("one", |_: &Pure| 1_i32)
        .build()
        .unwrap_err();
    assert!(matches!(err, BindError::Signature { .. }), "{err}");
    assert_eq!(err.module(), "pure");
}

#[test]
fn native_error_codes_reach_the_caller() {
    #[derive(Default)]
    struct Failing;
    let module = ModuleDescriptor::<Failing, SimpleNode>::builder("failing")
        .method("boom", |_: &Failing| -> Result<(), Error> {
            Err(Error::from_code(ErrorCode::FOER0000, "boom"))
        })
        .build()
        .unwrap();
    let batch = platynui_xpath_bind::Batch::new()
        .add_module(Arc::new(module))
        .unwrap();
    let functions = platynui_xpath_bind::Loader::default()
        .compile(batch)
        .unwrap()
        .instantiate(&DependencyProviders::new());
    let ns = NamespaceBindings::with_builtins();
    let err = functions[0].call(&CallCtx::new(&ns), &[]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOER0000);
}
