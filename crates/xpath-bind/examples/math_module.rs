use std::sync::Arc;

use platynui_xpath_bind::simple_node::{doc, elem, text};
use platynui_xpath_bind::{
    Batch, BindError, CallCtx, DependencyProviders, ExpandedName, ExtensionModule,
    ExtensionRegistry, FunctionAttributes, ItemFactory, Loader, LoaderOptions, ModuleDescriptor,
    ModuleRegistry, NamespaceBindings, Node, ProcessorInfo, QName, SimpleItemFactory, SimpleNode,
    XdmAtomicValue, XdmItem, XdmNode,
};

#[derive(Default)]
struct Math;

impl ExtensionModule<SimpleNode> for Math {
    fn describe() -> Result<ModuleDescriptor<Self, SimpleNode>, BindError> {
        ModuleDescriptor::builder("math")
            .static_module()
            .function("sqrt", |x: f64| x.sqrt())
            .function("round", |x: f64| x.round())
            .function("round", |x: f64, digits: u8| {
                let f = 10_f64.powi(i32::from(digits));
                (x * f).round() / f
            })
            .build()
    }
}

#[derive(Default)]
struct Report {
    factory: Option<Arc<dyn ItemFactory<SimpleNode>>>,
}

impl ExtensionModule<SimpleNode> for Report {
    fn describe() -> Result<ModuleDescriptor<Self, SimpleNode>, BindError> {
        ModuleDescriptor::builder("report")
            .namespace("urn:example:report")
            .dependency::<Arc<dyn ItemFactory<SimpleNode>>, _>("factory", |m: &mut Report, f| {
                m.factory = Some(f);
            })
            .method_with(
                "entry",
                FunctionAttributes::new()
                    .returns("element(entry)?")
                    .param_name(0, "node"),
                |m: &Report, n: Node<SimpleNode>| match &m.factory {
                    Some(f) => f
                        .element(&QName::local("entry"), &[], Some(&n.string_value()))
                        .map(|e| Some(Node(e))),
                    None => Ok(None),
                },
            )
            .build()
    }
}

fn main() {
    let registry = ModuleRegistry::new();
    let batch = Batch::new()
        .add::<Math>(&registry)
        .unwrap()
        .add::<Report>(&registry)
        .unwrap();
    let loaded = Loader::new(LoaderOptions::from_env()).compile(batch).unwrap();
    for (module, function) in loaded.functions() {
        println!("{module}: {function}");
    }

    let providers = DependencyProviders::new()
        .with_processor(Arc::new(ProcessorInfo::new("platynui-xpath", "0.12")))
        .with_item_factory(Arc::new(SimpleItemFactory));
    let mut engine = ExtensionRegistry::new();
    loaded.register(&mut engine, &providers);

    let ns = NamespaceBindings::with_builtins();
    let ctx = CallCtx::new(&ns);
    let round = ExpandedName::ns("urn:platynui:ext:math", "round");
    let result = engine.invoke(
        &round,
        &ctx,
        &[
            vec![XdmItem::Atomic(XdmAtomicValue::Double(1.23456))],
            vec![XdmItem::Atomic(XdmAtomicValue::Integer(2))],
        ],
    );
    println!("math:round(1.23456, 2) = {result:?}");

    let d = doc().child(elem("cell").child(text("42"))).build();
    let entry = ExpandedName::ns("urn:example:report", "entry");
    let result = engine.invoke(&entry, &ctx, &[vec![XdmItem::Node(d.children()[0].clone())]]);
    println!("report:entry(<cell>42</cell>) = {result:?}");
}
