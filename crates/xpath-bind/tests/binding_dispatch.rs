use std::sync::Arc;

use platynui_xpath_bind::simple_node::{doc, elem, text};
use platynui_xpath_bind::{
    AdapterUnit, DependencyProviders, Error, ErrorCode, ExtensionFunction, FunctionAttributes,
    ItemFactory, ModuleDescriptor, NamespaceBindings, NodeKind, Node, QName, SequenceType,
    SimpleItemFactory, SimpleNode, XdmAtomicValue, XdmItem, XdmNode, XdmSequence, generate,
};
use rstest::{fixture, rstest};

type Unit<M> = AdapterUnit<M, SimpleNode>;

fn dbl(v: f64) -> XdmSequence<SimpleNode> {
    vec![XdmItem::Atomic(XdmAtomicValue::Double(v))]
}

fn int(v: i32) -> XdmSequence<SimpleNode> {
    vec![XdmItem::Atomic(XdmAtomicValue::Int(v))]
}

fn string(v: &str) -> XdmSequence<SimpleNode> {
    vec![XdmItem::Atomic(XdmAtomicValue::String(v.into()))]
}

fn units<M: Default + Send + Sync + 'static>(
    module: &ModuleDescriptor<M, SimpleNode>,
) -> Vec<Unit<M>> {
    generate(module).unwrap()
}

fn unit<'a, M>(units: &'a [Unit<M>], local: &str) -> &'a Unit<M> {
    units.iter().find(|u| u.identity.local == local).unwrap()
}

#[derive(Default)]
struct Math;

#[fixture]
fn math() -> ModuleDescriptor<Math, SimpleNode> {
    ModuleDescriptor::builder("math")
        .static_module()
        .function("sqrt", |x: f64| x.sqrt())
        .function("sum", |xs: Vec<f64>| xs.iter().sum::<f64>())
        .function("range", |n: u32| (1..=n).collect::<Vec<u32>>())
        .function_with("inc", FunctionAttributes::new().param(0, "xs:int?"), |a: i32| a + 1)
        .function("label", |v: Option<String>| v.unwrap_or_else(|| "none".into()))
        .function("checked-div", |a: i64, b: i64| {
            if b == 0 {
                Err(Error::from_code(ErrorCode::FOER0000, "division by zero"))
            } else {
                Ok(a / b)
            }
        })
        .build()
        .unwrap()
}

#[rstest]
fn single_function_unit(math: ModuleDescriptor<Math, SimpleNode>) {
    let units = units(&math);
    let sqrt = unit(&units, "sqrt");
    assert_eq!(sqrt.identity.ns_uri.as_deref(), Some("urn:platynui:ext:math"));
    assert_eq!((sqrt.min_arity, sqrt.max_arity), (1, 1));
    let declared: Vec<String> = sqrt.argument_types.iter().map(ToString::to_string).collect();
    assert_eq!(declared, ["xs:double"]);
    let actual = sqrt.argument_types.clone();
    assert_eq!(sqrt.result_type(&actual).unwrap().to_string(), "xs:double");
    assert!(!sqrt.has_side_effects);

    let ns = NamespaceBindings::with_builtins();
    let out = sqrt.invoke(&Math, &ns, &[dbl(9.0)]).unwrap();
    assert_eq!(out, dbl(3.0));
}

#[rstest]
fn sequences_cross_as_vec(math: ModuleDescriptor<Math, SimpleNode>) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let args = vec![
        XdmItem::Atomic(XdmAtomicValue::Double(1.0)),
        XdmItem::Atomic(XdmAtomicValue::Integer(2)),
        XdmItem::Atomic(XdmAtomicValue::UntypedAtomic("3".into())),
    ];
    let out = unit(&units, "sum").invoke(&Math, &ns, &[args]).unwrap();
    assert_eq!(out, dbl(6.0));

    let out = unit(&units, "sum").invoke(&Math, &ns, &[vec![]]).unwrap();
    assert_eq!(out, dbl(0.0));

    let out = unit(&units, "range")
        .invoke(&Math, &ns, &[vec![XdmItem::Atomic(XdmAtomicValue::Integer(3))]])
        .unwrap();
    let values: Vec<XdmAtomicValue> = out
        .into_iter()
        .map(|i| match i {
            XdmItem::Atomic(a) => a,
            XdmItem::Node(n) => panic!("unexpected node {n:?}"),
        })
        .collect();
    assert_eq!(
        values,
        [1, 2, 3].map(XdmAtomicValue::UnsignedInt).to_vec()
    );
}

#[rstest]
fn optional_parameter_falls_back_to_default(math: ModuleDescriptor<Math, SimpleNode>) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let inc = unit(&units, "inc");
    assert_eq!(inc.argument_types[0].to_string(), "xs:int?");
    assert_eq!(inc.invoke(&Math, &ns, &[vec![]]).unwrap(), int(1));
    assert_eq!(inc.invoke(&Math, &ns, &[int(41)]).unwrap(), int(42));

    let label = unit(&units, "label");
    assert_eq!(label.invoke(&Math, &ns, &[vec![]]).unwrap(), string("none"));
    assert_eq!(label.invoke(&Math, &ns, &[string("x")]).unwrap(), string("x"));
}

#[rstest]
#[case::empty_for_exactly_one(vec![])]
#[case::two_for_exactly_one(vec![
    XdmItem::Atomic(XdmAtomicValue::Double(1.0)),
    XdmItem::Atomic(XdmAtomicValue::Double(2.0)),
])]
fn cardinality_violations_raise_type_errors(
    math: ModuleDescriptor<Math, SimpleNode>,
    #[case] arg: XdmSequence<SimpleNode>,
) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let err = unit(&units, "sqrt").invoke(&Math, &ns, &[arg]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    assert!(err.message.contains("sqrt#1 argument 1"), "{}", err.message);
}

#[rstest]
#[case::not_a_number(string("abc"), ErrorCode::FORG0001)]
#[case::not_castable(
    vec![XdmItem::Atomic(XdmAtomicValue::Date {
        date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        tz: None,
    })],
    ErrorCode::XPTY0004
)]
fn conversion_failures_keep_their_code(
    math: ModuleDescriptor<Math, SimpleNode>,
    #[case] arg: XdmSequence<SimpleNode>,
    #[case] code: ErrorCode,
) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let err = unit(&units, "sqrt").invoke(&Math, &ns, &[arg]).unwrap_err();
    assert_eq!(err.code_enum(), code, "{err}");
}

#[rstest]
fn native_errors_surface_with_context(math: ModuleDescriptor<Math, SimpleNode>) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let div = unit(&units, "checked-div");
    assert_eq!(
        div.invoke(&Math, &ns, &[vec![XdmAtomicValue::Integer(7).into()], vec![
            XdmAtomicValue::Integer(2).into()
        ]])
        .unwrap(),
        vec![XdmItem::Atomic(XdmAtomicValue::Long(3))]
    );
    let err = div
        .invoke(&Math, &ns, &[vec![XdmAtomicValue::Integer(1).into()], vec![
            XdmAtomicValue::Integer(0).into(),
        ]])
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOER0000);
    assert!(err.message.starts_with("Q{urn:platynui:ext:math}checked-div#2"), "{}", err.message);
}

#[rstest]
fn atomization_of_node_arguments(math: ModuleDescriptor<Math, SimpleNode>) {
    let units = units(&math);
    let ns = NamespaceBindings::with_builtins();
    let d = doc().child(elem("v").child(text("16"))).build();
    let value = d.children()[0].clone();
    let out = unit(&units, "sqrt")
        .invoke(&Math, &ns, &[vec![XdmItem::Node(value)]])
        .unwrap();
    assert_eq!(out, dbl(4.0));
}

#[derive(Default)]
struct Tree;

fn first_element(n: &SimpleNode, name: Option<&str>) -> Option<Node<SimpleNode>> {
    n.children()
        .into_iter()
        .filter(|c| c.kind() == NodeKind::Element)
        .find(|c| name.is_none_or(|want| c.name().is_some_and(|q| q.local == want)))
        .map(Node)
}

#[fixture]
fn tree() -> ModuleDescriptor<Tree, SimpleNode> {
    ModuleDescriptor::builder("tree")
        .static_module()
        .function("find", |n: Node<SimpleNode>| first_element(&n, None))
        .function("find", |n: Node<SimpleNode>, name: String| {
            first_element(&n, Some(&name))
        })
        .function_with(
            "make",
            FunctionAttributes::new().returns("element(item)"),
            |v: String| {
                SimpleItemFactory
                    .element(&QName::local("item"), &[], Some(&v))
                    .map(Node)
            },
        )
        .function_with(
            "make-doc",
            FunctionAttributes::new().returns("document-node()"),
            |v: String| {
                SimpleItemFactory
                    .element(&QName::local("item"), &[], Some(&v))
                    .map(Node)
            },
        )
        .function("local", |q: QName| q.local)
        .build()
        .unwrap()
}

#[rstest]
fn overloads_dispatch_on_argument_count(tree: ModuleDescriptor<Tree, SimpleNode>) {
    let units = units(&tree);
    let ns = NamespaceBindings::with_builtins();
    let d = doc()
        .child(elem("root").child(elem("a")).child(elem("b")))
        .build();
    let root = d.children()[0].clone();
    let find = unit(&units, "find");
    assert_eq!((find.min_arity, find.max_arity), (1, 2));

    let out = find.invoke(&Tree, &ns, &[vec![XdmItem::Node(root.clone())]]).unwrap();
    let [XdmItem::Node(a)] = out.as_slice() else {
        panic!("expected one node, got {out:?}");
    };
    assert_eq!(a.name().unwrap().local, "a");

    let out = find
        .invoke(&Tree, &ns, &[vec![XdmItem::Node(root.clone())], string("b")])
        .unwrap();
    let [XdmItem::Node(b)] = out.as_slice() else {
        panic!("expected one node, got {out:?}");
    };
    assert_eq!(b.name().unwrap().local, "b");

    let out = find
        .invoke(&Tree, &ns, &[vec![XdmItem::Node(root)], string("zzz")])
        .unwrap();
    assert!(out.is_empty());

    let err = find.invoke(&Tree, &ns, &[]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
}

#[rstest]
fn atomic_argument_for_node_parameter_is_rejected(tree: ModuleDescriptor<Tree, SimpleNode>) {
    let units = units(&tree);
    let ns = NamespaceBindings::with_builtins();
    let err = unit(&units, "find").invoke(&Tree, &ns, &[string("x")]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn constructed_documents_are_unwrapped_for_element_results(
    tree: ModuleDescriptor<Tree, SimpleNode>,
) {
    let units = units(&tree);
    let ns = NamespaceBindings::with_builtins();
    let out = unit(&units, "make").invoke(&Tree, &ns, &[string("v")]).unwrap();
    let [XdmItem::Node(e)] = out.as_slice() else {
        panic!("expected one node, got {out:?}");
    };
    assert_eq!(e.kind(), NodeKind::Element);
    assert_eq!(e.string_value(), "v");

    let out = unit(&units, "make-doc").invoke(&Tree, &ns, &[string("v")]).unwrap();
    let [XdmItem::Node(d)] = out.as_slice() else {
        panic!("expected one node, got {out:?}");
    };
    assert_eq!(d.kind(), NodeKind::Document);
}

#[rstest]
fn qname_arguments_resolve_against_call_namespaces(tree: ModuleDescriptor<Tree, SimpleNode>) {
    let units = units(&tree);
    let local = unit(&units, "local");
    let mut ns = NamespaceBindings::with_builtins();
    ns.bind("p", "urn:p");
    assert_eq!(local.invoke(&Tree, &ns, &[string("p:thing")]).unwrap(), string("thing"));

    let err = local.invoke(&Tree, &ns, &[string("q:thing")]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FONS0004);
}

#[derive(Default)]
struct Sink {
    total: std::sync::atomic::AtomicI32,
}

#[fixture]
fn sink() -> ModuleDescriptor<Sink, SimpleNode> {
    use std::sync::atomic::Ordering;
    ModuleDescriptor::builder("sink")
        .method_with(
            "add",
            FunctionAttributes::new().side_effects(true),
            |m: &Sink, a: i32| {
                m.total.fetch_add(a, Ordering::SeqCst);
            },
        )
        .method("add", |_: &Sink, a: i32, b: i32| a + b)
        .method("total", |m: &Sink| m.total.load(Ordering::SeqCst))
        .method("gap", |_: &Sink, a: i32| a)
        .method("gap", |_: &Sink, a: i32, _b: i32, _c: i32| a)
        .build()
        .unwrap()
}

#[rstest]
fn void_overload_reports_optional_item(sink: ModuleDescriptor<Sink, SimpleNode>) {
    let units = units(&sink);
    let add = unit(&units, "add");
    let one = vec![add.argument_types[0].clone()];
    let two = add.argument_types.clone();
    assert_eq!(add.result_type(&one).unwrap().to_string(), "item()?");
    assert_eq!(add.result_type(&two).unwrap().to_string(), "xs:int");
    assert!(add.has_side_effects, "side effects of any overload apply to the unit");
    assert!(!unit(&units, "total").has_side_effects);
}

#[rstest]
fn methods_share_one_instance(sink: ModuleDescriptor<Sink, SimpleNode>) {
    let functions = bind(sink);
    let ns = NamespaceBindings::with_builtins();
    let ctx = platynui_xpath_bind::CallCtx::new(&ns);
    let add = functions.iter().find(|f| f.name().local == "add").unwrap();
    let total = functions.iter().find(|f| f.name().local == "total").unwrap();

    assert!(add.call(&ctx, &[int(5)]).unwrap().is_empty());
    assert!(add.call(&ctx, &[int(7)]).unwrap().is_empty());
    assert_eq!(add.call(&ctx, &[int(1), int(2)]).unwrap(), int(3));
    assert_eq!(total.call(&ctx, &[]).unwrap(), int(12));
}

#[rstest]
fn gap_arities_are_not_dispatched(sink: ModuleDescriptor<Sink, SimpleNode>) {
    let units = units(&sink);
    let ns = NamespaceBindings::with_builtins();
    let gap = unit(&units, "gap");
    assert_eq!((gap.min_arity, gap.max_arity), (1, 3));
    assert!(gap.result_types[1].is_none());

    let two: Vec<SequenceType> = gap.argument_types[..2].to_vec();
    let err = gap.result_type(&two).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);

    let err = gap.invoke(&Sink::default(), &ns, &[int(1), int(2)]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    assert_eq!(
        gap.invoke(&Sink::default(), &ns, &[int(1), int(2), int(3)]).unwrap(),
        int(1)
    );
}

fn bind(
    module: ModuleDescriptor<Sink, SimpleNode>,
) -> Vec<Arc<dyn ExtensionFunction<SimpleNode>>> {
    let batch = platynui_xpath_bind::Batch::new()
        .add_module(Arc::new(module))
        .unwrap();
    platynui_xpath_bind::Loader::default()
        .compile(batch)
        .unwrap()
        .instantiate(&DependencyProviders::new())
}

#[derive(Default)]
struct Items;

#[fixture]
fn items() -> ModuleDescriptor<Items, SimpleNode> {
    ModuleDescriptor::builder("items")
        .static_module()
        .function_with(
            "as-integer",
            FunctionAttributes::new().param(0, "xs:integer"),
            |x: XdmItem<SimpleNode>| x,
        )
        .function_with(
            "as-string",
            FunctionAttributes::new().returns("xs:string"),
            |x: i64| XdmItem::<SimpleNode>::Atomic(XdmAtomicValue::Integer(x)),
        )
        .function("any", |x: XdmItem<SimpleNode>| x)
        .build()
        .unwrap()
}

#[rstest]
fn atomic_declared_item_parameter_is_atomized_and_cast(items: ModuleDescriptor<Items, SimpleNode>) {
    let units = units(&items);
    let ns = NamespaceBindings::with_builtins();
    let f = unit(&units, "as-integer");
    assert_eq!(f.argument_types[0].to_string(), "xs:integer");

    let d = doc().child(elem("v").child(text("5"))).build();
    let out = f.invoke(&Items, &ns, &[vec![XdmItem::Node(d.children()[0].clone())]]).unwrap();
    assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::Integer(5))]);

    let out = f.invoke(&Items, &ns, &[string("12")]).unwrap();
    assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::Integer(12))]);

    let err = f.invoke(&Items, &ns, &[string("five")]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001, "{err}");
}

#[rstest]
fn atomic_declared_item_result_is_cast(items: ModuleDescriptor<Items, SimpleNode>) {
    let units = units(&items);
    let ns = NamespaceBindings::with_builtins();
    let out = unit(&units, "as-string")
        .invoke(&Items, &ns, &[vec![XdmAtomicValue::Integer(7).into()]])
        .unwrap();
    assert_eq!(out, string("7"));
}

#[rstest]
fn undeclared_item_passes_through(items: ModuleDescriptor<Items, SimpleNode>) {
    let units = units(&items);
    let ns = NamespaceBindings::with_builtins();
    let d = doc().child(elem("v").child(text("5"))).build();
    let node = d.children()[0].clone();
    let out = unit(&units, "any")
        .invoke(&Items, &ns, &[vec![XdmItem::Node(node.clone())]])
        .unwrap();
    assert_eq!(out, vec![XdmItem::Node(node)]);
}
