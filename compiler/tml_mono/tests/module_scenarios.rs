//! Whole-module compilations through the public entry point.

use pretty_assertions::assert_eq;
use tml_diagnostic::ErrorCode;
use tml_ir::{
    BehaviorDef, Block, Expr, FieldDef, FnFlags, FunctionDef, ImplDef, MethodSig, Module, Param,
    Path, Stmt, StructDef, SymbolEnv, Type,
};
use tml_mono::{compile_module, CodegenConfig, CodegenOutput, InstKind};

fn compile(env: &SymbolEnv) -> CodegenOutput {
    compile_module(env, CodegenConfig::default()).unwrap_or_else(|e| panic!("{e}"))
}

#[track_caller]
fn assert_ir(out: &CodegenOutput, needle: &str) {
    assert!(out.ir.contains(needle), "missing `{needle}` in:\n{}", out.ir);
}

fn generic(name: &str, ret: Type, body: Expr) -> FunctionDef {
    FunctionDef::new(name, vec![Param::new("x", Type::param("T"))], ret, Block::expr(body))
        .with_generics(&["T"])
}

#[test]
fn transitive_instantiation_takes_one_round_per_level() {
    let identity = generic("identity", Type::param("T"), Expr::ident("x"));
    let outer = generic(
        "outer",
        Type::param("T"),
        Expr::call(Expr::ident("identity"), vec![Expr::ident("x")]),
    );
    let main = FunctionDef::new(
        "main",
        Vec::new(),
        Type::BOOL,
        Block::expr(Expr::call(Expr::ident("outer"), vec![Expr::bool(true)])),
    );
    let env = SymbolEnv::new(
        Module::new("app")
            .with_function(identity)
            .with_function(outer)
            .with_function(main),
    );

    let out = compile(&env);

    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_eq!(out.rounds, 2);
    let names: Vec<&str> = out.instantiations.iter().map(|w| w.mangled.as_str()).collect();
    assert_eq!(names, vec!["outer__Bool", "identity__Bool"]);
    assert_ir(&out, "define i1 @tml_outer__Bool(i1 %arg.x) {");
    assert_ir(&out, "call i1 @tml_identity__Bool(i1 ");
}

#[test]
fn generic_impl_method_is_instantiated_for_the_receiver() {
    let range = StructDef::new(
        "Range",
        vec![
            FieldDef::new("start", Type::param("T")),
            FieldDef::new("end", Type::param("T")),
        ],
    )
    .with_generics(&["T"]);
    let first = FunctionDef::new(
        "first",
        Vec::new(),
        Type::param("T"),
        Block::expr(Expr::field(Expr::ident("self"), "start")),
    )
    .with_flags(FnFlags::HAS_SELF);
    let imp = ImplDef::inherent(Type::named("Range", vec![Type::param("T")]), vec![first])
        .with_generics(&["T"]);
    let literal = Expr::struct_lit(
        Path::new(&["Range"]),
        vec![("start", Expr::int(1)), ("end", Expr::int(9))],
        None,
    );
    let main = FunctionDef::new(
        "main",
        Vec::new(),
        Type::I32,
        Block::new(
            vec![Stmt::let_("r", None, literal)],
            Some(Expr::method_call(Expr::ident("r"), "first", Vec::new())),
        ),
    );
    let env = SymbolEnv::new(
        Module::new("app")
            .with_struct(range)
            .with_impl(imp)
            .with_function(main),
    );

    let out = compile(&env);

    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert!(out.instantiated("Range__I32"));
    assert!(out.instantiated("Range__I32_first"));
    let method = out
        .instantiations
        .iter()
        .find(|w| w.mangled == "Range__I32_first")
        .unwrap_or_else(|| panic!("{:?}", out.instantiations));
    assert_eq!(method.kind, InstKind::Method);
    assert_ir(&out, "%struct.Range__I32 = type { i32, i32 }");
    assert_ir(&out, "define i32 @tml_Range__I32_first(ptr %self) {");
    assert_ir(&out, "call i32 @tml_Range__I32_first(ptr ");
}

fn show_behavior() -> BehaviorDef {
    BehaviorDef::new("Show", vec![MethodSig::new("show", Vec::new(), Type::I32)])
}

fn display_fn() -> FunctionDef {
    FunctionDef::new(
        "display",
        vec![Param::new("s", Type::dyn_behavior("Show", Vec::new()))],
        Type::I32,
        Block::expr(Expr::method_call(Expr::ident("s"), "show", Vec::new())),
    )
}

fn main_displaying(value: Expr) -> FunctionDef {
    FunctionDef::new(
        "main",
        Vec::new(),
        Type::I32,
        Block::expr(Expr::call(Expr::ident("display"), vec![value])),
    )
}

#[test]
fn vtable_of_generic_impl_instantiates_its_methods() {
    let holder = StructDef::new("Holder", vec![FieldDef::new("v", Type::param("T"))])
        .with_generics(&["T"]);
    let show = FunctionDef::new("show", Vec::new(), Type::I32, Block::expr(Expr::int(1)))
        .with_flags(FnFlags::HAS_SELF);
    let imp = ImplDef::behavior("Show", Type::named("Holder", vec![Type::param("T")]), vec![show])
        .with_generics(&["T"]);
    let literal = Expr::struct_lit(Path::new(&["Holder"]), vec![("v", Expr::int(5))], None);
    let env = SymbolEnv::new(
        Module::new("app")
            .with_behavior(show_behavior())
            .with_struct(holder)
            .with_impl(imp)
            .with_function(display_fn())
            .with_function(main_displaying(literal)),
    );

    let out = compile(&env);

    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_ir(
        &out,
        "@vtable.Holder__I32.Show = internal constant [1 x ptr] [ptr @tml_Holder__I32_show]",
    );
    assert_ir(&out, "define i32 @tml_Holder__I32_show(ptr %self) {");
}

#[test]
fn missing_behavior_method_leaves_a_null_slot() {
    let point = StructDef::new("Point", vec![FieldDef::new("x", Type::I32)]);
    let imp = ImplDef::behavior("Show", Type::named("Point", Vec::new()), Vec::new());
    let literal = Expr::struct_lit(Path::new(&["Point"]), vec![("x", Expr::int(5))], None);
    let env = SymbolEnv::new(
        Module::new("app")
            .with_behavior(show_behavior())
            .with_struct(point)
            .with_impl(imp)
            .with_function(display_fn())
            .with_function(main_displaying(literal)),
    );

    let out = compile(&env);

    let codes: Vec<ErrorCode> = out.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5009]);
    assert_ir(&out, "@vtable.Point.Show = internal constant [1 x ptr] [ptr null]");
}

#[test]
fn imported_functions_are_declared_once() {
    let helper = FunctionDef::new(
        "helper",
        vec![Param::new("x", Type::I32)],
        Type::I32,
        Block::expr(Expr::ident("x")),
    );
    let call = |n| Expr::call(Expr::ident("helper"), vec![Expr::int(n)]);
    let main = FunctionDef::new(
        "main",
        Vec::new(),
        Type::I32,
        Block::new(vec![Stmt::Expr(call(1))], Some(call(2))),
    );
    let env = SymbolEnv::new(Module::new("app").with_function(main))
        .with_import(Module::new("lib").with_function(helper));

    let out = compile(&env);

    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_eq!(out.ir.matches("declare i32 @tml_helper(i32)").count(), 1);
    assert!(!out.ir.contains("define i32 @tml_helper"), "{}", out.ir);
    assert_ir(&out, "call i32 @tml_helper(i32 2)");
}

#[test]
fn round_limit_error_converts_to_a_diagnostic() {
    let wrap = StructDef::new("Wrap", vec![FieldDef::new("inner", Type::param("T"))])
        .with_generics(&["T"]);
    let nest = generic(
        "nest",
        Type::I32,
        Expr::call(
            Expr::ident("nest"),
            vec![Expr::struct_lit(
                Path::new(&["Wrap"]),
                vec![("inner", Expr::ident("x"))],
                None,
            )],
        ),
    );
    let main = FunctionDef::new(
        "main",
        Vec::new(),
        Type::I32,
        Block::expr(Expr::call(Expr::ident("nest"), vec![Expr::int(0)])),
    );
    let env = SymbolEnv::new(
        Module::new("app")
            .with_struct(wrap)
            .with_function(nest)
            .with_function(main),
    );

    let err = compile_module(&env, CodegenConfig::default().with_max_instantiation_rounds(3))
        .err()
        .unwrap_or_else(|| panic!("expected the worklist to diverge"));
    let diagnostic = err.to_diagnostic();

    assert_eq!(diagnostic.code, ErrorCode::E9001);
    assert!(diagnostic.message.contains("3 rounds"), "{}", diagnostic.message);
    assert!(diagnostic.message.contains("nest__Wrap__"), "{}", diagnostic.message);
}
