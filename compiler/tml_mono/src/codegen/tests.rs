use super::*;

use pretty_assertions::assert_eq;
use tml_diagnostic::{Diagnostic, ErrorCode};
use tml_ir::{
    BehaviorDef, Block, ClassDef, ClassFlags, EnumDef, Expr, FieldDef, FnFlags, FunctionDef,
    ImplDef, MethodSig, Module, Param, Path, PrimitiveKind, Stmt, StructDef, SymbolEnv, Type,
    VariantDef,
};

use crate::{CodegenConfig, MonoError};

fn compile_with(module: Module, config: CodegenConfig) -> CodegenOutput {
    let env = SymbolEnv::new(module);
    compile_module(&env, config).unwrap_or_else(|e| panic!("compilation aborted: {e}"))
}

fn compile(module: Module) -> CodegenOutput {
    compile_with(module, CodegenConfig::default())
}

fn codes(out: &CodegenOutput) -> Vec<ErrorCode> {
    out.diagnostics.iter().map(|d: &Diagnostic| d.code).collect()
}

fn assert_clean(out: &CodegenOutput) {
    assert!(
        out.diagnostics.is_empty(),
        "unexpected diagnostics: {:#?}\n{}",
        out.diagnostics,
        out.ir
    );
}

fn assert_ir(out: &CodegenOutput, needle: &str) {
    assert!(out.ir.contains(needle), "missing `{needle}` in:\n{}", out.ir);
}

fn main_fn(ret: Type, stmts: Vec<Stmt>, tail: Option<Expr>) -> FunctionDef {
    FunctionDef::new("main", Vec::new(), ret, Block::new(stmts, tail))
}

fn maybe_enum() -> EnumDef {
    EnumDef::new(
        "Maybe",
        vec![
            VariantDef::new("Just", vec![Type::param("T")]),
            VariantDef::new("Nothing", Vec::new()),
        ],
    )
    .with_generics(&["T"])
}

fn identity_fn() -> FunctionDef {
    FunctionDef::new(
        "identity",
        vec![Param::new("x", Type::param("T"))],
        Type::param("T"),
        Block::expr(Expr::ident("x")),
    )
    .with_generics(&["T"])
}

// Enum construction

#[test]
fn enum_constructor_instantiates_and_stores_tag_then_payload() {
    let call = Expr::call_path(Path::new(&["Maybe", "Just"]), vec![Expr::int(5)]);
    let module = Module::new("app").with_enum(maybe_enum()).with_function(main_fn(
        Type::I32,
        vec![Stmt::let_("m", None, call)],
        Some(Expr::int(0)),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert!(out.instantiated("Maybe__I32"));
    assert_ir(&out, "%struct.Maybe__I32 = type { i32, [1 x i64] }");
    let tag = out.ir.find("store i32 0, ptr").unwrap_or_else(|| panic!("{}", out.ir));
    let payload = out.ir.find("store i32 5, ptr").unwrap_or_else(|| panic!("{}", out.ir));
    assert!(tag < payload);
}

#[test]
fn payloadless_variant_takes_generics_from_annotation() {
    let nothing = Expr::path(Path::new(&["Maybe", "Nothing"]));
    let annotated = Type::named("Maybe", vec![Type::I64]);
    let module = Module::new("app").with_enum(maybe_enum()).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_("n", Some(annotated), nothing)],
        None,
    ));

    let out = compile(module);

    assert_clean(&out);
    assert!(out.instantiated("Maybe__I64"));
    assert!(!out.instantiated("Maybe__I32"));
}

#[test]
fn uninferable_generic_defaults_with_warning() {
    let nothing = Expr::path(Path::new(&["Maybe", "Nothing"]));
    let module = || {
        Module::new("app").with_enum(maybe_enum()).with_function(main_fn(
            Type::UNIT,
            vec![Stmt::let_("n", None, nothing.clone())],
            None,
        ))
    };

    let out = compile(module());
    assert_eq!(codes(&out), vec![ErrorCode::W5001]);
    assert!(!out.has_errors());
    assert!(out.instantiated("Maybe__I32"));

    let strict = compile_with(module(), CodegenConfig::default().with_strict_generics(true));
    assert_eq!(codes(&strict), vec![ErrorCode::E5007]);
    assert!(strict.has_errors());
}

#[test]
fn enum_with_open_arguments_is_represented_by_its_tag() {
    let nothing = Expr::path(Path::new(&["Maybe", "Nothing"]));
    let annotated = Type::named("Maybe", vec![Type::param("Q")]);
    let module = Module::new("app").with_enum(maybe_enum()).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_("n", Some(annotated), nothing)],
        None,
    ));

    let out = compile(module);

    assert_eq!(codes(&out), vec![ErrorCode::W5002]);
    assert!(!out.ir.contains("%struct.Maybe__UNRESOLVED"), "{}", out.ir);
    assert_ir(&out, "store i32 1, ptr");
}

// Generic functions

#[test]
fn generic_call_is_instantiated_once_per_argument_list() {
    let call = |arg: Expr| Expr::call(Expr::ident("identity"), vec![arg]);
    let module = Module::new("app").with_function(identity_fn()).with_function(main_fn(
        Type::I32,
        vec![
            Stmt::Expr(call(Expr::int(1))),
            Stmt::Expr(call(Expr::int(2))),
        ],
        Some(call(Expr::int(3))),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "define i32 @tml_identity__I32(i32 %arg.x) {");
    assert_ir(&out, "call i32 @tml_identity__I32(i32 3)");
    assert_eq!(out.ir.matches("define i32 @tml_identity__I32").count(), 1);
    assert_eq!(out.instantiations.len(), 1);
}

#[test]
fn explicit_open_type_argument_is_deferred() {
    let path = Path::new(&["identity"]).with_generics(vec![Type::param("Q")]);
    let module = Module::new("app").with_function(identity_fn()).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::Expr(Expr::call_path(path, vec![Expr::int(1)]))],
        None,
    ));

    let out = compile(module);

    assert_eq!(codes(&out), vec![ErrorCode::W5002]);
    assert_eq!(out.deferred.len(), 1);
    assert_ir(&out, "@tml_identity__UNRESOLVED");
    assert!(!out.ir.contains("define i32 @tml_identity__UNRESOLVED"));
}

#[test]
fn self_growing_instantiation_does_not_converge() {
    let wrap = StructDef::new("Wrap", vec![FieldDef::new("inner", Type::param("T"))])
        .with_generics(&["T"]);
    let grow = FunctionDef::new(
        "grow",
        vec![Param::new("x", Type::param("T"))],
        Type::I32,
        Block::expr(Expr::call(
            Expr::ident("grow"),
            vec![Expr::struct_lit(
                Path::new(&["Wrap"]),
                vec![("inner", Expr::ident("x"))],
                None,
            )],
        )),
    )
    .with_generics(&["T"]);
    let module = Module::new("app")
        .with_struct(wrap)
        .with_function(grow)
        .with_function(main_fn(
            Type::I32,
            Vec::new(),
            Some(Expr::call(Expr::ident("grow"), vec![Expr::int(1)])),
        ));
    let env = SymbolEnv::new(module);

    let result = compile_module(&env, CodegenConfig::default().with_max_instantiation_rounds(5));

    assert!(
        matches!(result, Err(MonoError::NonConvergent { rounds: 5, .. })),
        "{result:?}"
    );
}

// Call resolution

#[test]
fn unresolved_call_reports_and_continues() {
    let module = Module::new("app").with_function(main_fn(
        Type::UNIT,
        vec![Stmt::Expr(Expr::call(Expr::ident("nowhere"), vec![Expr::int(1)]))],
        None,
    ));

    let out = compile(module);

    assert_eq!(codes(&out), vec![ErrorCode::E5001]);
    assert_ir(&out, "define void @tml_main() {");
}

#[test]
fn bare_intrinsic_prefers_time_family() {
    let module = Module::new("app").with_function(main_fn(
        Type::UNIT,
        vec![
            Stmt::Expr(Expr::call(Expr::ident("sleep"), vec![Expr::int(10)])),
            Stmt::Expr(Expr::call_path(
                Path::new(&["async", "sleep"]),
                vec![Expr::int(20)],
            )),
        ],
        None,
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "call void @sleep_ms(i64 10)");
    assert_ir(&out, "call void @async_sleep(i64 20)");
}

#[test]
fn primitive_static_folds_to_constant() {
    let max = Expr::call_path(Path::new(&["I64", "max_value"]), Vec::new());
    let module = Module::new("app").with_function(main_fn(Type::I64, Vec::new(), Some(max)));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "ret i64 9223372036854775807");
}

#[test]
fn char_max_value_is_the_last_scalar_value() {
    let max = Expr::call_path(Path::new(&["Char", "max_value"]), Vec::new());
    let module = Module::new("app").with_function(main_fn(
        Type::Primitive(PrimitiveKind::Char),
        Vec::new(),
        Some(max),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "ret i32 1114111");
}

#[test]
fn wrong_argument_count_is_reported() {
    let module = Module::new("app").with_function(identity_fn()).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::Expr(Expr::call(
            Expr::ident("identity"),
            vec![Expr::int(1), Expr::int(2)],
        ))],
        None,
    ));

    let out = compile(module);

    assert!(codes(&out).contains(&ErrorCode::E5004), "{:#?}", out.diagnostics);
}

// Structs and unions

fn point() -> StructDef {
    StructDef::new(
        "Point",
        vec![
            FieldDef::new("x", Type::I32),
            FieldDef::new("y", Type::I32),
        ],
    )
}

#[test]
fn struct_update_copies_base_before_explicit_fields() {
    let update = Expr::struct_lit(
        Path::new(&["Point"]),
        vec![("x", Expr::int(10))],
        Some(Expr::ident("base")),
    );
    let shift = FunctionDef::new(
        "shift",
        vec![Param::new("base", Type::named("Point", Vec::new()))],
        Type::named("Point", Vec::new()),
        Block::expr(update),
    );
    let module = Module::new("app").with_struct(point()).with_function(shift);

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "%struct.Point = type { i32, i32 }");
    let base = out.ir.find("store %struct.Point").unwrap_or_else(|| panic!("{}", out.ir));
    let field = out.ir.find("store i32 10, ptr").unwrap_or_else(|| panic!("{}", out.ir));
    assert!(base < field);
}

#[test]
fn missing_struct_field_is_reported() {
    let literal = Expr::struct_lit(Path::new(&["Point"]), vec![("x", Expr::int(1))], None);
    let module = Module::new("app").with_struct(point()).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_("p", None, literal)],
        None,
    ));

    let out = compile(module);

    assert_eq!(codes(&out), vec![ErrorCode::E5005]);
}

#[test]
fn union_literal_initializes_exactly_one_member() {
    let bits = StructDef::union(
        "Bits",
        vec![
            FieldDef::new("int", Type::I64),
            FieldDef::new("float", Type::F64),
        ],
    );
    let both = Expr::struct_lit(
        Path::new(&["Bits"]),
        vec![("int", Expr::int(1)), ("float", Expr::float(1.0))],
        None,
    );
    let one = Expr::struct_lit(Path::new(&["Bits"]), vec![("int", Expr::int(7))], None);
    let module = Module::new("app").with_struct(bits).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_("a", None, one), Stmt::let_("b", None, both)],
        None,
    ));

    let out = compile(module);

    assert_ir(&out, "%union.Bits = type { [8 x i8] }");
    assert_ir(&out, "store i64 7, ptr");
    assert_eq!(codes(&out), vec![ErrorCode::E5010]);
}

#[test]
fn field_access_sees_through_nested_boxes() {
    let boxed = Type::named("Box", vec![Type::named("Box", vec![Type::named("Point", Vec::new())])]);
    let get = FunctionDef::new(
        "get",
        vec![Param::new("b", boxed)],
        Type::I32,
        Block::expr(Expr::field(Expr::ident("b"), "y")),
    );
    let module = Module::new("app").with_struct(point()).with_function(get);

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "getelementptr inbounds %struct.Point, ptr");
    assert_ir(&out, "i32 0, i32 1");
}

#[test]
fn omitted_field_takes_its_declared_default() {
    let config = StructDef::new(
        "Config",
        vec![
            FieldDef::new("x", Type::I32),
            FieldDef::new("y", Type::I32).with_default(Expr::int(7)),
        ],
    );
    let literal = Expr::struct_lit(Path::new(&["Config"]), vec![("x", Expr::int(1))], None);
    let module = Module::new("app").with_struct(config).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_("c", None, literal)],
        None,
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "store i32 1, ptr");
    assert_ir(&out, "store i32 7, ptr");
}

#[test]
fn inherited_class_field_steps_through_the_base_block() {
    let animal = ClassDef::new("Animal", vec![FieldDef::new("legs", Type::I32)]);
    let dog = ClassDef::new("Dog", vec![FieldDef::new("tail", Type::I32)]).with_base("Animal");
    let legs = FunctionDef::new(
        "legs",
        vec![Param::new("d", Type::named("Dog", Vec::new()))],
        Type::I32,
        Block::expr(Expr::field(Expr::ident("d"), "legs")),
    );
    let module = Module::new("app")
        .with_class(animal)
        .with_class(dog)
        .with_function(legs);

    let out = compile(module);

    assert_clean(&out);
    let lines: Vec<&str> = out.ir.lines().collect();
    let base = lines
        .iter()
        .position(|l| {
            l.contains("getelementptr inbounds %class.Dog, ptr") && l.ends_with("i32 0, i32 0")
        })
        .unwrap_or_else(|| panic!("{}", out.ir));
    let field = lines
        .iter()
        .position(|l| {
            l.contains("getelementptr inbounds %class.Animal, ptr") && l.ends_with("i32 0, i32 1")
        })
        .unwrap_or_else(|| panic!("{}", out.ir));
    assert!(base < field);
}

#[test]
fn field_access_skips_the_reference_count_header() {
    let shared = Type::named("Arc", vec![Type::named("Point", Vec::new())]);
    let get = FunctionDef::new(
        "get",
        vec![Param::new("a", shared)],
        Type::I32,
        Block::expr(Expr::field(Expr::ident("a"), "y")),
    );
    let module = Module::new("app").with_struct(point()).with_function(get);

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "%struct.ArcInner__Point = type { i64, i64, %struct.Point }");
    let lines: Vec<&str> = out.ir.lines().collect();
    let payload = lines
        .iter()
        .position(|l| {
            l.contains("getelementptr inbounds %struct.ArcInner__Point, ptr")
                && l.ends_with("i32 0, i32 2")
        })
        .unwrap_or_else(|| panic!("{}", out.ir));
    let field = lines
        .iter()
        .position(|l| {
            l.contains("getelementptr inbounds %struct.Point, ptr") && l.ends_with("i32 0, i32 1")
        })
        .unwrap_or_else(|| panic!("{}", out.ir));
    assert!(payload < field);
}

// Dynamic dispatch

#[test]
fn dyn_call_indexes_the_declaration_order_slot() {
    let describe = BehaviorDef::new(
        "Describe",
        vec![
            MethodSig::new("first", Vec::new(), Type::I32),
            MethodSig::new("second", Vec::new(), Type::I32),
            MethodSig::new("third", Vec::new(), Type::I32),
        ],
    );
    let method = |name: &str, value: i128| {
        FunctionDef::new(name, Vec::new(), Type::I32, Block::expr(Expr::int(value)))
            .with_flags(FnFlags::HAS_SELF)
    };
    let square = StructDef::new("Square", vec![FieldDef::new("side", Type::I32)]);
    let imp = ImplDef::behavior(
        "Describe",
        Type::named("Square", Vec::new()),
        // Impl order differs from the behavior's.
        vec![method("third", 3), method("first", 1), method("second", 2)],
    );
    let show = FunctionDef::new(
        "show",
        vec![Param::new("d", Type::dyn_behavior("Describe", Vec::new()))],
        Type::I32,
        Block::expr(Expr::method_call(Expr::ident("d"), "second", Vec::new())),
    );
    let literal = Expr::struct_lit(Path::new(&["Square"]), vec![("side", Expr::int(2))], None);
    let module = Module::new("app")
        .with_behavior(describe)
        .with_struct(square)
        .with_impl(imp)
        .with_function(show)
        .with_function(main_fn(
            Type::I32,
            Vec::new(),
            Some(Expr::call(Expr::ident("show"), vec![literal])),
        ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "%dyn.Describe = type { ptr, ptr }");
    assert_ir(
        &out,
        "@vtable.Square.Describe = internal constant [3 x ptr] \
         [ptr @tml_Square_first, ptr @tml_Square_second, ptr @tml_Square_third]",
    );
    assert_ir(&out, "getelementptr inbounds ptr, ptr");
    assert_ir(&out, ", i64 1");
    assert_ir(&out, "define i32 @tml_Square_second(ptr %self) {");
}

#[test]
fn class_virtual_call_goes_through_instance_vtable() {
    let speak = |value: i128| {
        FunctionDef::new("speak", Vec::new(), Type::I32, Block::expr(Expr::int(value)))
            .with_flags(FnFlags::HAS_SELF | FnFlags::VIRTUAL)
    };
    let animal = ClassDef::new("Animal", vec![FieldDef::new("legs", Type::I32)]).with_method(speak(1));
    let dog = ClassDef::new("Dog", Vec::new())
        .with_base("Animal")
        .with_method(speak(2));
    let call = FunctionDef::new(
        "call",
        vec![Param::new("a", Type::named("Animal", Vec::new()))],
        Type::I32,
        Block::expr(Expr::method_call(Expr::ident("a"), "speak", Vec::new())),
    );
    let literal = Expr::struct_lit(Path::new(&["Dog"]), vec![("legs", Expr::int(4))], None);
    let module = Module::new("app")
        .with_class(animal)
        .with_class(dog)
        .with_function(call)
        .with_function(main_fn(
            Type::I32,
            Vec::new(),
            Some(Expr::call(Expr::ident("call"), vec![literal])),
        ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "%class.Animal = type { ptr, i32 }");
    assert_ir(&out, "%class.Dog = type { %class.Animal }");
    assert_ir(&out, "@vtable.Dog = internal constant [1 x ptr] [ptr @tml_Dog_speak]");
    assert_ir(&out, "getelementptr inbounds ptr, ptr");
    assert_ir(&out, "define i32 @tml_Dog_speak(ptr %self) {");
}

#[test]
fn value_class_methods_are_called_directly() {
    let get = FunctionDef::new(
        "get",
        Vec::new(),
        Type::I32,
        Block::expr(Expr::field(Expr::ident("self"), "v")),
    )
    .with_flags(FnFlags::HAS_SELF);
    let cell = ClassDef::new("Cell", vec![FieldDef::new("v", Type::I32)])
        .with_flags(ClassFlags::SEALED)
        .with_method(get);
    let literal = Expr::struct_lit(Path::new(&["Cell"]), vec![("v", Expr::int(3))], None);
    let module = Module::new("app").with_class(cell).with_function(main_fn(
        Type::I32,
        vec![Stmt::let_("c", None, literal)],
        Some(Expr::method_call(Expr::ident("c"), "get", Vec::new())),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "call i32 @tml_Cell_get(ptr");
    assert!(!out.ir.contains("@vtable.Cell"), "{}", out.ir);
}

#[test]
fn constructor_overloads_get_distinct_symbols() {
    let ctor = |params: Vec<Param>| FunctionDef::new("new", params, Type::UNIT, Block::default());
    let counter = ClassDef::new("Counter", vec![FieldDef::new("n", Type::I64)])
        .with_constructor(ctor(vec![Param::new("x", Type::I32)]))
        .with_constructor(ctor(vec![Param::new("x", Type::I32), Param::new("y", Type::I64)]));
    let module = Module::new("app").with_class(counter).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::let_(
            "c",
            None,
            Expr::call_path(Path::new(&["Counter", "new"]), vec![Expr::int(1)]),
        )],
        None,
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "define ptr @tml_Counter_new_I32(i32 %arg.x) {");
    assert_ir(&out, "define ptr @tml_Counter_new_I32_I64(i32 %arg.x, i64 %arg.y) {");
    assert_ir(&out, "call ptr @tml_Counter_new_I32(i32 1)");
}

// Function values

fn double_fn() -> FunctionDef {
    FunctionDef::new(
        "double",
        vec![Param::new("x", Type::I32)],
        Type::I32,
        Block::expr(Expr::ident("x")),
    )
}

#[test]
fn named_function_value_is_called_thin() {
    let module = Module::new("app").with_function(double_fn()).with_function(main_fn(
        Type::I32,
        vec![Stmt::let_("g", None, Expr::ident("double"))],
        Some(Expr::call(Expr::ident("g"), vec![Expr::int(2)])),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "{ ptr @tml_double, ptr null }");
    assert!(!out.ir.contains("fp_thin"), "{}", out.ir);
}

#[test]
fn closure_passes_its_environment_first() {
    let body = FunctionDef::new(
        "adder_body",
        vec![Param::new("y", Type::I32)],
        Type::I32,
        Block::expr(Expr::ident("n")),
    )
    .with_env(vec![Param::new("n", Type::I32)]);
    let module = Module::new("app").with_function(body).with_function(main_fn(
        Type::I32,
        vec![
            Stmt::let_("n", None, Expr::int(5)),
            Stmt::let_("c", None, Expr::closure("adder_body", vec!["n"])),
        ],
        Some(Expr::call(Expr::ident("c"), vec![Expr::int(1)])),
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "define i32 @tml_adder_body(ptr %env, i32 %arg.y) {");
    assert_ir(&out, "call ptr @malloc(i64 4)");
    assert_ir(&out, "insertvalue { ptr, ptr } { ptr @tml_adder_body, ptr null }, ptr");
    assert!(!out.ir.contains("fp_thin"), "{}", out.ir);
}

#[test]
fn closure_in_generic_function_is_instantiated_with_it() {
    let apply = FunctionDef::new(
        "apply",
        vec![Param::new("x", Type::param("T"))],
        Type::param("T"),
        Block::new(
            vec![Stmt::let_("c", None, Expr::closure("apply_c0", vec!["x"]))],
            Some(Expr::call(Expr::ident("c"), Vec::new())),
        ),
    )
    .with_generics(&["T"]);
    let body = FunctionDef::new(
        "apply_c0",
        Vec::new(),
        Type::param("T"),
        Block::expr(Expr::ident("x")),
    )
    .with_env(vec![Param::new("x", Type::param("T"))]);
    let module = Module::new("app")
        .with_function(apply)
        .with_function(body)
        .with_function(main_fn(
            Type::I64,
            vec![Stmt::let_("v", Some(Type::I64), Expr::int(7))],
            Some(Expr::call(Expr::ident("apply"), vec![Expr::ident("v")])),
        ));

    let out = compile(module);

    assert_clean(&out);
    assert!(out.instantiated("apply_c0__I64"));
    assert_ir(&out, "define i64 @tml_apply_c0__I64(ptr %env) {");
    assert_ir(&out, "insertvalue { ptr, ptr } { ptr @tml_apply_c0__I64, ptr null }, ptr");
    assert!(!out.ir.contains("@tml_apply_c0("), "{}", out.ir);
    assert!(!out.ir.contains("@tml_apply_c0 "), "{}", out.ir);
}

#[test]
fn function_parameter_call_branches_on_env() {
    let apply = FunctionDef::new(
        "apply",
        vec![
            Param::new("f", Type::func(vec![Type::I32], Type::I32)),
            Param::new("x", Type::I32),
        ],
        Type::I32,
        Block::expr(Expr::call(Expr::ident("f"), vec![Expr::ident("x")])),
    );
    let module = Module::new("app").with_function(apply);

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "icmp eq ptr");
    assert_ir(&out, "fp_thin");
    assert_ir(&out, "fp_fat");
    assert_ir(&out, "phi i32");
}

#[test]
fn coverage_marks_every_lowered_function() {
    let module = Module::new("app")
        .with_function(double_fn())
        .with_function(main_fn(Type::UNIT, Vec::new(), None));

    let out = compile_with(module, CodegenConfig::default().with_coverage(true));

    assert_clean(&out);
    assert_eq!(out.ir.matches("call void @tml_cover_func(ptr @.cov.").count(), 2);
}

#[test]
fn extern_functions_are_declared_not_defined() {
    let mut puts = FunctionDef::new(
        "puts",
        vec![Param::new("s", Type::STR)],
        Type::I32,
        Block::default(),
    )
    .with_flags(FnFlags::EXTERN);
    puts.body = None;
    let module = Module::new("app").with_function(puts).with_function(main_fn(
        Type::UNIT,
        vec![Stmt::Expr(Expr::call(Expr::ident("puts"), vec![Expr::str("hi")]))],
        None,
    ));

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "declare i32 @puts(ptr)");
    assert!(!out.ir.contains("define i32 @puts"), "{}", out.ir);
    assert!(!out.ir.contains("@tml_puts"), "{}", out.ir);
}

#[test]
fn callable_field_always_checks_the_environment() {
    let handler = StructDef::new(
        "Handler",
        vec![FieldDef::new("cb", Type::closure(vec![Type::I32], Type::I32))],
    );
    let run = FunctionDef::new(
        "run",
        vec![Param::new("h", Type::named("Handler", Vec::new()))],
        Type::I32,
        Block::expr(Expr::method_call(Expr::ident("h"), "cb", vec![Expr::int(1)])),
    );
    let module = Module::new("app").with_struct(handler).with_function(run);

    let out = compile(module);

    assert_clean(&out);
    assert_ir(&out, "getelementptr inbounds %struct.Handler, ptr");
    assert_ir(&out, "fp_thin");
    assert_ir(&out, "fp_merge");
}

#[test]
fn tail_constructor_binds_remaining_generics_from_return_type() {
    let outcome = EnumDef::new(
        "Outcome",
        vec![
            VariantDef::new("Ok", vec![Type::param("T")]),
            VariantDef::new("Err", vec![Type::param("E")]),
        ],
    )
    .with_generics(&["T", "E"]);
    let wrap = FunctionDef::new(
        "wrap",
        vec![Param::new("x", Type::STR)],
        Type::named("Outcome", vec![Type::STR, Type::I32]),
        Block::expr(Expr::call_path(
            Path::new(&["Outcome", "Ok"]),
            vec![Expr::ident("x")],
        )),
    );
    let module = Module::new("app").with_enum(outcome).with_function(wrap);

    let out = compile(module);

    assert_clean(&out);
    assert!(out.instantiated("Outcome__Str__I32"));
    assert_ir(&out, "%struct.Outcome__Str__I32 = type { i32, [1 x i64] }");
    assert_ir(&out, "define %struct.Outcome__Str__I32 @tml_wrap(ptr %arg.x) {");
}
