use tokens::{ClassKind, Visibility};

use super::{
    CtorDef, FieldDef, MethodAttrs, MethodDef, Origin, SymbolTable, TypeCategory, TypeDef, TypeId,
    WellKnown,
};

const SYSTEM: &str = "System";

const STATIC: bool = true;
const INSTANCE: bool = false;

pub(super) fn install(table: &mut SymbolTable) -> WellKnown {
    let object = host_type(table, SYSTEM, "Object", TypeCategory::Object, ClassKind::Default, None);
    let known = WellKnown {
        object,
        void: host_type(table, SYSTEM, "Void", TypeCategory::Void, ClassKind::Struct, None),
        boolean: value_type(table, "Boolean", TypeCategory::Bool, object),
        char: value_type(table, "Char", TypeCategory::Char, object),
        sbyte: value_type(table, "SByte", TypeCategory::SByte, object),
        int16: value_type(table, "Int16", TypeCategory::Int16, object),
        int32: value_type(table, "Int32", TypeCategory::Int32, object),
        int64: value_type(table, "Int64", TypeCategory::Int64, object),
        single: value_type(table, "Single", TypeCategory::Single, object),
        double: value_type(table, "Double", TypeCategory::Double, object),
        string: host_type(
            table,
            SYSTEM,
            "String",
            TypeCategory::String,
            ClassKind::Sealed,
            Some(object),
        ),
        array: host_type(
            table,
            SYSTEM,
            "Array",
            TypeCategory::Reference,
            ClassKind::Abstract,
            Some(object),
        ),
        math: host_type(
            table,
            SYSTEM,
            "Math",
            TypeCategory::Reference,
            ClassKind::Static,
            Some(object),
        ),
    };

    let comparable = host_type(
        table,
        SYSTEM,
        "IComparable",
        TypeCategory::Interface,
        ClassKind::Interface,
        None,
    );
    let disposable = host_type(
        table,
        SYSTEM,
        "IDisposable",
        TypeCategory::Interface,
        ClassKind::Interface,
        None,
    );
    let console = host_type(
        table,
        SYSTEM,
        "Console",
        TypeCategory::Reference,
        ClassKind::Static,
        Some(object),
    );
    let decimal = value_type(table, "Decimal", TypeCategory::Value, object);
    let builder = host_type(
        table,
        "System.Text",
        "StringBuilder",
        TypeCategory::Reference,
        ClassKind::Sealed,
        Some(object),
    );

    let k = known;
    virtual_method(table, object, "ToString", &[], k.string);
    virtual_method(table, object, "Equals", &[object], k.boolean);
    virtual_method(table, object, "GetHashCode", &[], k.int32);
    ctor(table, object, &[]);

    virtual_method(table, comparable, "CompareTo", &[object], k.int32);
    virtual_method(table, disposable, "Dispose", &[], k.void);

    for (id, parse_ret) in [
        (k.boolean, k.boolean),
        (k.char, k.char),
        (k.sbyte, k.sbyte),
        (k.int16, k.int16),
        (k.int32, k.int32),
        (k.int64, k.int64),
        (k.single, k.single),
        (k.double, k.double),
    ] {
        table.get_mut(id).interfaces.push(comparable);
        method(table, id, STATIC, "Parse", &[k.string], parse_ret);
        virtual_method(table, id, "CompareTo", &[object], k.int32);
    }
    for (id, ty) in [
        (k.int16, k.int16),
        (k.int32, k.int32),
        (k.int64, k.int64),
        (k.single, k.single),
        (k.double, k.double),
    ] {
        field(table, id, "MaxValue", ty);
        field(table, id, "MinValue", ty);
    }

    let string = k.string;
    table.get_mut(string).interfaces.push(comparable);
    field(table, string, "Empty", string);
    method(table, string, STATIC, "Concat", &[string, string], string);
    method(table, string, STATIC, "Concat", &[object, object], string);
    method(table, string, STATIC, "IsNullOrEmpty", &[string], k.boolean);
    method(table, string, STATIC, "op_Equality", &[string, string], k.boolean);
    method(table, string, STATIC, "op_Inequality", &[string, string], k.boolean);
    method(table, string, INSTANCE, "ToUpper", &[], string);
    method(table, string, INSTANCE, "ToLower", &[], string);
    method(table, string, INSTANCE, "Trim", &[], string);
    method(table, string, INSTANCE, "Contains", &[string], k.boolean);
    method(table, string, INSTANCE, "Substring", &[k.int32, k.int32], string);
    method(table, string, INSTANCE, "get_Length", &[], k.int32);
    virtual_method(table, string, "CompareTo", &[object], k.int32);

    method(table, k.array, INSTANCE, "GetLength", &[k.int32], k.int32);
    method(table, k.array, INSTANCE, "get_Length", &[], k.int32);

    let math = k.math;
    field(table, math, "PI", k.double);
    field(table, math, "E", k.double);
    method(table, math, STATIC, "Abs", &[k.int32], k.int32);
    method(table, math, STATIC, "Abs", &[k.int64], k.int64);
    method(table, math, STATIC, "Abs", &[k.double], k.double);
    method(table, math, STATIC, "Max", &[k.int32, k.int32], k.int32);
    method(table, math, STATIC, "Max", &[k.double, k.double], k.double);
    method(table, math, STATIC, "Min", &[k.int32, k.int32], k.int32);
    method(table, math, STATIC, "Min", &[k.double, k.double], k.double);
    method(table, math, STATIC, "Pow", &[k.double, k.double], k.double);
    method(table, math, STATIC, "Sqrt", &[k.double], k.double);

    method(table, console, STATIC, "WriteLine", &[], k.void);
    method(table, console, STATIC, "WriteLine", &[string], k.void);
    method(table, console, STATIC, "WriteLine", &[k.int32], k.void);
    method(table, console, STATIC, "WriteLine", &[k.double], k.void);
    method(table, console, STATIC, "WriteLine", &[object], k.void);
    method(table, console, STATIC, "Write", &[string], k.void);
    method(table, console, STATIC, "Write", &[object], k.void);
    method(table, console, STATIC, "ReadLine", &[], string);

    ctor(table, decimal, &[k.int32]);
    ctor(table, decimal, &[k.double]);
    for name in ["op_Addition", "op_Subtraction", "op_Multiply", "op_Division"] {
        method(table, decimal, STATIC, name, &[decimal, decimal], decimal);
    }
    for name in [
        "op_Equality",
        "op_Inequality",
        "op_GreaterThan",
        "op_LessThan",
        "op_GreaterThanOrEqual",
        "op_LessThanOrEqual",
    ] {
        method(table, decimal, STATIC, name, &[decimal, decimal], k.boolean);
    }

    ctor(table, builder, &[]);
    ctor(table, builder, &[string]);
    method(table, builder, INSTANCE, "Append", &[string], builder);
    method(table, builder, INSTANCE, "Append", &[k.int32], builder);
    method(table, builder, INSTANCE, "Append", &[object], builder);
    virtual_method(table, builder, "ToString", &[], string);

    for (alias, id) in [
        ("object", object),
        ("void", k.void),
        ("bool", k.boolean),
        ("char", k.char),
        ("sbyte", k.sbyte),
        ("short", k.int16),
        ("int", k.int32),
        ("long", k.int64),
        ("float", k.single),
        ("double", k.double),
        ("string", k.string),
        ("decimal", decimal),
    ] {
        table.alias(alias, id);
    }

    known
}

fn host_type(
    table: &mut SymbolTable,
    namespace: &str,
    name: &str,
    category: TypeCategory,
    kind: ClassKind,
    base: Option<TypeId>,
) -> TypeId {
    let mut def = TypeDef::new(name, namespace, kind, Origin::Host);
    def.category = category;
    def.base = base;
    let full_name = def.full_name();
    // Host names are fixed and unique.
    match table.define(def) {
        Ok(id) => id,
        Err(_) => table.lookup(&full_name).unwrap_or_default(),
    }
}

fn value_type(table: &mut SymbolTable, name: &str, category: TypeCategory, object: TypeId) -> TypeId {
    host_type(table, SYSTEM, name, category, ClassKind::Struct, Some(object))
}

fn method(
    table: &mut SymbolTable,
    owner: TypeId,
    is_static: bool,
    name: &str,
    params: &[TypeId],
    ret: TypeId,
) {
    table.add_method(
        owner,
        MethodDef {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
            is_static,
            is_virtual: false,
            visibility: Visibility::Public,
            attrs: MethodAttrs::default(),
        },
    );
}

fn virtual_method(table: &mut SymbolTable, owner: TypeId, name: &str, params: &[TypeId], ret: TypeId) {
    table.add_method(
        owner,
        MethodDef {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
            is_static: false,
            is_virtual: true,
            visibility: Visibility::Public,
            attrs: MethodAttrs::default(),
        },
    );
}

fn field(table: &mut SymbolTable, owner: TypeId, name: &str, ty: TypeId) {
    table.add_field(
        owner,
        FieldDef {
            name: name.to_string(),
            ty,
            is_static: true,
            is_final: true,
            visibility: Visibility::Public,
        },
    );
}

fn ctor(table: &mut SymbolTable, owner: TypeId, params: &[TypeId]) {
    table.add_ctor(
        owner,
        CtorDef {
            params: params.to_vec(),
            visibility: Visibility::Public,
        },
    );
}
