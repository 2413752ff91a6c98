//! Java-flavored type model and type algebra shared by the Vega crates.
//!
//! The model is intentionally small: enough of the Java type system (classes,
//! interfaces, primitives, arrays, wildcards, type variables and inference
//! variables) for generic-method inference over poly expressions. Lookups are
//! best-effort and never panic: missing class metadata simply yields `None` or
//! a lenient answer.

mod env;
mod helpers;
mod subtyping;

pub use env::TyContext;
pub use helpers::{
    collect_infer_vars, erasure, is_proper, map_infer_vars, sam_signature, substitute,
    SamSignature,
};
pub use subtyping::{
    glb, instantiate_as_supertype, is_assignable_loose, is_subtype, lub, widens_to,
};

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a class or interface definition inside a [`TypeStore`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub(crate) u32);

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Identifies a declared type parameter (class- or method-level).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVarId(pub(crate) u32);

impl fmt::Debug for TypeVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeVarId({})", self.0)
    }
}

/// Identifies an inference variable within one inference problem.
///
/// Inference variables are allocated by the solver's bound set; the type model
/// only needs to be able to embed them so that properness can be tested.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InferVarId(u32);

impl InferVarId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InferVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{3b1}{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Char,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
    ];

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Boolean)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WildcardBound {
    Unbounded,
    Extends(Box<Type>),
    Super(Box<Type>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassType {
    pub def: ClassId,
    pub args: Vec<Type>,
}

/// A Java type. Exactly one variant is ever active; a *proper* type mentions
/// no [`Type::Infer`] transitively (see [`is_proper`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Class(ClassType),
    Array(Box<Type>),
    Primitive(PrimitiveType),
    TypeVar(TypeVarId),
    Infer(InferVarId),
    Wildcard(WildcardBound),
    Intersection(Vec<Type>),
    Null,
    Void,
    Unknown,
    Error,
}

impl Type {
    pub fn class(def: ClassId, args: Vec<Type>) -> Type {
        Type::Class(ClassType { def, args })
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Class(_) | Type::Array(_) | Type::TypeVar(_) | Type::Intersection(_) | Type::Null
        )
    }

    pub fn is_errorish(&self) -> bool {
        matches!(self, Type::Unknown | Type::Error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParamDef {
    pub name: String,
    pub upper_bounds: Vec<Type>,
    pub lower_bound: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub type_params: Vec<TypeVarId>,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub throws: Vec<Type>,
    pub is_static: bool,
    pub is_varargs: bool,
    pub is_abstract: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub kind: ClassKind,
    pub type_params: Vec<TypeVarId>,
    pub super_class: Option<Type>,
    pub interfaces: Vec<Type>,
    pub constructors: Vec<MethodDef>,
    pub methods: Vec<MethodDef>,
}

/// Frequently needed JDK classes, resolved once when the store is built.
#[derive(Clone, Debug)]
pub struct WellKnownTypes {
    pub object: ClassId,
    pub string: ClassId,
    pub number: ClassId,
    pub integer: ClassId,
    pub cloneable: ClassId,
    pub serializable: ClassId,
    pub throwable: ClassId,
    pub exception: ClassId,
    pub runtime_exception: ClassId,
    pub runnable: ClassId,
    pub list: ClassId,
    pub array_list: ClassId,
    pub function: ClassId,
    pub supplier: ClassId,
    pub consumer: ClassId,
    wrappers: [ClassId; 8],
}

impl WellKnownTypes {
    pub fn wrapper(&self, p: PrimitiveType) -> ClassId {
        self.wrappers[p as usize]
    }
}

/// Read-only view over class and type parameter definitions.
pub trait TypeEnv {
    fn class(&self, id: ClassId) -> Option<&ClassDef>;
    fn type_param(&self, id: TypeVarId) -> Option<&TypeParamDef>;
    fn lookup_class(&self, name: &str) -> Option<ClassId>;
    fn well_known(&self) -> &WellKnownTypes;
}

/// The wrapper class for a primitive type (JLS 5.1.7).
pub fn wrapper_class(env: &dyn TypeEnv, p: PrimitiveType) -> ClassId {
    env.well_known().wrapper(p)
}

/// The primitive a wrapper class unboxes to, if `id` is a wrapper (JLS 5.1.8).
pub fn unboxed_primitive(env: &dyn TypeEnv, id: ClassId) -> Option<PrimitiveType> {
    PrimitiveType::ALL
        .into_iter()
        .find(|p| env.well_known().wrapper(*p) == id)
}

/// Owning store of class and type parameter definitions.
pub struct TypeStore {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, ClassId>,
    type_params: Vec<TypeParamDef>,
    well_known: WellKnownTypes,
}

impl TypeStore {
    /// A store pre-seeded with the small slice of the JDK that the inference
    /// engine and its tests lean on.
    pub fn with_minimal_jdk() -> Self {
        let mut classes: Vec<ClassDef> = Vec::new();
        let mut by_name: HashMap<String, ClassId> = HashMap::new();
        let mut type_params: Vec<TypeParamDef> = Vec::new();

        let add_tp = |type_params: &mut Vec<TypeParamDef>, name: &str, bounds: Vec<Type>| {
            let id = TypeVarId(type_params.len() as u32);
            type_params.push(TypeParamDef {
                name: name.to_string(),
                upper_bounds: bounds,
                lower_bound: None,
            });
            id
        };
        let add = |classes: &mut Vec<ClassDef>,
                       by_name: &mut HashMap<String, ClassId>,
                       def: ClassDef| {
            let id = ClassId(classes.len() as u32);
            by_name.insert(def.name.clone(), id);
            classes.push(def);
            id
        };

        let plain_class = |name: &str, super_class: Option<Type>| ClassDef {
            name: name.to_string(),
            kind: ClassKind::Class,
            type_params: vec![],
            super_class,
            interfaces: vec![],
            constructors: vec![],
            methods: vec![],
        };
        let marker_interface = |name: &str| ClassDef {
            name: name.to_string(),
            kind: ClassKind::Interface,
            type_params: vec![],
            super_class: None,
            interfaces: vec![],
            constructors: vec![],
            methods: vec![],
        };

        let object = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.lang.Object".to_string(),
                kind: ClassKind::Class,
                type_params: vec![],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![],
            },
        );
        let obj = || Type::class(object, vec![]);

        let cloneable = add(&mut classes, &mut by_name, marker_interface("java.lang.Cloneable"));
        let serializable = add(&mut classes, &mut by_name, marker_interface("java.io.Serializable"));

        let string = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.lang.String".to_string(),
                kind: ClassKind::Class,
                type_params: vec![],
                super_class: Some(obj()),
                interfaces: vec![Type::class(serializable, vec![])],
                constructors: vec![],
                methods: vec![
                    MethodDef {
                        name: "length".to_string(),
                        type_params: vec![],
                        params: vec![],
                        return_type: Type::Primitive(PrimitiveType::Int),
                        throws: vec![],
                        is_static: false,
                        is_varargs: false,
                        is_abstract: false,
                    },
                    MethodDef {
                        name: "isEmpty".to_string(),
                        type_params: vec![],
                        params: vec![],
                        return_type: Type::Primitive(PrimitiveType::Boolean),
                        throws: vec![],
                        is_static: false,
                        is_varargs: false,
                        is_abstract: false,
                    },
                ],
            },
        );

        let number = add(&mut classes, &mut by_name, plain_class("java.lang.Number", Some(obj())));

        let mut wrappers = [object; 8];
        for p in PrimitiveType::ALL {
            let (name, superclass) = match p {
                PrimitiveType::Boolean => ("java.lang.Boolean", obj()),
                PrimitiveType::Byte => ("java.lang.Byte", Type::class(number, vec![])),
                PrimitiveType::Short => ("java.lang.Short", Type::class(number, vec![])),
                PrimitiveType::Char => ("java.lang.Character", obj()),
                PrimitiveType::Int => ("java.lang.Integer", Type::class(number, vec![])),
                PrimitiveType::Long => ("java.lang.Long", Type::class(number, vec![])),
                PrimitiveType::Float => ("java.lang.Float", Type::class(number, vec![])),
                PrimitiveType::Double => ("java.lang.Double", Type::class(number, vec![])),
            };
            wrappers[p as usize] = add(&mut classes, &mut by_name, plain_class(name, Some(superclass)));
        }
        let integer = wrappers[PrimitiveType::Int as usize];

        // Integer.parseInt / Integer.valueOf give tests an overloaded,
        // partially generic-free lookup target.
        {
            let string_ty = Type::class(string, vec![]);
            let integer_def = &mut classes[integer.0 as usize];
            integer_def.methods.push(MethodDef {
                name: "parseInt".to_string(),
                type_params: vec![],
                params: vec![string_ty.clone()],
                return_type: Type::Primitive(PrimitiveType::Int),
                throws: vec![],
                is_static: true,
                is_varargs: false,
                is_abstract: false,
            });
            integer_def.methods.push(MethodDef {
                name: "valueOf".to_string(),
                type_params: vec![],
                params: vec![string_ty],
                return_type: Type::class(integer, vec![]),
                throws: vec![],
                is_static: true,
                is_varargs: false,
                is_abstract: false,
            });
            integer_def.methods.push(MethodDef {
                name: "valueOf".to_string(),
                type_params: vec![],
                params: vec![Type::Primitive(PrimitiveType::Int)],
                return_type: Type::class(integer, vec![]),
                throws: vec![],
                is_static: true,
                is_varargs: false,
                is_abstract: false,
            });
        }

        let throwable = add(&mut classes, &mut by_name, plain_class("java.lang.Throwable", Some(obj())));
        let exception = add(
            &mut classes,
            &mut by_name,
            plain_class("java.lang.Exception", Some(Type::class(throwable, vec![]))),
        );
        let runtime_exception = add(
            &mut classes,
            &mut by_name,
            plain_class("java.lang.RuntimeException", Some(Type::class(exception, vec![]))),
        );

        let runnable = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.lang.Runnable".to_string(),
                kind: ClassKind::Interface,
                type_params: vec![],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![MethodDef {
                    name: "run".to_string(),
                    type_params: vec![],
                    params: vec![],
                    return_type: Type::Void,
                    throws: vec![],
                    is_static: false,
                    is_varargs: false,
                    is_abstract: true,
                }],
            },
        );

        let list_e = add_tp(&mut type_params, "E", vec![obj()]);
        let list = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.util.List".to_string(),
                kind: ClassKind::Interface,
                type_params: vec![list_e],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![
                    MethodDef {
                        name: "size".to_string(),
                        type_params: vec![],
                        params: vec![],
                        return_type: Type::Primitive(PrimitiveType::Int),
                        throws: vec![],
                        is_static: false,
                        is_varargs: false,
                        is_abstract: true,
                    },
                    MethodDef {
                        name: "get".to_string(),
                        type_params: vec![],
                        params: vec![Type::Primitive(PrimitiveType::Int)],
                        return_type: Type::TypeVar(list_e),
                        throws: vec![],
                        is_static: false,
                        is_varargs: false,
                        is_abstract: true,
                    },
                    MethodDef {
                        name: "add".to_string(),
                        type_params: vec![],
                        params: vec![Type::TypeVar(list_e)],
                        return_type: Type::Primitive(PrimitiveType::Boolean),
                        throws: vec![],
                        is_static: false,
                        is_varargs: false,
                        is_abstract: true,
                    },
                ],
            },
        );

        let array_list_e = add_tp(&mut type_params, "E", vec![obj()]);
        let array_list = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.util.ArrayList".to_string(),
                kind: ClassKind::Class,
                type_params: vec![array_list_e],
                super_class: Some(obj()),
                interfaces: vec![Type::class(list, vec![Type::TypeVar(array_list_e)])],
                constructors: vec![MethodDef {
                    name: "<init>".to_string(),
                    type_params: vec![],
                    params: vec![],
                    return_type: Type::Void,
                    throws: vec![],
                    is_static: false,
                    is_varargs: false,
                    is_abstract: false,
                }],
                methods: vec![],
            },
        );

        let function_t = add_tp(&mut type_params, "T", vec![obj()]);
        let function_r = add_tp(&mut type_params, "R", vec![obj()]);
        let function = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.util.function.Function".to_string(),
                kind: ClassKind::Interface,
                type_params: vec![function_t, function_r],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![MethodDef {
                    name: "apply".to_string(),
                    type_params: vec![],
                    params: vec![Type::TypeVar(function_t)],
                    return_type: Type::TypeVar(function_r),
                    throws: vec![],
                    is_static: false,
                    is_varargs: false,
                    is_abstract: true,
                }],
            },
        );

        let supplier_t = add_tp(&mut type_params, "T", vec![obj()]);
        let supplier = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.util.function.Supplier".to_string(),
                kind: ClassKind::Interface,
                type_params: vec![supplier_t],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![MethodDef {
                    name: "get".to_string(),
                    type_params: vec![],
                    params: vec![],
                    return_type: Type::TypeVar(supplier_t),
                    throws: vec![],
                    is_static: false,
                    is_varargs: false,
                    is_abstract: true,
                }],
            },
        );

        let consumer_t = add_tp(&mut type_params, "T", vec![obj()]);
        let consumer = add(
            &mut classes,
            &mut by_name,
            ClassDef {
                name: "java.util.function.Consumer".to_string(),
                kind: ClassKind::Interface,
                type_params: vec![consumer_t],
                super_class: None,
                interfaces: vec![],
                constructors: vec![],
                methods: vec![MethodDef {
                    name: "accept".to_string(),
                    type_params: vec![],
                    params: vec![Type::TypeVar(consumer_t)],
                    return_type: Type::Void,
                    throws: vec![],
                    is_static: false,
                    is_varargs: false,
                    is_abstract: true,
                }],
            },
        );

        TypeStore {
            classes,
            by_name,
            type_params,
            well_known: WellKnownTypes {
                object,
                string,
                number,
                integer,
                cloneable,
                serializable,
                throwable,
                exception,
                runtime_exception,
                runnable,
                list,
                array_list,
                function,
                supplier,
                consumer,
                wrappers,
            },
        }
    }

    pub fn add_class(&mut self, def: ClassDef) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.classes.push(def);
        id
    }

    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut ClassDef> {
        self.classes.get_mut(id.0 as usize)
    }

    pub fn add_type_param(&mut self, name: &str, upper_bounds: Vec<Type>) -> TypeVarId {
        let id = TypeVarId(self.type_params.len() as u32);
        self.type_params.push(TypeParamDef {
            name: name.to_string(),
            upper_bounds,
            lower_bound: None,
        });
        id
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }
}

impl TypeEnv for TypeStore {
    fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.0 as usize)
    }

    fn type_param(&self, id: TypeVarId) -> Option<&TypeParamDef> {
        if id.context_local_index().is_some() {
            return None;
        }
        self.type_params.get(id.0 as usize)
    }

    fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.class_id(name)
    }

    fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }
}
