//! Data model shared by the resolver and the emitter.

use std::collections::BTreeMap;
use std::fmt;

/// Identifies the module a declaration was read from.
///
/// For sources added from disk this is the file path, which is what a build
/// script hands to `cargo:rerun-if-changed`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Module id used for sources added from a string.
    pub fn inline() -> Self {
        Self("<inline>".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a value is passed: by value, by shared reference or by mutable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Passing {
    #[default]
    Owned,
    Shared,
    Exclusive,
}

/// A reference to a type as it appears in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Name used to look the type up in the descriptor registry
    /// (e.g., `"StudentEntity"` for `&crate::model::StudentEntity`).
    pub name: String,
    /// The type as spelled in source, without the outer reference
    /// (e.g., `"crate::model::StudentEntity"`).
    pub source: String,
    /// Whether the outer type is a reference.
    pub passing: Passing,
}

impl TypeRef {
    /// A type whose source spelling is its lookup name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
            passing: Passing::Owned,
        }
    }

    /// A type looked up as `name` but spelled `source` in generated code.
    pub fn with_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            passing: Passing::Owned,
        }
    }

    /// Borrow this type: `T` becomes `&T`.
    pub fn by_ref(mut self) -> Self {
        self.passing = Passing::Shared;
        self
    }

    /// Mutably borrow this type: `T` becomes `&mut T`.
    pub fn by_mut(mut self) -> Self {
        self.passing = Passing::Exclusive;
        self
    }

    pub fn is_borrowed(&self) -> bool {
        self.passing != Passing::Owned
    }

    /// Render the type for use in a signature.
    pub fn render(&self) -> String {
        match self.passing {
            Passing::Owned => self.source.clone(),
            Passing::Shared => format!("&{}", self.source),
            Passing::Exclusive => format!("&mut {}", self.source),
        }
    }

    /// The receiver a method on this type takes to mirror how it is passed.
    pub fn receiver(&self) -> Receiver {
        match self.passing {
            Passing::Owned => Receiver::Value,
            Passing::Shared => Receiver::Ref,
            Passing::Exclusive => Receiver::RefMut,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A `self` receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// `self`
    Value,
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
}

impl Receiver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Receiver::Value => "self",
            Receiver::Ref => "&self",
            Receiver::RefMut => "&mut self",
        }
    }
}

/// A named, typed parameter (or struct field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Signature of a method with a `self` receiver. The receiver is not part of `params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub params: Vec<Param>,
    pub returns: Option<TypeRef>,
}

/// The accessible members of a type, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    /// Where the type is declared.
    pub module: ModuleId,
    /// Named fields in declaration order, i.e. the struct literal.
    /// `None` for types without one (tuple structs, enums).
    pub constructor: Option<Vec<Param>>,
    pub properties: BTreeMap<String, TypeRef>,
    pub methods: BTreeMap<String, MethodSig>,
}

impl TypeDescriptor {
    /// A descriptor with no constructor and no members.
    pub fn new(name: impl Into<String>, module: impl Into<ModuleId>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            constructor: None,
            properties: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// A struct with named fields: each field is both a constructor parameter
    /// and a property.
    ///
    /// # Example
    ///
    /// ```
    /// use mapper_codegen::{TypeDescriptor, TypeRef};
    ///
    /// let entity = TypeDescriptor::record("StudentEntity", "src/model.rs", &[
    ///     ("first_name", TypeRef::named("String")),
    ///     ("last_name", TypeRef::named("String")),
    /// ]);
    /// assert!(entity.property("first_name").is_some());
    /// assert_eq!(entity.constructor_parameters().map(|c| c.len()), Some(2));
    /// ```
    pub fn record(
        name: impl Into<String>,
        module: impl Into<ModuleId>,
        fields: &[(impl AsRef<str>, TypeRef)],
    ) -> Self {
        let mut descriptor = Self::new(name, module);
        let fields: Vec<_> = fields
            .iter()
            .map(|(n, t)| Param::new(n.as_ref(), t.clone()))
            .collect();
        for field in &fields {
            descriptor
                .properties
                .insert(field.name.clone(), field.ty.clone());
        }
        descriptor.constructor = Some(fields);
        descriptor
    }

    /// Add a method with a `self` receiver.
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        returns: Option<TypeRef>,
    ) -> Self {
        self.methods
            .insert(name.into(), MethodSig { params, returns });
        self
    }

    /// Add a zero-argument accessor method.
    pub fn with_accessor(self, name: impl Into<String>, returns: TypeRef) -> Self {
        self.with_method(name, Vec::new(), Some(returns))
    }

    /// Add a property that is not part of the constructor.
    pub fn with_property(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    pub fn constructor_parameters(&self) -> Option<&[Param]> {
        self.constructor.as_deref()
    }

    /// Look up a zero-argument accessor method returning a value.
    pub fn accessor(&self, name: &str) -> Option<&TypeRef> {
        self.methods
            .get(name)
            .filter(|sig| sig.params.is_empty())
            .and_then(|sig| sig.returns.as_ref())
    }

    pub fn property(&self, name: &str) -> Option<&TypeRef> {
        self.properties.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.get(name)
    }
}

/// Whether a unit's function is generated or already implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// A required trait method; the generator implements it.
    Abstract,
    /// A trait method with a default body; only used as a sibling.
    Provided,
}

/// A function declared by a mapping unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFunction {
    pub name: String,
    pub receiver: Option<Receiver>,
    /// `params[0]` is the source instance; the rest are extra inputs.
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    pub kind: FunctionKind,
}

impl MappingFunction {
    /// An abstract `&self` mapping function.
    ///
    /// # Example
    ///
    /// ```
    /// use mapper_codegen::{MappingFunction, Param, TypeRef};
    ///
    /// let to_dto = MappingFunction::mapping(
    ///     "to_dto",
    ///     vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
    ///     TypeRef::named("StudentDto"),
    /// );
    /// assert_eq!(to_dto.source().map(|p| p.name.as_str()), Some("entity"));
    /// ```
    pub fn mapping(name: impl Into<String>, params: Vec<Param>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            receiver: Some(Receiver::Ref),
            params,
            return_type: Some(return_type),
            kind: FunctionKind::Abstract,
        }
    }

    /// A `&self` function with a default body.
    pub fn provided(
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<TypeRef>,
    ) -> Self {
        Self {
            name: name.into(),
            receiver: Some(Receiver::Ref),
            params,
            return_type,
            kind: FunctionKind::Provided,
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.kind == FunctionKind::Abstract
    }

    /// The primary (source) parameter.
    pub fn source(&self) -> Option<&Param> {
        self.params.first()
    }

    /// Parameters after the source.
    pub fn extra_params(&self) -> &[Param] {
        self.params.get(1..).unwrap_or(&[])
    }
}

/// One annotated mapping declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingUnit {
    /// Trait name.
    pub name: String,
    pub module: ModuleId,
    /// Visibility of the trait, reused for generated items (`"pub"`, `"pub(crate)"`, `""`).
    pub visibility: String,
    pub generate_wrapper: bool,
    /// The struct whose fields make up the primary constructor.
    pub base: Option<TypeRef>,
    /// Overrides the `{name}{suffix}` implementation name.
    pub impl_name: Option<String>,
    pub functions: Vec<MappingFunction>,
}

impl MappingUnit {
    pub fn new(name: impl Into<String>, module: impl Into<ModuleId>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            visibility: "pub".to_string(),
            generate_wrapper: false,
            base: None,
            impl_name: None,
            functions: Vec::new(),
        }
    }

    pub fn with_function(mut self, function: MappingFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_wrappers(mut self, enabled: bool) -> Self {
        self.generate_wrapper = enabled;
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = visibility.into();
        self
    }

    pub fn with_impl_name(mut self, name: impl Into<String>) -> Self {
        self.impl_name = Some(name.into());
        self
    }

    /// The functions the generator implements.
    pub fn abstract_functions(&self) -> impl Iterator<Item = &MappingFunction> {
        self.functions.iter().filter(|f| f.is_abstract())
    }

    pub fn function(&self, name: &str) -> Option<&MappingFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Where a target constructor parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A parameter of the mapping function itself.
    ExplicitParameter(String),
    /// Another function of the unit (or of its base).
    ///
    /// `pass_source` is how the sibling takes its first parameter, which
    /// receives the source; `None` when it has no parameters.
    SiblingCall {
        function: String,
        pass_source: Option<Passing>,
    },
    /// A zero-argument method on the source.
    SourceAccessor(String),
    /// A field of the source.
    SourceProperty(String),
    /// No origin found; the field takes the target's `Default` value.
    Unresolved,
}

impl Binding {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Binding::Unresolved)
    }
}

/// Whether the generated implementation needs construction arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplShape {
    /// Built with `new(..)` from the base constructor parameters.
    Instance,
    /// A unit struct; the value itself is the shared instance.
    Singleton,
}

impl ImplShape {
    pub fn for_constructor(params: &[Param]) -> Self {
        if params.is_empty() {
            ImplShape::Singleton
        } else {
            ImplShape::Instance
        }
    }
}

/// Convert a `CamelCase` identifier to `snake_case`.
pub(crate) fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a `snake_case` identifier to `CamelCase`.
pub(crate) fn to_camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
