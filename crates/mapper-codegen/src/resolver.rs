//! Binding resolution for target constructor parameters.
//!
//! Each field of a mapping function's return type is matched by name against
//! four tables, first match wins:
//!
//! 1. the function's own parameters
//! 2. the other functions of the unit, then the `self` methods of its base
//! 3. zero-argument accessor methods of the source type
//! 4. fields of the source type
//!
//! A field that matches nothing resolves to [`Binding::Unresolved`].

use crate::error::Diagnostic;
use crate::types::{Binding, MappingFunction, MappingUnit, Param, Passing, TypeDescriptor, TypeRef};

/// A target field together with where its value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField<'a> {
    pub param: &'a Param,
    pub binding: Binding,
}

/// A mapping function with every target constructor parameter bound.
#[derive(Debug, Clone)]
pub struct ResolvedFunction<'a> {
    pub function: &'a MappingFunction,
    /// The primary (source) parameter.
    pub source: &'a Param,
    pub target: &'a TypeRef,
    /// One entry per target constructor parameter, in declaration order.
    pub fields: Vec<ResolvedField<'a>>,
}

impl<'a> ResolvedFunction<'a> {
    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedField<'a>> {
        self.fields.iter().filter(|f| !f.binding.is_resolved())
    }

    pub(crate) fn diagnostics(&self, unit: &str) -> Vec<Diagnostic> {
        self.unresolved()
            .map(|field| Diagnostic {
                unit: unit.to_string(),
                function: self.function.name.clone(),
                target: self.target.name.clone(),
                parameter: field.param.name.clone(),
            })
            .collect()
    }

    /// A sibling that needs `&mut` access to a source only borrowed shared.
    pub(crate) fn conflicting_sibling(&self) -> Option<&str> {
        if self.source.ty.passing != Passing::Shared {
            return None;
        }
        self.fields.iter().find_map(|field| match &field.binding {
            Binding::SiblingCall {
                function,
                pass_source: Some(Passing::Exclusive),
            } => Some(function.as_str()),
            _ => None,
        })
    }
}

/// Resolves bindings for the functions of one mapping unit.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    unit: &'a MappingUnit,
    base: Option<&'a TypeDescriptor>,
}

impl<'a> Resolver<'a> {
    /// `base` is the descriptor of the unit's base struct, if it declares one.
    pub fn new(unit: &'a MappingUnit, base: Option<&'a TypeDescriptor>) -> Self {
        Self { unit, base }
    }

    /// Bind a single target constructor parameter.
    pub fn resolve(
        &self,
        function: &MappingFunction,
        source: &TypeDescriptor,
        param: &Param,
    ) -> Binding {
        let name = param.name.as_str();

        if function.params.iter().any(|p| p.name == name) {
            return Binding::ExplicitParameter(name.to_string());
        }

        if let Some(pass_source) = self.sibling_source(function, name) {
            return Binding::SiblingCall {
                function: name.to_string(),
                pass_source,
            };
        }

        if source.accessor(name).is_some() {
            return Binding::SourceAccessor(name.to_string());
        }

        if source.property(name).is_some() {
            return Binding::SourceProperty(name.to_string());
        }

        Binding::Unresolved
    }

    /// Bind every parameter of the target constructor.
    ///
    /// `source` is the function's first parameter and `source_type` its
    /// descriptor; `target` is the return type built from `constructor`.
    pub fn resolve_function(
        &self,
        function: &'a MappingFunction,
        source: &'a Param,
        source_type: &TypeDescriptor,
        target: &'a TypeRef,
        constructor: &'a [Param],
    ) -> ResolvedFunction<'a> {
        let fields = constructor
            .iter()
            .map(|param| ResolvedField {
                param,
                binding: self.resolve(function, source_type, param),
            })
            .collect();

        ResolvedFunction {
            function,
            source,
            target,
            fields,
        }
    }

    /// Look up the sibling called `name`. The inner value is how it takes
    /// the source, `None` when it has no parameters.
    fn sibling_source(&self, current: &MappingFunction, name: &str) -> Option<Option<Passing>> {
        let declared = self
            .unit
            .functions
            .iter()
            .find(|f| f.name == name && f.name != current.name && f.receiver.is_some())
            .map(|f| f.params.first().map(|p| p.ty.passing));

        declared.or_else(|| {
            self.base
                .and_then(|base| base.method(name))
                .map(|sig| sig.params.first().map(|p| p.ty.passing))
        })
    }
}
