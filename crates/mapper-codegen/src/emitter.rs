//! Rust source emission for resolved mapping units.

use crate::resolver::ResolvedFunction;
use crate::types::{
    Binding, ImplShape, MappingFunction, MappingUnit, Param, Passing, Receiver, TypeDescriptor,
    TypeRef, to_camel_case,
};

/// Renders the implementation and wrapper items of one mapping unit.
#[derive(Debug, Clone)]
pub struct Emitter<'a> {
    unit: &'a MappingUnit,
    impl_name: String,
    shape: ImplShape,
    base: Option<(&'a TypeRef, &'a [Param])>,
}

impl<'a> Emitter<'a> {
    /// `base` pairs the unit's base type with its constructor parameters.
    pub fn new(
        unit: &'a MappingUnit,
        impl_name: impl Into<String>,
        base: Option<(&'a TypeRef, &'a [Param])>,
    ) -> Self {
        let shape = base
            .map(|(_, params)| ImplShape::for_constructor(params))
            .unwrap_or(ImplShape::Singleton);
        Self {
            unit,
            impl_name: impl_name.into(),
            shape,
            base,
        }
    }

    /// Build an emitter from the unit's base descriptor.
    ///
    /// The base must have a constructor; the generation pass rejects the unit
    /// before emission otherwise.
    pub fn for_base(
        unit: &'a MappingUnit,
        impl_name: impl Into<String>,
        base: Option<&'a TypeDescriptor>,
    ) -> Self {
        let base = unit
            .base
            .as_ref()
            .zip(base.and_then(TypeDescriptor::constructor_parameters));
        Self::new(unit, impl_name, base)
    }

    pub fn shape(&self) -> ImplShape {
        self.shape
    }

    pub fn impl_name(&self) -> &str {
        &self.impl_name
    }

    /// The implementation type, its constructor, and the trait impl.
    pub fn emit_implementation(&self, functions: &[ResolvedFunction<'_>]) -> String {
        let mut output = String::new();
        let vis = visibility_prefix(&self.unit.visibility);
        let name = &self.impl_name;

        match (self.shape, self.base) {
            (ImplShape::Instance, Some((base, params))) => {
                if self.unit.generate_wrapper {
                    output.push_str("#[derive(Default)]\n");
                }
                output.push_str(&format!("{vis}struct {name} {{\n"));
                output.push_str(&format!("    base: {},\n", base.source));
                output.push_str("}\n\n");

                let args: Vec<_> = params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty.render()))
                    .collect();
                let fields: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
                output.push_str(&format!("impl {name} {{\n"));
                output.push_str(&format!("    {vis}fn new({}) -> Self {{\n", args.join(", ")));
                output.push_str(&format!(
                    "        Self {{ base: {} {{ {} }} }}\n",
                    literal_path(&base.source),
                    fields.join(", ")
                ));
                output.push_str("    }\n");
                output.push_str("}\n\n");
            }
            _ => {
                output.push_str("#[derive(Debug, Clone, Copy, Default)]\n");
                output.push_str(&format!("{vis}struct {name};\n\n"));
            }
        }

        if let Some((base, _)) = self.base {
            let target = match self.shape {
                ImplShape::Instance => "&self.base".to_string(),
                ImplShape::Singleton => format!("&{} {{}}", literal_path(&base.source)),
            };
            output.push_str(&format!("impl std::ops::Deref for {name} {{\n"));
            output.push_str(&format!("    type Target = {};\n\n", base.source));
            output.push_str("    fn deref(&self) -> &Self::Target {\n");
            output.push_str(&format!("        {target}\n"));
            output.push_str("    }\n");
            output.push_str("}\n\n");
        }

        output.push_str(&format!("impl {} for {name} {{\n", self.unit.name));
        for (i, resolved) in functions.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            output.push_str(&self.emit_function(resolved));
        }
        output.push_str("}\n");

        output
    }

    /// One `<Unit><Function>Ext` trait per function, implemented on the source type.
    pub fn emit_wrappers(&self, functions: &[ResolvedFunction<'_>]) -> String {
        let blocks: Vec<_> = functions.iter().map(|f| self.emit_wrapper(f)).collect();
        blocks.join("\n")
    }

    fn emit_function(&self, resolved: &ResolvedFunction<'_>) -> String {
        let function = resolved.function;
        let receiver = function.receiver.unwrap_or(Receiver::Ref);
        let source = resolved.source;
        let owned = source.ty.passing == Passing::Owned;

        // Moving a field out of an owned source ends every other use of it,
        // so those uses are bound to locals ahead of the literal.
        let moves_fields = owned
            && resolved
                .fields
                .iter()
                .any(|f| matches!(f.binding, Binding::SourceProperty(_)));
        let mut_source = owned
            && resolved.fields.iter().any(|f| {
                matches!(
                    f.binding,
                    Binding::SiblingCall {
                        pass_source: Some(Passing::Exclusive),
                        ..
                    }
                )
            });

        let mut params = vec![receiver.as_str().to_string()];
        for (i, param) in function.params.iter().enumerate() {
            let binding = if i == 0 && mut_source { "mut " } else { "" };
            params.push(format!("{binding}{}: {}", param.name, param.ty.render()));
        }

        let mut output = String::new();
        output.push_str(&format!(
            "    fn {}({}) -> {} {{\n",
            function.name,
            params.join(", "),
            resolved.target.render()
        ));

        let mut locals = 0;
        let mut fields = Vec::new();
        for field in &resolved.fields {
            let Some(expr) = render_binding(&field.binding, source) else {
                continue;
            };
            let name = &field.param.name;
            if moves_fields && uses_source(&field.binding) {
                output.push_str(&format!("        let {name} = {expr};\n"));
                locals += 1;
                fields.push(name.clone());
            } else if expr == *name {
                fields.push(expr);
            } else {
                fields.push(format!("{name}: {expr}"));
            }
        }

        // Unresolved fields fall back to the target's `Default`
        let rest = resolved
            .unresolved()
            .next()
            .map(|_| "            ..Default::default()\n");

        let target = literal_path(&resolved.target.source);
        if fields.is_empty() && rest.is_none() {
            output.push_str(&format!("        {target} {{}}\n"));
        } else {
            output.push_str(&format!("        {target} {{\n"));
            for field in &fields {
                output.push_str(&format!("            {field},\n"));
            }
            output.push_str(rest.unwrap_or_default());
            output.push_str("        }\n");
        }
        output.push_str("    }\n");

        tracing::trace!(
            unit = %self.unit.name,
            function = %function.name,
            source = %source.name,
            fields = fields.len(),
            locals,
            "emitted mapping function"
        );
        output
    }

    fn emit_wrapper(&self, resolved: &ResolvedFunction<'_>) -> String {
        let function = resolved.function;
        let vis = visibility_prefix(&self.unit.visibility);
        let trait_name = wrapper_trait_name(&self.unit.name, function);
        let receiver = resolved.source.ty.receiver();
        let params = signature_params(receiver.as_str(), function.extra_params());
        let ret = resolved.target.render();

        let mut args = vec![
            self.instance_arg(function.receiver.unwrap_or(Receiver::Ref)),
            "self".to_string(),
        ];
        args.extend(function.extra_params().iter().map(|p| p.name.clone()));

        let mut output = String::new();
        output.push_str(&format!("{vis}trait {trait_name} {{\n"));
        output.push_str(&format!("    fn {}({params}) -> {ret};\n", function.name));
        output.push_str("}\n\n");
        output.push_str(&format!(
            "impl {trait_name} for {} {{\n",
            resolved.source.ty.source
        ));
        output.push_str(&format!("    fn {}({params}) -> {ret} {{\n", function.name));
        output.push_str(&format!(
            "        {}::{}({})\n",
            self.unit.name,
            function.name,
            args.join(", ")
        ));
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }

    /// The implementation value handed to the trait method as its receiver.
    fn instance_arg(&self, receiver: Receiver) -> String {
        let instance = match self.shape {
            ImplShape::Singleton => self.impl_name.clone(),
            ImplShape::Instance => format!("{}::default()", self.impl_name),
        };
        match receiver {
            Receiver::Value => instance,
            Receiver::Ref => format!("&{instance}"),
            Receiver::RefMut => format!("&mut {instance}"),
        }
    }
}

/// The value expression for a binding, or `None` for an unresolved field.
fn render_binding(binding: &Binding, source: &Param) -> Option<String> {
    let expr = match binding {
        Binding::ExplicitParameter(name) => name.clone(),
        Binding::SiblingCall {
            function,
            pass_source: Some(passing),
        } => format!("self.{function}({})", source_argument(source, *passing)),
        Binding::SiblingCall {
            function,
            pass_source: None,
        } => format!("self.{function}()"),
        Binding::SourceAccessor(method) => format!("{}.{method}()", source.name),
        Binding::SourceProperty(field) if source.ty.is_borrowed() => {
            format!("{}.{field}.clone()", source.name)
        }
        Binding::SourceProperty(field) => format!("{}.{field}", source.name),
        Binding::Unresolved => return None,
    };
    Some(expr)
}

/// The source as the argument of a sibling that takes it by `passing`.
///
/// A shared source never reaches a `&mut` parameter; such units are
/// rejected before emission.
fn source_argument(source: &Param, passing: Passing) -> String {
    let name = &source.name;
    match (source.ty.passing, passing) {
        (_, Passing::Owned) => format!("{name}.clone()"),
        (Passing::Owned, Passing::Shared) => format!("&{name}"),
        (Passing::Owned, Passing::Exclusive) => format!("&mut {name}"),
        _ => name.clone(),
    }
}

fn uses_source(binding: &Binding) -> bool {
    matches!(
        binding,
        Binding::SourceAccessor(_)
            | Binding::SiblingCall {
                pass_source: Some(_),
                ..
            }
    )
}

/// Name of the wrapper trait for `function`.

pub(crate) fn wrapper_trait_name(unit: &str, function: &MappingFunction) -> String {
    format!("{unit}{}Ext", to_camel_case(&function.name))
}

fn visibility_prefix(visibility: &str) -> String {
    if visibility.is_empty() {
        String::new()
    } else {
        format!("{visibility} ")
    }
}

fn signature_params(receiver: &str, params: &[Param]) -> String {
    let mut parts = vec![receiver.to_string()];
    parts.extend(params.iter().map(|p| format!("{}: {}", p.name, p.ty.render())));
    parts.join(", ")
}

/// The path of a type as used in a struct literal, without generic arguments.
fn literal_path(source: &str) -> &str {
    source.split('<').next().unwrap_or(source).trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;

    fn entity() -> TypeDescriptor {
        TypeDescriptor::record(
            "StudentEntity",
            "src/model.rs",
            &[
                ("first_name", TypeRef::named("String")),
                ("last_name", TypeRef::named("String")),
                ("mat_nr", TypeRef::named("String")),
            ],
        )
    }

    fn dto_fields() -> Vec<Param> {
        vec![
            Param::new("first_name", TypeRef::named("String")),
            Param::new("last_name", TypeRef::named("String")),
            Param::new("mat_nr", TypeRef::named("String")),
        ]
    }

    fn student_mapper() -> MappingUnit {
        MappingUnit::new("StudentMapper", "src/mapper.rs").with_function(MappingFunction::mapping(
            "to_dto",
            vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
            TypeRef::named("StudentDto"),
        ))
    }

    fn resolve_all<'a>(
        unit: &'a MappingUnit,
        base: Option<&'a TypeDescriptor>,
        source: &TypeDescriptor,
        target: &'a [Param],
    ) -> Vec<ResolvedFunction<'a>> {
        let resolver = Resolver::new(unit, base);
        unit.abstract_functions()
            .map(|f| {
                resolver.resolve_function(
                    f,
                    f.source().unwrap(),
                    source,
                    f.return_type.as_ref().unwrap(),
                    target,
                )
            })
            .collect()
    }

    fn emit(unit: &MappingUnit, source: &TypeDescriptor, target: &[Param]) -> (String, String) {
        let functions = resolve_all(unit, None, source, target);
        let emitter = Emitter::new(unit, format!("{}Impl", unit.name), None);
        (
            emitter.emit_implementation(&functions),
            emitter.emit_wrappers(&functions),
        )
    }

    #[test]
    fn test_singleton_with_property_bindings() {
        let unit = student_mapper();
        let target = dto_fields();
        let (code, _) = emit(&unit, &entity(), &target);

        assert!(code.contains("#[derive(Debug, Clone, Copy, Default)]\npub struct StudentMapperImpl;"));
        assert!(code.contains("impl StudentMapper for StudentMapperImpl {"));
        assert!(code.contains("fn to_dto(&self, entity: &StudentEntity) -> StudentDto {"));
        assert!(code.contains("first_name: entity.first_name.clone(),"));
        assert!(code.contains("last_name: entity.last_name.clone(),"));
        assert!(code.contains("mat_nr: entity.mat_nr.clone(),"));
        assert!(!code.contains("Deref"));
        assert!(!code.contains("fn new("));
    }

    #[test]
    fn test_owned_source_moves_fields() {
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs").with_function(
            MappingFunction::mapping(
                "into_dto",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                TypeRef::named("StudentDto"),
            ),
        );
        let target = dto_fields();
        let (code, _) = emit(&unit, &entity(), &target);
        assert!(code.contains("fn into_dto(&self, entity: StudentEntity) -> StudentDto {"));
        assert!(code.contains("first_name: entity.first_name,"));
        assert!(!code.contains(".clone()"));
    }

    #[test]
    fn test_owned_source_binds_accessor_before_moves() {
        let source = entity().with_accessor("display_name", TypeRef::named("String"));
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs").with_function(
            MappingFunction::mapping(
                "into_dto",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                TypeRef::named("StudentDto"),
            ),
        );
        let mut target = dto_fields();
        target.push(Param::new("display_name", TypeRef::named("String")));
        let (code, _) = emit(&unit, &source, &target);

        let local = code.find("let display_name = entity.display_name();").unwrap();
        let first_move = code.find("first_name: entity.first_name,").unwrap();
        assert!(local < first_move);
        assert!(code.contains("            display_name,\n"));
    }

    #[test]
    fn test_owned_source_without_moves_stays_inline() {
        let source = entity().with_accessor("display_name", TypeRef::named("String"));
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs").with_function(
            MappingFunction::mapping(
                "into_name",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                TypeRef::named("StudentName"),
            ),
        );
        let target = vec![Param::new("display_name", TypeRef::named("String"))];
        let (code, _) = emit(&unit, &source, &target);
        assert!(code.contains("display_name: entity.display_name(),"));
        assert!(!code.contains("let "));
    }

    #[test]
    fn test_sibling_argument_follows_parameter_passing() {
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs")
            .with_function(MappingFunction::mapping(
                "into_card",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                TypeRef::named("StudentCard"),
            ))
            .with_function(MappingFunction::provided(
                "initials",
                vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
                Some(TypeRef::named("String")),
            ))
            .with_function(MappingFunction::provided(
                "visits",
                vec![Param::new("entity", TypeRef::named("StudentEntity").by_mut())],
                Some(TypeRef::named("u32")),
            ))
            .with_function(MappingFunction::provided(
                "archived",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                Some(TypeRef::named("String")),
            ));
        let target = vec![
            Param::new("mat_nr", TypeRef::named("String")),
            Param::new("initials", TypeRef::named("String")),
            Param::new("visits", TypeRef::named("u32")),
            Param::new("archived", TypeRef::named("String")),
        ];
        let (code, _) = emit(&unit, &entity(), &target);

        assert!(code.contains("fn into_card(&self, mut entity: StudentEntity) -> StudentCard {"));
        assert!(code.contains("let initials = self.initials(&entity);"));
        assert!(code.contains("let visits = self.visits(&mut entity);"));
        assert!(code.contains("let archived = self.archived(entity.clone());"));
        let last_local = code.find("let archived").unwrap();
        assert!(last_local < code.find("mat_nr: entity.mat_nr,").unwrap());
    }

    #[test]
    fn test_borrowed_source_passed_to_reference_sibling() {
        let unit = student_mapper().with_function(MappingFunction::provided(
            "initials",
            vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
            Some(TypeRef::named("String")),
        ));
        let target = vec![
            Param::new("mat_nr", TypeRef::named("String")),
            Param::new("initials", TypeRef::named("String")),
        ];
        let (code, _) = emit(&unit, &entity(), &target);
        assert!(code.contains("initials: self.initials(entity),"));
        assert!(!code.contains("let "));
    }

    #[test]
    fn test_explicit_parameter_uses_shorthand() {
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs").with_function(
            MappingFunction::mapping(
                "to_dto",
                vec![
                    Param::new("entity", TypeRef::named("StudentEntity").by_ref()),
                    Param::new("last_name", TypeRef::named("String")),
                ],
                TypeRef::named("StudentDto"),
            ),
        );
        let target = dto_fields();
        let (code, _) = emit(&unit, &entity(), &target);
        assert!(code.contains(
            "fn to_dto(&self, entity: &StudentEntity, last_name: String) -> StudentDto {"
        ));
        assert!(code.contains("            last_name,\n"));
        assert!(!code.contains("entity.last_name"));
    }

    #[test]
    fn test_unresolved_field_uses_default() {
        let unit = student_mapper();
        let mut target = dto_fields();
        target.push(Param::new("full_name", TypeRef::named("String")));
        let (code, _) = emit(&unit, &entity(), &target);
        assert!(!code.contains("full_name"));
        assert!(code.contains("mat_nr: entity.mat_nr.clone(),\n            ..Default::default()\n        }"));
    }

    #[test]
    fn test_fully_resolved_literal_has_no_rest() {
        let unit = student_mapper();
        let (code, _) = emit(&unit, &entity(), &dto_fields());
        assert!(!code.contains("Default::default()"));
    }

    #[test]
    fn test_empty_target_literal() {
        let unit = student_mapper();
        let (code, _) = emit(&unit, &entity(), &[]);
        assert!(code.contains("        StudentDto {}\n"));
    }

    #[test]
    fn test_sibling_and_accessor_expressions() {
        let source = entity().with_accessor("display_name", TypeRef::named("String"));
        let unit = student_mapper()
            .with_function(MappingFunction::provided(
                "year",
                Vec::new(),
                Some(TypeRef::named("i32")),
            ))
            .with_function(MappingFunction::provided(
                "initials",
                vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
                Some(TypeRef::named("String")),
            ));
        let target = vec![
            Param::new("display_name", TypeRef::named("String")),
            Param::new("year", TypeRef::named("i32")),
            Param::new("initials", TypeRef::named("String")),
        ];
        let (code, _) = emit(&unit, &source, &target);
        assert!(code.contains("display_name: entity.display_name(),"));
        assert!(code.contains("year: self.year(),"));
        assert!(code.contains("initials: self.initials(entity),"));
        // Provided functions are not overridden
        assert!(!code.contains("fn year("));
    }

    #[test]
    fn test_instance_with_base() {
        let base = TypeDescriptor::record(
            "LabelDeps",
            "src/mapper.rs",
            &[("formatter", TypeRef::named("Formatter"))],
        )
        .with_method(
            "label",
            vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
            Some(TypeRef::named("String")),
        );
        let unit = MappingUnit::new("LabelMapper", "src/mapper.rs")
            .with_base(TypeRef::named("LabelDeps"))
            .with_visibility("pub(crate)")
            .with_function(MappingFunction::mapping(
                "to_label",
                vec![Param::new("entity", TypeRef::named("StudentEntity").by_ref())],
                TypeRef::named("StudentLabel"),
            ));
        let target = vec![Param::new("label", TypeRef::named("String"))];
        let functions = resolve_all(&unit, Some(&base), &entity(), &target);
        let emitter = Emitter::for_base(&unit, "LabelMapperImpl", Some(&base));
        assert_eq!(emitter.shape(), ImplShape::Instance);

        let code = emitter.emit_implementation(&functions);
        assert!(code.contains("pub(crate) struct LabelMapperImpl {\n    base: LabelDeps,\n}"));
        assert!(code.contains("pub(crate) fn new(formatter: Formatter) -> Self {"));
        assert!(code.contains("Self { base: LabelDeps { formatter } }"));
        assert!(code.contains("impl std::ops::Deref for LabelMapperImpl {"));
        assert!(code.contains("type Target = LabelDeps;"));
        assert!(code.contains("&self.base"));
        assert!(code.contains("label: self.label(entity),"));
        assert!(!code.contains("#[derive(Default)]"));
    }

    #[test]
    fn test_singleton_with_fieldless_base_derefs_to_literal() {
        let base = TypeDescriptor::record("Helpers", "src/mapper.rs", &[] as &[(&str, TypeRef)]);
        let unit = student_mapper().with_base(TypeRef::named("Helpers"));
        let emitter = Emitter::for_base(&unit, "StudentMapperImpl", Some(&base));
        assert_eq!(emitter.shape(), ImplShape::Singleton);

        let code = emitter.emit_implementation(&[]);
        assert!(code.contains("pub struct StudentMapperImpl;"));
        assert!(code.contains("type Target = Helpers;"));
        assert!(code.contains("        &Helpers {}\n"));
    }

    #[test]
    fn test_singleton_wrappers() {
        let unit = MappingUnit::new("StudentMapper", "src/mapper.rs")
            .with_wrappers(true)
            .with_function(MappingFunction::mapping(
                "to_card",
                vec![
                    Param::new("entity", TypeRef::named("StudentEntity").by_ref()),
                    Param::new("issuer", TypeRef::named("String")),
                ],
                TypeRef::named("StudentCard"),
            ));
        let (_, wrappers) = emit(&unit, &entity(), &dto_fields());

        assert!(wrappers.contains("pub trait StudentMapperToCardExt {"));
        assert!(wrappers.contains("    fn to_card(&self, issuer: String) -> StudentCard;"));
        assert!(wrappers.contains("impl StudentMapperToCardExt for StudentEntity {"));
        assert!(wrappers.contains("StudentMapper::to_card(&StudentMapperImpl, self, issuer)"));
    }

    #[test]
    fn test_instance_wrappers_use_default() {
        let base = TypeDescriptor::record(
            "LabelDeps",
            "src/mapper.rs",
            &[("separator", TypeRef::named("String"))],
        );
        let unit = MappingUnit::new("LabelMapper", "src/mapper.rs")
            .with_base(TypeRef::named("LabelDeps"))
            .with_wrappers(true)
            .with_function(MappingFunction::mapping(
                "into_label",
                vec![Param::new("entity", TypeRef::named("StudentEntity"))],
                TypeRef::named("StudentLabel"),
            ));
        let functions = resolve_all(&unit, Some(&base), &entity(), &[]);
        let emitter = Emitter::for_base(&unit, "LabelMapperImpl", Some(&base));

        let code = emitter.emit_implementation(&functions);
        assert!(code.contains("#[derive(Default)]\npub struct LabelMapperImpl {"));

        let wrappers = emitter.emit_wrappers(&functions);
        assert!(wrappers.contains("    fn into_label(self) -> StudentLabel;"));
        assert!(wrappers.contains("LabelMapper::into_label(&LabelMapperImpl::default(), self)"));
    }

    #[test]
    fn test_generic_target_literal_drops_arguments() {
        assert_eq!(literal_path("Page<StudentDto>"), "Page");
        assert_eq!(literal_path("crate::dto::StudentDto"), "crate::dto::StudentDto");
    }

    #[test]
    fn test_private_visibility() {
        let unit = student_mapper().with_visibility("");
        let (code, _) = emit(&unit, &entity(), &dto_fields());
        assert!(code.contains("\nstruct StudentMapperImpl;"));
    }
}
