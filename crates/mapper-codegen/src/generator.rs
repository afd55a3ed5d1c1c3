//! The generation pass: validate, resolve, emit and report each mapping unit.

use crate::deps::{DependencyCollector, DependencySet};
use crate::emitter::Emitter;
use crate::error::{Diagnostic, Error, MalformedReason, MalformedUnit, Result};
use crate::registry::DescriptorRegistry;
use crate::resolver::Resolver;
use crate::types::{ImplShape, MappingUnit, TypeDescriptor, to_snake_case};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

const DEFAULT_IMPL_SUFFIX: &str = "Impl";

/// Code generator that collects mapping units and type descriptors and emits
/// Rust implementations for them.
///
/// # Example
///
/// ```
/// use mapper_codegen::{CodeGenerator, MappingFunction, MappingUnit, Param, TypeDescriptor, TypeRef};
///
/// let mut generator = CodeGenerator::new();
/// generator
///     .register_type(TypeDescriptor::record("Point", "src/geo.rs", &[
///         ("x", TypeRef::named("f64")),
///         ("y", TypeRef::named("f64")),
///     ]))
///     .register_type(TypeDescriptor::record("PointDto", "src/dto.rs", &[
///         ("x", TypeRef::named("f64")),
///         ("y", TypeRef::named("f64")),
///     ]))
///     .add_unit(MappingUnit::new("PointMapper", "src/mapper.rs").with_function(
///         MappingFunction::mapping(
///             "to_dto",
///             vec![Param::new("point", TypeRef::named("Point").by_ref())],
///             TypeRef::named("PointDto"),
///         ),
///     ));
///
/// let code = generator.generate().unwrap();
/// assert!(code.contains("impl PointMapper for PointMapperImpl {"));
/// assert!(code.contains("x: point.x.clone(),"));
/// ```
#[derive(Debug)]
pub struct CodeGenerator {
    /// Type model used to look up sources, targets and bases
    pub(crate) registry: DescriptorRegistry,

    /// Mapping units, keyed by name so output order is stable
    units: BTreeMap<String, MappingUnit>,

    /// Units rejected while reading sources
    rejected: BTreeMap<String, MalformedUnit>,

    /// Custom header comment
    header: Option<String>,

    impl_suffix: String,
    parallel: bool,
    deny_unresolved: bool,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            registry: DescriptorRegistry::new(),
            units: BTreeMap::new(),
            rejected: BTreeMap::new(),
            header: None,
            impl_suffix: DEFAULT_IMPL_SUFFIX.to_string(),
            parallel: true,
            deny_unresolved: false,
        }
    }
}

impl CodeGenerator {
    /// Create a new code generator with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom header comment for the generated files.
    pub fn set_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.header = Some(header.into());
        self
    }

    /// Set the suffix appended to a unit name to form its implementation name.
    ///
    /// Defaults to `Impl`, so `StudentMapper` becomes `StudentMapperImpl`.
    /// A unit's own `impl_name` takes precedence.
    pub fn set_impl_suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.impl_suffix = suffix.into();
        self
    }

    /// Process units on the rayon thread pool (the default) or one after another.
    ///
    /// Output is identical either way.
    pub fn parallel(&mut self, enabled: bool) -> &mut Self {
        self.parallel = enabled;
        self
    }

    /// Reject units with target fields that have no source instead of
    /// filling those fields from the target's `Default` impl.
    pub fn deny_unresolved(&mut self, enabled: bool) -> &mut Self {
        self.deny_unresolved = enabled;
        self
    }

    /// Register a type descriptor, replacing any existing one with the same name.
    ///
    /// Use this for types declared outside the scanned sources.
    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.registry.register(descriptor);
        self
    }

    /// Remove a type descriptor from the registry.
    pub fn unregister_type(&mut self, name: &str) -> &mut Self {
        self.registry.unregister(name);
        self
    }

    /// Get a reference to the descriptor registry.
    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    /// Add a mapping unit, replacing any existing unit with the same name.
    pub fn add_unit(&mut self, unit: MappingUnit) -> &mut Self {
        self.rejected.remove(&unit.name);
        if let Some(previous) = self.units.insert(unit.name.clone(), unit) {
            tracing::debug!(unit = %previous.name, module = %previous.module, "replacing mapping unit");
        }
        self
    }

    /// Record a unit that could not be read from source.
    pub(crate) fn reject(&mut self, malformed: MalformedUnit) {
        self.units.remove(&malformed.unit);
        self.rejected.insert(malformed.unit.clone(), malformed);
    }

    /// Iterate over the registered units in name order.
    pub fn units(&self) -> impl Iterator<Item = &MappingUnit> {
        self.units.values()
    }

    /// Run the generation pass.
    ///
    /// Malformed units are reported in [`GenerationReport::malformed`] and do
    /// not affect the others. A function referring to a type with no
    /// descriptor aborts the pass.
    pub fn generate_units(&self) -> Result<GenerationReport> {
        let units: Vec<&MappingUnit> = self.units.values().collect();
        let outcomes: Vec<_> = if self.parallel {
            units.par_iter().map(|unit| self.process_unit(unit)).collect()
        } else {
            units.iter().map(|unit| self.process_unit(unit)).collect()
        };

        let mut report = GenerationReport {
            header: self.render_header(),
            units: Vec::with_capacity(units.len()),
            malformed: self.rejected.values().cloned().collect(),
        };
        for malformed in &report.malformed {
            tracing::warn!(unit = %malformed.unit, reason = %malformed.reason, "skipping malformed mapping unit");
        }

        for outcome in outcomes {
            match outcome? {
                Ok(generated) => report.units.push(generated),
                Err(malformed) => {
                    tracing::warn!(unit = %malformed.unit, reason = %malformed.reason, "skipping malformed mapping unit");
                    report.malformed.push(malformed);
                }
            }
        }

        Ok(report)
    }

    /// Generate all units as a single Rust source string.
    pub fn generate(&self) -> Result<String> {
        Ok(self.generate_units()?.to_source())
    }

    /// Write all units to a single file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let code = self.generate()?;
        fs::write(path, code).map_err(|e| Error::io(path, e))
    }

    /// Write all units to a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let code = self.generate()?;
        writer.write_all(code.as_bytes()).map_err(Error::Write)
    }

    fn render_header(&self) -> String {
        let mut output = String::new();
        match &self.header {
            Some(header) => {
                for line in header.lines() {
                    if line.is_empty() {
                        output.push_str("//\n");
                    } else {
                        output.push_str(&format!("// {line}\n"));
                    }
                }
            }
            None => {
                output.push_str("// Auto-generated by mapper-codegen\n");
                output.push_str("// DO NOT EDIT MANUALLY\n");
            }
        }
        output.push('\n');
        output
    }

    fn impl_name(&self, unit: &MappingUnit) -> String {
        unit.impl_name
            .clone()
            .unwrap_or_else(|| format!("{}{}", unit.name, self.impl_suffix))
    }

    /// Generate one unit. The outer error aborts the pass; the inner one only
    /// rejects this unit.
    fn process_unit(&self, unit: &MappingUnit) -> Result<Result<GeneratedUnit, MalformedUnit>> {
        let malformed = |reason: MalformedReason| -> Result<Result<GeneratedUnit, MalformedUnit>> {
            Ok(Err(MalformedUnit::new(&unit.name, reason)))
        };

        let base = match &unit.base {
            Some(base) => match self.registry.describe(&base.name) {
                Some(descriptor) if descriptor.constructor.is_none() => {
                    return malformed(MalformedReason::BaseWithoutConstructor(base.source.clone()));
                }
                Some(descriptor) => Some(descriptor),
                None => return malformed(MalformedReason::MissingBase(base.source.clone())),
            },
            None => None,
        };

        if let Err(reason) = validate_functions(unit) {
            return malformed(reason);
        }

        let mut deps = DependencyCollector::new();
        deps.record(&unit.module);
        if let Some(base) = base {
            deps.record(&base.module);
        }

        let resolver = Resolver::new(unit, base);
        let mut functions = Vec::new();
        for function in unit.abstract_functions() {
            let Some(source) = function.source() else {
                return malformed(MalformedReason::NoParameters {
                    function: function.name.clone(),
                });
            };
            let Some(target) = function.return_type.as_ref() else {
                return malformed(MalformedReason::NoReturnType {
                    function: function.name.clone(),
                });
            };
            let source_desc = self.lookup(unit, &function.name, &source.ty.name)?;
            let target_desc = self.lookup(unit, &function.name, &target.name)?;
            deps.record(&source_desc.module);
            deps.record(&target_desc.module);

            let Some(constructor) = target_desc.constructor_parameters() else {
                return malformed(MalformedReason::TargetWithoutConstructor {
                    function: function.name.clone(),
                    target: target.source.clone(),
                });
            };
            let resolved =
                resolver.resolve_function(function, source, source_desc, target, constructor);
            if let Some(sibling) = resolved.conflicting_sibling() {
                return malformed(MalformedReason::SharedSourceToMutSibling {
                    function: function.name.clone(),
                    sibling: sibling.to_string(),
                });
            }
            functions.push(resolved);
        }

        let diagnostics: Vec<Diagnostic> = functions
            .iter()
            .flat_map(|f| f.diagnostics(&unit.name))
            .collect();
        if self.deny_unresolved && !diagnostics.is_empty() {
            return malformed(MalformedReason::Unresolved(diagnostics));
        }
        for diagnostic in &diagnostics {
            tracing::warn!(
                unit = %diagnostic.unit,
                function = %diagnostic.function,
                target = %diagnostic.target,
                parameter = %diagnostic.parameter,
                "unresolved target parameter"
            );
        }

        let emitter = Emitter::for_base(unit, self.impl_name(unit), base);
        let implementation = emitter.emit_implementation(&functions);
        let wrappers = unit
            .generate_wrapper
            .then(|| emitter.emit_wrappers(&functions));

        let generated = GeneratedUnit {
            unit: unit.name.clone(),
            impl_name: emitter.impl_name().to_string(),
            shape: emitter.shape(),
            implementation,
            wrappers,
            dependencies: deps.finish(),
            diagnostics,
        };
        tracing::debug!(
            unit = %generated.unit,
            implementation = %generated.impl_name,
            shape = ?generated.shape,
            functions = functions.len(),
            "generated mapping unit"
        );
        Ok(Ok(generated))
    }

    fn lookup(&self, unit: &MappingUnit, function: &str, ty: &str) -> Result<&TypeDescriptor> {
        self.registry
            .describe(ty)
            .ok_or_else(|| Error::DescriptorLookup {
                unit: unit.name.clone(),
                function: function.to_string(),
                ty: ty.to_string(),
            })
    }
}

/// Check the shape of every abstract function before any lookup happens.
fn validate_functions(unit: &MappingUnit) -> std::result::Result<(), MalformedReason> {
    for function in unit.abstract_functions() {
        let name = || function.name.clone();
        if function.receiver.is_none() {
            return Err(MalformedReason::MissingReceiver { function: name() });
        }
        if function.source().is_none() {
            return Err(MalformedReason::NoParameters { function: name() });
        }
        match &function.return_type {
            None => return Err(MalformedReason::NoReturnType { function: name() }),
            Some(ret) if ret.is_borrowed() => {
                return Err(MalformedReason::UnsupportedSignature {
                    function: name(),
                    detail: format!("returns a reference `{}`", ret.render()),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Generated code for one mapping unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub unit: String,
    pub impl_name: String,
    pub shape: ImplShape,
    /// Implementation struct, constructor, `Deref` and trait impl.
    pub implementation: String,
    /// Wrapper traits, when the unit asks for them.
    pub wrappers: Option<String>,
    /// Modules the unit was derived from.
    pub dependencies: DependencySet,
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratedUnit {
    /// File name used by [`GenerationReport::write_to_dir`], e.g. `student_mapper.rs`.
    pub fn file_name(&self) -> String {
        format!("{}.rs", to_snake_case(&self.unit))
    }

    /// Implementation followed by wrappers.
    pub fn code(&self) -> String {
        match &self.wrappers {
            Some(wrappers) => format!("{}\n{}", self.implementation, wrappers),
            None => self.implementation.clone(),
        }
    }
}

/// The result of a generation pass.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Rendered header comment, prepended to every output file.
    pub header: String,
    /// Generated units in name order.
    pub units: Vec<GeneratedUnit>,
    pub malformed: Vec<MalformedUnit>,
}

impl GenerationReport {
    /// All units as one source string.
    pub fn to_source(&self) -> String {
        let mut output = self.header.clone();
        for unit in &self.units {
            output.push_str(&unit.code());
            output.push('\n');
        }
        output.trim_end().to_string() + "\n"
    }

    /// Write one file per unit into `dir`, creating it if needed.
    ///
    /// Include a unit from the crate that declares it with
    /// `include!(concat!(env!("OUT_DIR"), "/student_mapper.rs"));`.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        for unit in &self.units {
            let path = dir.join(unit.file_name());
            let code = format!("{}{}", self.header, unit.code());
            fs::write(&path, code).map_err(|e| Error::io(&path, e))?;
        }
        Ok(())
    }

    /// Unresolved target parameters across all generated units.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.units.iter().flat_map(|u| u.diagnostics.iter())
    }

    /// Union of the dependencies of all generated units.
    pub fn dependencies(&self) -> DependencySet {
        self.units
            .iter()
            .flat_map(|u| u.dependencies.iter().cloned())
            .collect()
    }

    pub fn unit(&self, name: &str) -> Option<&GeneratedUnit> {
        self.units.iter().find(|u| u.unit == name)
    }
}
