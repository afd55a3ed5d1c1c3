//! # mapper-codegen
//!
//! Build-time generator for struct-to-struct mapper implementations. Declare a
//! mapping trait, and the generator writes the implementation that builds each
//! target struct from a source value.
//!
//! ## Features
//!
//! - Target fields are filled by name, first match wins: an explicit function
//!   parameter, another function of the trait (or a method of its base struct),
//!   a zero-argument accessor of the source, then a field of the source
//! - Target fields with no source fall back to `..Default::default()` and are
//!   reported as [`Diagnostic`]s
//! - Optional `<Trait><Function>Ext` wrapper traits so the mapping can be
//!   called as a method on the source value
//! - Per-unit [`DependencySet`]s for `cargo:rerun-if-changed`
//! - Malformed traits are reported per unit without failing the whole pass
//! - Units are generated in parallel with deterministic output
//!
//! ## Quick Start
//!
//! ### 1. Annotate a trait with `#[mapper]`
//!
//! ```rust,ignore
//! use mapper_derive::mapper;
//!
//! pub struct StudentEntity {
//!     pub first_name: String,
//!     pub last_name: String,
//! }
//!
//! impl StudentEntity {
//!     pub fn display_name(&self) -> String {
//!         format!("{} {}", self.first_name, self.last_name)
//!     }
//! }
//!
//! pub struct StudentDto {
//!     pub first_name: String,
//!     pub display_name: String,
//! }
//!
//! #[mapper(generate_wrapper)]
//! pub trait StudentMapper {
//!     fn to_dto(&self, entity: &StudentEntity) -> StudentDto;
//! }
//!
//! include!(concat!(env!("OUT_DIR"), "/student_mapper.rs"));
//! ```
//!
//! ### 2. Generate the implementation in build.rs
//!
//! ```no_run
//! use mapper_codegen::CodeGenerator;
//!
//! fn main() {
//!     let mut generator = CodeGenerator::new();
//!     generator.add_source_file("src/lib.rs").unwrap();
//!
//!     let report = generator.generate_units().unwrap();
//!     report.write_to_dir(std::env::var("OUT_DIR").unwrap()).unwrap();
//!
//!     for module in report.dependencies() {
//!         println!("cargo:rerun-if-changed={module}");
//!     }
//! }
//! ```
//!
//! The generated `StudentMapperImpl` is a unit struct implementing
//! `StudentMapper`, and `entity.to_dto()` works through the generated
//! `StudentMapperToDtoExt` trait.
//!
//! ## Attribute arguments
//!
//! | Argument | Effect |
//! |----------|--------|
//! | `generate_wrapper` / `generate_wrapper = bool` | Emit wrapper traits (default `false`) |
//! | `base = Path` | Struct whose fields become the `new(..)` parameters; its methods become siblings |
//! | `impl_name = Ident` | Name of the generated struct (default `<Trait>Impl`) |

mod deps;
mod emitter;
mod error;
mod extractor;
mod generator;
mod registry;
mod resolver;
mod types;

pub use deps::{DependencyCollector, DependencySet};
pub use emitter::Emitter;
pub use error::{Diagnostic, Error, MalformedReason, MalformedUnit, Result};
pub use generator::{CodeGenerator, GeneratedUnit, GenerationReport};
pub use registry::DescriptorRegistry;
pub use resolver::{ResolvedField, ResolvedFunction, Resolver};
pub use types::{
    Binding, FunctionKind, ImplShape, MappingFunction, MappingUnit, MethodSig, ModuleId, Param,
    Passing, Receiver, TypeDescriptor, TypeRef,
};

#[cfg(feature = "derive")]
pub use mapper_derive::mapper;
