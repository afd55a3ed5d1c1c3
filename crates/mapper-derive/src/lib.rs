//! Proc-macro providing the `#[mapper]` attribute.
//!
//! This macro is a **no-op annotation** - it returns the annotated item
//! unchanged. It marks a trait as a mapping unit so that `mapper-codegen`
//! picks it up when scanning sources in your build.rs.
//!
//! # Usage
//!
//! 1. Annotate a trait with `#[mapper]`
//! 2. Use `CodeGenerator` in your build.rs to generate the implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use mapper_derive::mapper;
//!
//! #[mapper(generate_wrapper)]
//! pub trait StudentMapper {
//!     fn to_dto(&self, entity: &StudentEntity) -> StudentDto;
//! }
//! ```
//!
//! Then in your build.rs:
//!
//! ```rust,ignore
//! use mapper_codegen::CodeGenerator;
//!
//! fn main() {
//!     let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR").unwrap());
//!     CodeGenerator::new()
//!         .add_source_file("src/lib.rs").unwrap()
//!         .generate_units().unwrap()
//!         .write_to_dir(&out_dir).unwrap();
//! }
//! ```
//!
//! # Arguments
//!
//! - `generate_wrapper` / `generate_wrapper = true`: also emit an extension
//!   trait per mapping function, implemented for the source type
//! - `base = Struct`: the struct whose fields the generated implementation
//!   takes at construction
//! - `impl_name = Name`: override the generated `{Trait}Impl` name

use proc_macro::TokenStream;

/// Marker attribute for mapping units.
///
/// The actual implementation is generated in build.rs by `CodeGenerator`.
#[proc_macro_attribute]
pub fn mapper(_args: TokenStream, item: TokenStream) -> TokenStream {
    // No-op: actual code generation happens in build.rs
    item
}
