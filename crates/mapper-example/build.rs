use mapper_codegen::CodeGenerator;
use std::env;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let mut codegen = CodeGenerator::new();

    codegen.set_header(
        "Generated mapper implementations for mapper-example\n\
         These implement the #[mapper] traits in src/lib.rs",
    );

    // Extract every #[mapper] trait and the structs it maps between
    codegen
        .add_source_file(manifest_dir.join("src/lib.rs"))
        .expect("Failed to parse source file");

    let report = codegen
        .generate_units()
        .expect("Failed to generate mapper implementations");

    for diagnostic in report.diagnostics() {
        println!("cargo:warning={diagnostic}");
    }
    for malformed in &report.malformed {
        println!("cargo:warning={malformed}");
    }

    // One file per unit, pulled in with include!
    report
        .write_to_dir(&out_dir)
        .expect("Failed to write mapper implementations");

    for module in report.dependencies() {
        println!("cargo:rerun-if-changed={module}");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
