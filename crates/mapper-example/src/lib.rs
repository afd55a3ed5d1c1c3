//! Example crate demonstrating mapper-codegen usage.
//!
//! The `#[mapper]` attribute is a no-op marker. The implementations of the
//! traits below are generated in build.rs by `CodeGenerator` and pulled in
//! with `include!`.

use mapper_derive::mapper;

/// A persisted student record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentEntity {
    pub first_name: String,
    pub last_name: String,
    pub mat_nr: String,
    pub semester: u32,
}

impl StudentEntity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Flat transfer object; every field comes straight from the entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDto {
    pub first_name: String,
    pub last_name: String,
    pub mat_nr: String,
    pub display_name: String,
}

/// An id card. `issuer` is passed by the caller, `year` comes from the mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentCard {
    pub display_name: String,
    pub mat_nr: String,
    pub issuer: String,
    pub year: u32,
}

/// Built from an owned entity: fields move out of it, while
/// `display_name` and `initials` still read it.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub mat_nr: String,
    pub display_name: String,
    pub semester: u32,
    pub initials: String,
}

#[mapper(generate_wrapper)]
pub trait StudentMapper {
    fn to_dto(&self, entity: &StudentEntity) -> StudentDto;

    fn to_card(&self, entity: &StudentEntity, issuer: String) -> StudentCard;

    fn into_summary(&self, entity: StudentEntity) -> StudentSummary;

    fn year(&self) -> u32 {
        2024
    }

    fn initials(&self, entity: &StudentEntity) -> String {
        entity
            .first_name
            .chars()
            .take(1)
            .chain(entity.last_name.chars().take(1))
            .collect()
    }
}

/// Formats labels for [`LabelMapper`].
#[derive(Debug, Clone)]
pub struct Formatter {
    pub separator: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            separator: " / ".to_string(),
        }
    }
}

/// State shared by every `LabelMapper` function.
#[derive(Debug, Clone, Default)]
pub struct LabelMapperDeps {
    pub formatter: Formatter,
}

impl LabelMapperDeps {
    pub fn label(&self, entity: &StudentEntity) -> String {
        format!(
            "{}{}{}",
            entity.mat_nr,
            self.formatter.separator,
            entity.display_name()
        )
    }
}

/// `note` has no source and keeps its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentLabel {
    pub label: String,
    pub semester: u32,
    pub note: Option<String>,
}

#[mapper(base = LabelMapperDeps, generate_wrapper)]
pub trait LabelMapper {
    fn to_label(&self, entity: &StudentEntity) -> StudentLabel;

    fn into_label(&self, entity: StudentEntity) -> StudentLabel;
}

include!(concat!(env!("OUT_DIR"), "/student_mapper.rs"));
include!(concat!(env!("OUT_DIR"), "/label_mapper.rs"));
