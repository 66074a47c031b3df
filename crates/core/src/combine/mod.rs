//! Long-form assembly: combination selection and concatenation.

pub mod concat;
pub mod select;

pub use concat::{CombineConfig, run_combine};
pub use select::{
    SelectionMode, SelectorConfig, metadata_file_name, read_recipes, select_recipes,
    select_recipes_by_speaker, write_recipes,
};
