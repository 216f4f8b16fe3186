//! Filter-model compilation and query assembly.

mod assembler;
mod compiler;
mod descriptor;
mod key_condition;

pub use assembler::{assemble_query, build_map_query, build_search_query};
pub use compiler::{compile_conditions, CompiledConditions};
pub use descriptor::{QueryDescriptor, RenderedQuery, SecondaryIndex, SelectMode};
pub use key_condition::resolve_key_condition;
