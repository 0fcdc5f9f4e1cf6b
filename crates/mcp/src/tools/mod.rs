pub mod outcome;
pub mod products;
mod registry;

pub use products::register_product_tools;
pub use registry::{
    json_schema_document, json_schema_integer, json_schema_object, json_schema_string,
    prepare_arguments, with_default, RegistryError, Tool, ToolRegistry,
};
