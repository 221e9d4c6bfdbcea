//! Recipe rendering and validation

mod engine;
mod error;
pub mod helpers;
mod validator;

pub use engine::{
    go_builder, node_package, python_package, template_for_strategy, validate_syntax,
    TemplateData, TemplateEngine,
};
pub use error::RecipeError;
pub use helpers::{
    default_value, format_build_tags, ldflags_to_nix_list, nix_list, nix_string, recipe_digest,
    substitute_ldflags_variables, BuildContext,
};
pub use validator::{render_and_validate, NixValidator};
