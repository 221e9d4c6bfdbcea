use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("failed to render template {template}: {reason}")]
    RenderFailed { template: String, reason: String },

    /// The recipe text is kept so it can be shown to the user
    #[error("generated flake has invalid syntax: {reason}")]
    InvalidSyntax { reason: String, recipe: String },

    #[error("flake validation could not run: {0}")]
    ValidatorUnavailable(#[source] anyhow::Error),

    #[error("flake validation cancelled")]
    Cancelled,
}

impl RecipeError {
    pub(crate) fn render(template: &str, reason: impl Into<String>) -> Self {
        RecipeError::RenderFailed {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(reason: impl Into<String>, recipe: &str) -> Self {
        RecipeError::InvalidSyntax {
            reason: reason.into(),
            recipe: recipe.to_string(),
        }
    }

    /// Recipe text carried by the error, if any
    pub fn recipe(&self) -> Option<&str> {
        match self {
            RecipeError::InvalidSyntax { recipe, .. } => Some(recipe),
            _ => None,
        }
    }
}
