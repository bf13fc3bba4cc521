/// Input validation
///
/// Input types derive [`validator::Validate`]; the request layer calls
/// [`validate_input`] before handing an input to a service. Services assume
/// their inputs were validated and do not re-check them.
///
/// # Example
///
/// ```
/// use uems_shared::services::auth::LoginInput;
/// use uems_shared::validation::validate_input;
///
/// let input = LoginInput {
///     username: "Admin".to_string(),
///     password: "short".to_string(),
/// };
///
/// let errors = validate_input(&input).unwrap_err();
/// assert_eq!(errors[0].field, "password");
/// ```

use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Validates an input, returning every failed rule sorted by field name
pub fn validate_input<T: Validate>(input: &T) -> Result<(), Vec<FieldError>> {
    input.validate().map_err(|errors| field_errors(&errors))
}

fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: describe(&field, error),
            })
        })
        .collect();

    fields.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.message.cmp(&b.message)));
    fields
}

fn describe(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    match error.code.as_ref() {
        "length" => match (error.params.get("min"), error.params.get("max")) {
            (Some(min), None) => format!("{field} must be at least {min} characters"),
            (None, Some(max)) => format!("{field} must be at most {max} characters"),
            (Some(min), Some(max)) => {
                format!("{field} must be between {min} and {max} characters")
            }
            (None, None) => format!("{field} has an invalid length"),
        },
        "email" => format!("{field} must be an email"),
        "url" => format!("{field} must be a URL"),
        code => format!("{field} is invalid ({code})"),
    }
}
