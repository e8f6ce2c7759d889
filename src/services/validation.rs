use crate::constants::history::MAX_LIMIT;
use crate::errors::ToolError;
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    pub fn ensure_uuid(&self, value: Option<&Value>, label: &str) -> Result<Uuid, ToolError> {
        let raw = self.ensure_string(value.unwrap_or(&Value::Null), label, true)?;
        Uuid::parse_str(&raw)
            .map_err(|_| ToolError::invalid_params(format!("{} must be a UUID", label)))
    }

    /// Optional positive page size, capped at the history maximum.
    pub fn ensure_limit(&self, value: Option<&Value>) -> Result<Option<usize>, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let numeric = value
            .as_u64()
            .filter(|n| *n > 0)
            .ok_or_else(|| ToolError::invalid_params("limit must be a positive integer"))?;
        Ok(Some((numeric as usize).min(MAX_LIMIT)))
    }
}
