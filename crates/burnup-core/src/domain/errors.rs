pub type BurnupResult<T> = Result<T, BurnupError>;
pub type PipelineResult<T> = BurnupResult<T>;

/// Failure classes, each with its own process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BurnupErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl BurnupErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Crate-wide error: a category, a stable `AREA.CODE` placeholder and a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} [{}] {}", .category.as_str(), .placeholder, .message)]
pub struct BurnupError {
    category: BurnupErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl BurnupError {
    pub fn new(
        category: BurnupErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BurnupErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BurnupErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BurnupErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(BurnupErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> BurnupErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the first stderr line on exit.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::{BurnupError, BurnupErrorCategory};

    #[test]
    fn categories_keep_their_exit_codes() {
        let cases = [
            (BurnupErrorCategory::InputValidationError, 2, "InputValidationError"),
            (BurnupErrorCategory::IoSystemError, 3, "IoSystemError"),
            (BurnupErrorCategory::ComputationError, 4, "ComputationError"),
            (BurnupErrorCategory::InternalError, 5, "InternalError"),
        ];

        for (category, exit_code, name) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn error_renders_diagnostic_and_exit_lines() {
        let error = BurnupError::computation(
            "RUN.EMPTY_COMPOSITION",
            "material 'element_001' has zero total mass",
        );

        assert_eq!(error.exit_code(), 4);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [RUN.EMPTY_COMPOSITION] material 'element_001' has zero total mass"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 4");
        assert_eq!(
            error.to_string(),
            "ComputationError [RUN.EMPTY_COMPOSITION] material 'element_001' has zero total mass"
        );
    }
}
