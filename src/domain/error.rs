//! Domain error types.

/// Top-level error type for whatif.
#[derive(Debug, thiserror::Error)]
pub enum WhatifError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unrecognized date/time \"{literal}\"")]
    DateParse { literal: String },

    #[error("invalid {field} value \"{literal}\"")]
    NumberParse { field: String, literal: String },

    #[error("csv error in {source_name}: {reason}")]
    Csv { source_name: String, reason: String },

    #[error("no bar data for {symbol}")]
    NoData { symbol: String },

    #[error("position {position_id} has no buy fills")]
    PositionWithoutFills { position_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WhatifError {
    pub fn date(literal: &str) -> Self {
        WhatifError::DateParse {
            literal: literal.to_string(),
        }
    }

    pub fn number(field: &str, literal: &str) -> Self {
        WhatifError::NumberParse {
            field: field.to_string(),
            literal: literal.to_string(),
        }
    }
}

impl From<&WhatifError> for std::process::ExitCode {
    fn from(err: &WhatifError) -> Self {
        let code: u8 = match err {
            WhatifError::Io(_) => 1,
            WhatifError::ConfigParse { .. }
            | WhatifError::ConfigMissing { .. }
            | WhatifError::ConfigInvalid { .. } => 2,
            WhatifError::DateParse { .. }
            | WhatifError::NumberParse { .. }
            | WhatifError::Csv { .. } => 3,
            WhatifError::PositionWithoutFills { .. } => 4,
            WhatifError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
