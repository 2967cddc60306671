// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The one error type every fallible operation in the crate returns.

use failure::Fail;

/// Everything that can go wrong while configuring, generating, or
/// writing out a fractal.  Generation is all-or-nothing: when an
/// engine returns one of these, no partial buffer survives.
#[derive(Debug, Fail)]
pub enum FractalError {
    /// A parameter was rejected before any engine ran.
    #[fail(display = "invalid configuration: {}", _0)]
    Configuration(String),

    /// The caller asked for a transform table or Julia constant that
    /// isn't registered.
    #[fail(display = "unknown fractal: {}", _0)]
    UnknownFractal(String),

    /// The parallel device could not run a kernel to completion.
    #[fail(display = "parallel dispatch failed: {}", _0)]
    Dispatch(String),

    /// An image or metrics file could not be written.
    #[fail(display = "could not write {}: {}", path, reason)]
    Io {
        /// The file we were writing.
        path: String,
        /// What the underlying library had to say about it.
        reason: String,
    },
}

impl FractalError {
    /// Shorthand for building a `Configuration` error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        FractalError::Configuration(message.into())
    }

    /// True for the errors raised while validating input, as opposed
    /// to failures that happen while running.
    pub fn is_configuration(&self) -> bool {
        match self {
            FractalError::Configuration(_) | FractalError::UnknownFractal(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_class_covers_unknown_names() {
        assert!(FractalError::config("zero points").is_configuration());
        assert!(FractalError::UnknownFractal("fnord".to_string()).is_configuration());
        assert!(!FractalError::Dispatch("lane panicked".to_string()).is_configuration());
    }

    #[test]
    fn io_error_names_the_file() {
        let e = FractalError::Io {
            path: "out.png".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(format!("{}", e), "could not write out.png: disk full");
    }
}
