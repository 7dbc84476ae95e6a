//! The pluggable per-point filter interface.
//!
//! A filter is a predicate over `(time, values, storage)` that runs after a
//! retrieved point has been formatted and before it is emitted. It may
//! mutate the printed time and the value columns (the mutations are written
//! to the output), and the storage string persists across calls within one
//! query. Returning `false` suppresses the point.
//!
//! The scripting engine behind a filter is a collaborator outside this
//! crate; embedders install their own [`Filter`] implementation on the
//! output sink. [`FnFilter`] adapts a closure for embedding and tests.

use crate::error::Result;

/// Scripted predicate applied to each emitted point.
pub trait Filter {
    /// Replaces the filter program text.
    fn set_code(&mut self, code: &str);

    /// The current filter program text.
    fn code(&self) -> &str;

    /// Runs the filter on one formatted point.
    ///
    /// Evaluator failures must surface as [`crate::Error::Filter`], which
    /// prints as `filter: can't run <detail>`.
    fn run(
        &mut self,
        time: &mut String,
        values: &mut Vec<String>,
        storage: &mut String,
    ) -> Result<bool>;
}

/// A [`Filter`] backed by a plain closure.
pub struct FnFilter<F> {
    code: String,
    func: F,
}

impl<F> FnFilter<F>
where
    F: FnMut(&mut String, &mut Vec<String>, &mut String) -> Result<bool>,
{
    /// Wraps a closure as a filter.
    pub fn new(func: F) -> Self {
        FnFilter {
            code: String::new(),
            func,
        }
    }
}

impl<F> Filter for FnFilter<F>
where
    F: FnMut(&mut String, &mut Vec<String>, &mut String) -> Result<bool>,
{
    fn set_code(&mut self, code: &str) {
        self.code = code.to_string();
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn run(
        &mut self,
        time: &mut String,
        values: &mut Vec<String>,
        storage: &mut String,
    ) -> Result<bool> {
        (self.func)(time, values, storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_code_is_stored() {
        let mut f = FnFilter::new(|_, _, _| Ok(true));
        assert_eq!(f.code(), "");
        f.set_code("abc");
        assert_eq!(f.code(), "abc");
    }

    #[test]
    fn test_side_effects_are_visible() {
        let mut f = FnFilter::new(|time, values, storage| {
            *storage = format!("{} {}", time, values.join(" "));
            *time = "1234567891.000000000".to_string();
            *values = vec!["0.34".to_string()];
            Ok(true)
        });
        let mut time = "1234567890.123456789".to_string();
        let mut values = vec!["0.1".to_string(), "0.2".to_string()];
        let mut storage = String::new();
        assert!(f.run(&mut time, &mut values, &mut storage).unwrap());
        assert_eq!(time, "1234567891.000000000");
        assert_eq!(values, vec!["0.34".to_string()]);
        assert_eq!(storage, "1234567890.123456789 0.1 0.2");
    }

    #[test]
    fn test_error_message_shape() {
        let mut f = FnFilter::new(|_, _, _| {
            Err(Error::Filter("script: invalid command name \"abc\"".to_string()))
        });
        let mut t = String::new();
        let mut v = Vec::new();
        let mut s = String::new();
        let err = f.run(&mut t, &mut v, &mut s).unwrap_err();
        assert_eq!(
            err.to_string(),
            "filter: can't run script: invalid command name \"abc\""
        );
    }
}
