//! Error handling foundation for lexcase.
//!
//! Only the `Result` alias lives here. Each crate defines its own error enum
//! and wraps it in a rootcause `Report`, adding context as errors cross
//! layer boundaries.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(7);
        assert_eq!(ok.expect("should be ok"), 7);
    }
}
