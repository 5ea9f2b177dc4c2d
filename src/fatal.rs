//! Fail-fast adapter for hosts that want the runtime-check behaviour: print
//! the failing call, its status and source location, then terminate.

use std::panic::Location;

use crate::error::HistogramError;

/// `error: '<description>'(<status>) at <file>:<line>`
pub fn diagnostic(err: &HistogramError, fallback: &Location<'_>) -> String {
    let location: &Location<'_> = match err.location() {
        Some(site) => site,
        None => fallback,
    };
    format!(
        "error: '{err}'({}) at {}:{}",
        err.status(),
        location.file(),
        location.line()
    )
}

/// Unwrap `result` or report the error and exit with status 1.
///
/// Errors that carry no device call site are reported at the caller of
/// `or_abort`.
#[track_caller]
pub fn or_abort<T>(result: Result<T, HistogramError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let message = diagnostic(&err, Location::caller());
            log::error!("{message}");
            eprintln!("\n{message}\n");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::status;

    #[test]
    fn diagnostic_uses_device_call_site() {
        let site = Location::caller();
        let err = HistogramError::device("queue.submit", status::VALIDATION, "bad binding", site);
        let text = diagnostic(&err, Location::caller());
        assert_eq!(
            text,
            format!(
                "error: 'queue.submit failed: bad binding'(1) at {}:{}",
                site.file(),
                site.line()
            )
        );
    }

    #[test]
    fn diagnostic_falls_back_to_caller_for_domain_errors() {
        let err = HistogramError::EmptyGrid {
            width: 0,
            height: 3,
        };
        let here = Location::caller();
        let text = diagnostic(&err, here);
        assert!(text.starts_with("error: 'grid has zero area (0x3)'(100) at "));
        assert!(text.ends_with(&format!("{}:{}", here.file(), here.line())));
    }

    #[test]
    fn ok_passes_through() {
        assert_eq!(or_abort(Ok::<_, HistogramError>(7)), 7);
    }
}
