//! Progress reporting for long-running hierarchy operations.

/// Callback receiving a human-readable stage label and a completion fraction
/// in `[0, 1]`.
///
/// Operations may invoke the callback concurrently from worker threads; the
/// implementation must tolerate interleaved calls and makes no atomicity
/// assumption about the reported fractions.
pub type ProgressCallback<'a> = &'a (dyn Fn(&str, f32) + Sync);
