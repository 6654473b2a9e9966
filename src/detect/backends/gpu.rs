//! GPU adaptive backend probe.
//!
//! The GPU variant of the adaptive model is declared in the backend set so
//! configs naming it fail with a clear configuration error instead of an
//! unknown-name parse error. No compute path is wired up yet.
//
// TODO: wire this to a wgpu compute pipeline and flip the probe.

pub fn is_available() -> bool {
    false
}
