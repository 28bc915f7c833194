//! Framer bootstrap source
//!
//! The framer is a Python helper fed to the remote interpreter through
//! `runpython`. Its source carries a `#{SUB}` placeholder that is replaced
//! with the conductor's depth (and optionally a verbose flag) before
//! transmission, so banner lines coming back are tagged with the right
//! nesting level.

/// Placeholder substituted at launch time
const SUB_MARKER: &str = "#{SUB}";

/// The helper program, verbatim
pub const FRAMER_SOURCE: &str = include_str!("../assets/framer.py");

/// Framer source specialized for one conductor
pub fn framer_source(depth: u32, verbose: bool) -> String {
    let sub = if verbose {
        format!("DEPTH = {}\nVERBOSE = 1", depth)
    } else {
        format!("DEPTH = {}", depth)
    };
    FRAMER_SOURCE.replace(SUB_MARKER, &sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_present_in_asset() {
        assert!(FRAMER_SOURCE.contains(SUB_MARKER));
    }

    #[test]
    fn test_substitution() {
        let source = framer_source(2, false);
        assert!(source.contains("DEPTH = 2"));
        assert!(!source.contains(SUB_MARKER));
        assert!(!source.contains("VERBOSE = 1"));
    }

    #[test]
    fn test_verbose_substitution() {
        let source = framer_source(0, true);
        assert!(source.contains("DEPTH = 0"));
        assert!(source.contains("VERBOSE = 1"));
    }
}
