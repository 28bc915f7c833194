//! Shell quoting for values sent through `setenv`

/// Escape a value for interpolation into the remote shell.
///
/// Single quotes, backslashes, backticks and `$` are backslash-escaped so
/// the value survives the remote shell's word expansion untouched.
pub fn escape_shell_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\'' | '\\' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(escape_shell_value("xterm-256color"), "xterm-256color");
    }

    #[test]
    fn test_metacharacters_escaped() {
        assert_eq!(escape_shell_value("it's"), "it\\'s");
        assert_eq!(escape_shell_value("a\\b"), "a\\\\b");
        assert_eq!(escape_shell_value("`id`"), "\\`id\\`");
        assert_eq!(escape_shell_value("$HOME"), "\\$HOME");
    }

    #[test]
    fn test_mixed() {
        assert_eq!(escape_shell_value("x=$y 'z'"), "x=\\$y \\'z\\'");
    }
}
