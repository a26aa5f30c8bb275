//! Late formatting of record messages.
//!
//! Format strings travel as plain text and are rendered on the backend
//! thread against the decoded [`ArgStore`]. Supported syntax is the subset
//! the call sites use: sequential `{}` placeholders, explicit `{0}` indexed
//! placeholders, and `{{` / `}}` escapes. Anything unrecognised renders
//! literally, so a malformed placeholder shows up in the output instead of
//! failing the backend.

use crate::args::{ArgStore, ArgValue};
use std::fmt::Write as _;

/// Renders `format` with `args` appended to `out`.
pub fn vformat(out: &mut String, format: &str, args: &ArgStore<'_>) {
    let mut next_positional = 0usize;
    let mut rest = format;

    loop {
        let Some(at) = rest.find(['{', '}']) else {
            out.push_str(rest);
            return;
        };
        out.push_str(&rest[..at]);

        if rest.as_bytes()[at] == b'}' {
            // "}}" collapses; a lone '}' renders as itself.
            out.push('}');
            let skip = if rest.as_bytes().get(at + 1) == Some(&b'}') { 2 } else { 1 };
            rest = &rest[at + skip..];
            continue;
        }

        if rest.as_bytes().get(at + 1) == Some(&b'{') {
            out.push('{');
            rest = &rest[at + 2..];
            continue;
        }

        let Some(close) = rest[at..].find('}') else {
            // Unterminated placeholder renders literally.
            out.push_str(&rest[at..]);
            return;
        };
        let spec = &rest[at + 1..at + close];
        render_placeholder(out, spec, args, &mut next_positional);
        rest = &rest[at + close + 1..];
    }
}

fn render_placeholder(out: &mut String, spec: &str, args: &ArgStore<'_>, next_positional: &mut usize) {
    // Everything after ':' (fill/width/precision) is accepted and ignored.
    let index_part = spec.split(':').next().unwrap_or("");

    let index = if index_part.is_empty() {
        let index = *next_positional;
        *next_positional += 1;
        index
    } else {
        match index_part.parse::<usize>() {
            Ok(index) => index,
            Err(_) => {
                let _ = write!(out, "{{{spec}}}");
                return;
            }
        }
    };

    match args.get(index) {
        Some(value) => write_value(out, value),
        None => {
            let _ = write!(out, "{{{spec}}}");
        }
    }
}

fn write_value(out: &mut String, value: &ArgValue<'_>) {
    let _ = match value {
        ArgValue::Int(v) => write!(out, "{v}"),
        ArgValue::Uint(v) => write!(out, "{v}"),
        ArgValue::Float(v) => write!(out, "{v}"),
        ArgValue::Bool(v) => write!(out, "{v}"),
        ArgValue::Char(v) => write!(out, "{v}"),
        ArgValue::Str(v) => {
            out.push_str(v);
            Ok(())
        }
        ArgValue::Ptr(v) => write!(out, "0x{v:x}"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store<'a>(values: &[ArgValue<'a>]) -> ArgStore<'a> {
        let mut store = ArgStore::default();
        for value in values {
            store.push(*value);
        }
        store
    }

    fn render(format: &str, values: &[ArgValue<'_>]) -> String {
        let mut out = String::new();
        vformat(&mut out, format, &store(values));
        out
    }

    #[test]
    fn sequential_placeholders() {
        assert_eq!(
            render("Hello {}!", &[ArgValue::Str("world")]),
            "Hello world!"
        );
        assert_eq!(
            render("{} + {} = {}", &[ArgValue::Int(1), ArgValue::Int(2), ArgValue::Int(3)]),
            "1 + 2 = 3"
        );
    }

    #[test]
    fn indexed_placeholders() {
        assert_eq!(
            render("{1}{0}{1}", &[ArgValue::Str("a"), ArgValue::Str("b")]),
            "bab"
        );
    }

    #[test]
    fn brace_escapes() {
        assert_eq!(render("{{}}", &[]), "{}");
        assert_eq!(
            render("set {{{}}}", &[ArgValue::Int(5)]),
            "set {5}"
        );
    }

    #[test]
    fn missing_argument_renders_literally() {
        assert_eq!(render("{} {}", &[ArgValue::Int(1)]), "1 {}");
        assert_eq!(render("{9}", &[ArgValue::Int(1)]), "{9}");
    }

    #[test]
    fn unterminated_placeholder_renders_literally() {
        assert_eq!(render("tail {", &[]), "tail {");
        assert_eq!(render("tail {0", &[ArgValue::Int(1)]), "tail {0");
    }

    #[test]
    fn value_rendering() {
        assert_eq!(render("{}", &[ArgValue::Uint(18_446_744_073_709_551_615)]), "18446744073709551615");
        assert_eq!(render("{}", &[ArgValue::Float(1.5)]), "1.5");
        assert_eq!(render("{}", &[ArgValue::Bool(false)]), "false");
        assert_eq!(render("{}", &[ArgValue::Char('x')]), "x");
        assert_eq!(render("{}", &[ArgValue::Ptr(0xdead)]), "0xdead");
    }

    #[test]
    fn format_spec_suffix_is_tolerated() {
        assert_eq!(render("{:>8}", &[ArgValue::Int(7)]), "7");
        assert_eq!(render("{0:04}", &[ArgValue::Int(7)]), "7");
    }
}
