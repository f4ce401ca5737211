//! Stream descriptors: the single string every open call accepts.

use std::fmt;

/// A parsed open target. Parsed once per open call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// `-`: stdin for reads, stdout for writes.
    Stdio,
    /// `|prog arg...`: the stdout of a subprocess. Arguments are split on
    /// whitespace only; quotes and escapes are passed through verbatim.
    Command { program: String, args: Vec<String> },
    /// `http://...` or `https://...`.
    Remote(String),
    /// Anything else, including `~` and `~user` prefixed paths.
    Path(String),
}

impl Descriptor {
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            return Descriptor::Stdio;
        }
        if let Some(cmd) = s.strip_prefix('|') {
            let mut words = cmd.split_whitespace().map(str::to_owned);
            let program = words.next().unwrap_or_default();
            return Descriptor::Command { program, args: words.collect() };
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Descriptor::Remote(s.to_owned());
        }
        Descriptor::Path(s.to_owned())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Stdio                      => f.write_str("-"),
            Descriptor::Command { program, args } => {
                write!(f, "|{program}")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                Ok(())
            }
            Descriptor::Remote(url)                => f.write_str(url),
            Descriptor::Path(p)                    => f.write_str(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kinds() {
        assert_eq!(Descriptor::parse("-"), Descriptor::Stdio);
        assert_eq!(Descriptor::parse("https://x.org/a.gz"), Descriptor::Remote("https://x.org/a.gz".into()));
        assert_eq!(Descriptor::parse("ftp://x"), Descriptor::Path("ftp://x".into()));
        assert_eq!(Descriptor::parse("~/a"), Descriptor::Path("~/a".into()));
        assert_eq!(Descriptor::parse("--"), Descriptor::Path("--".into()));
    }

    #[test]
    fn command_splits_on_whitespace_only() {
        let d = Descriptor::parse("|grep -v  \"a b\"");
        assert_eq!(d, Descriptor::Command {
            program: "grep".into(),
            args:    vec!["-v".into(), "\"a".into(), "b\"".into()],
        });
        assert_eq!(d.to_string(), "|grep -v \"a b\"");
    }

    #[test]
    fn bare_pipe_has_empty_program() {
        assert_eq!(Descriptor::parse("|"), Descriptor::Command { program: String::new(), args: vec![] });
    }
}
