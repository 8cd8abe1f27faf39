//! Shared helpers for breakable-line tests.
#![allow(dead_code)]

use stepline_syntax::compute_breakable_lines;

/// Breakable lines as a sorted vector.
pub fn breakable(source: &str) -> Vec<u32> {
    compute_breakable_lines(source)
        .unwrap_or_else(|err| panic!("source should compile: {err}"))
        .into_iter()
        .collect()
}

/// A small but complete script touching most statement forms.
pub const GREETER: &str = r#""""Module doc."""
import sys


class Greeter:
    """Says hello."""

    def __init__(self, name):
        self.name = name

    @property
    def shout(self):
        return self.name.upper()


def main(argv):
    for arg in argv:
        if arg.startswith("-"):
            continue
        print(Greeter(arg).shout)
    try:
        sys.exit(0)
    except SystemExit:
        pass
    finally:
        print("done")


if __name__ == "__main__":
    main(sys.argv[1:])
"#;
