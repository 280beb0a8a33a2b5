//! Command-matching policy: maps argument sequences to headers.
//!
//! An [`Argument`] tree associates command tokens with header strings. The
//! same tree expresses a whitelist (default [`FORBIDDEN_HEADER`], explicit
//! allow entries) or a blacklist (default [`DEFAULT_HEADER`], explicit
//! forbidden entries); matching walks the tree as far as the tokens reach
//! and returns the effective header of the deepest node, with empty headers
//! inherited from the nearest configured ancestor.

use std::collections::HashMap;

use crate::header::{DEFAULT_HEADER, FORBIDDEN_HEADER};

/// Determines the proper header for a given command sequence.
pub type ParseFn = Box<dyn Fn(&[String]) -> String + Send + Sync>;

/// A parse function that allows every command with [`DEFAULT_HEADER`].
pub fn default_parse_fn() -> ParseFn {
    Box::new(|_| DEFAULT_HEADER.to_string())
}

/// A node in the command-matching tree.
#[derive(Debug, Clone, Default)]
pub struct Argument {
    args: HashMap<String, Argument>,
    header: String,
}

impl Argument {
    /// Build a root node with the given default header and one leaf child
    /// per table entry.
    pub fn new(table: HashMap<String, String>, default_header: &str) -> Self {
        let mut root = Argument {
            args: HashMap::with_capacity(table.len()),
            header: default_header.to_string(),
        };
        root.add_arguments(table);
        root
    }

    /// Insert leaf children. An entry with an empty header inherits this
    /// node's header.
    pub fn add_arguments(&mut self, table: HashMap<String, String>) {
        for (arg, mut header) in table {
            if header.is_empty() {
                header = self.header.clone();
            }
            self.args.insert(
                arg,
                Argument {
                    args: HashMap::new(),
                    header,
                },
            );
        }
    }

    /// Insert subcommand tables. Tables for an existing child are merged
    /// into it; otherwise a new child is created with this node's header as
    /// its default.
    pub fn add_nested_arguments(&mut self, table: HashMap<String, HashMap<String, String>>) {
        for (cmd, sub) in table {
            if let Some(child) = self.args.get_mut(&cmd) {
                child.add_arguments(sub);
                continue;
            }
            self.args.insert(cmd, Argument::new(sub, &self.header));
        }
    }

    /// Resolve the header for a token sequence.
    ///
    /// Walks children until a token misses; returns the effective header of
    /// the deepest matched node. A node without a header of its own takes
    /// the nearest ancestor's, and a root without one falls back to
    /// [`DEFAULT_HEADER`].
    pub fn match_args<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut node = self;
        let mut effective = if self.header.is_empty() {
            DEFAULT_HEADER
        } else {
            self.header.as_str()
        };
        for arg in args {
            match node.args.get(arg.as_ref()) {
                Some(child) => {
                    if !child.header.is_empty() {
                        effective = child.header.as_str();
                    }
                    node = child;
                }
                None => break,
            }
        }
        effective.to_string()
    }

    /// Consume the tree into a [`ParseFn`] for use by a client or the HTTP
    /// adapter.
    pub fn into_parse_fn(self) -> ParseFn {
        Box::new(move |args: &[String]| self.match_args(args))
    }
}

/// Convenience: a whitelist parse function. Unknown commands resolve to
/// [`FORBIDDEN_HEADER`]; the table carries the allowed commands and their
/// headers.
pub fn whitelist(table: HashMap<String, String>) -> Argument {
    Argument::new(table, FORBIDDEN_HEADER)
}

/// Convenience: a blacklist parse function. Unknown commands resolve to
/// [`DEFAULT_HEADER`]; the table carries forbidden commands (mapped to
/// [`FORBIDDEN_HEADER`]) or overriding headers.
pub fn blacklist(table: HashMap<String, String>) -> Argument {
    Argument::new(table, DEFAULT_HEADER)
}
