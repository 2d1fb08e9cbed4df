//! Decomposing a shell command string into its simple commands.
//!
//! A simple command is one program invocation: the command name plus its
//! argument words. The decomposer descends through pipelines, `;` / `&&`
//! / `||` lists, subshells, and command substitutions (`$(…)` and
//! backticks), and drops redirection operators. It never executes
//! anything; the input is data.
//!
//! Words are reconstructed literally: quoted content contributes its
//! characters, while unexpanded `$var` / `$(…)` fragments are omitted
//! from the word (the substituted command itself is still yielded as a
//! command of its own).

use tree_sitter::{Node, Parser};

/// One program invocation inside a (possibly compound) command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    /// The argument words joined with single spaces.
    pub command: String,
    pub args: Vec<String>,
}

impl SimpleCommand {
    fn from_args(args: Vec<String>) -> Option<Self> {
        if args.is_empty() {
            return None;
        }
        Some(Self {
            command: args.join(" "),
            args,
        })
    }
}

/// Split `input` into its simple commands, in document order.
///
/// Empty, whitespace-only, and syntactically broken input all produce an
/// empty list; this function does not fail. Arbitrary bytes (null bytes,
/// BiDi controls, BOM) pass through as opaque text.
#[must_use]
pub fn decompose(input: &str) -> Vec<SimpleCommand> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut parser = Parser::new();
    if parser.set_language(&tree_sitter_bash::LANGUAGE.into()).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(input, None) else {
        return Vec::new();
    };
    let root = tree.root_node();
    if root.has_error() {
        return Vec::new();
    }

    let mut commands = Vec::new();
    walk(root, input.as_bytes(), &mut commands);
    commands
}

/// Pre-order traversal: a command is yielded before the commands nested
/// inside its substitutions. Iterative, so a long `a && b && …` chain
/// cannot exhaust the stack.
fn walk(root: Node<'_>, source: &[u8], out: &mut Vec<SimpleCommand>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "command" {
            if let Some(command) = reconstruct(node, source) {
                out.push(command);
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
}

/// Rebuild the word list of one `command` node.
fn reconstruct(node: Node<'_>, source: &[u8]) -> Option<SimpleCommand> {
    let mut args = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        // `FOO=1 cmd` prefixes configure the environment, they are not
        // argument words.
        if child.kind() == "variable_assignment" {
            continue;
        }
        if let Some(word) = node_word(child, source) {
            if !word.is_empty() {
                args.push(word);
            }
        }
    }
    SimpleCommand::from_args(args)
}

/// Literal text contribution of one word-like node, or `None` when the
/// node is an expansion that cannot be resolved statically.
fn node_word(node: Node<'_>, source: &[u8]) -> Option<String> {
    match node.kind() {
        "word" | "number" | "string_content" => text(node, source),
        "command_name" | "concatenation" | "string" | "translated_string" => {
            let mut cursor = node.walk();
            let mut word = String::new();
            for child in node.named_children(&mut cursor) {
                if let Some(part) = node_word(child, source) {
                    word.push_str(&part);
                }
            }
            Some(word)
        }
        "raw_string" => {
            let raw = text(node, source)?;
            Some(strip_wrapping(&raw, "'", "'"))
        }
        "ansi_c_string" => {
            let raw = text(node, source)?;
            Some(strip_wrapping(&raw, "$'", "'"))
        }
        // Unexpanded at classification time: contributes nothing to the
        // word. Nested command substitutions are yielded by the walk.
        "simple_expansion" | "expansion" | "command_substitution" | "arithmetic_expansion"
        | "process_substitution" => None,
        _ => None,
    }
}

fn text(node: Node<'_>, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(ToString::to_string)
}

fn strip_wrapping(raw: &str, prefix: &str, suffix: &str) -> String {
    raw.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .unwrap_or(raw)
        .to_string()
}
