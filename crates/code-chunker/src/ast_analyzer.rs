use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::types::ChunkType;
use tree_sitter::{Node, Parser};

/// A syntactic unit found in the source, with 1-indexed inclusive line bounds.
///
/// `start_line` already includes leading doc comments and attributes. `members` holds the
/// nested units of a container (methods of an impl or class, items of a module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxUnit {
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: ChunkType,
    pub symbol_name: Option<String>,
    pub parent_scope: Option<String>,
    pub qualified_name: Option<String>,
    pub members: Vec<SyntaxUnit>,
}

impl SyntaxUnit {
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Tree-sitter backed extractor of top-level syntactic units
pub struct AstAnalyzer {
    parser: Parser,
    language: Language,
}

struct Source<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
}

impl Source<'_> {
    fn node_text(&self, node: Node) -> &str {
        self.text.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }
}

impl AstAnalyzer {
    /// Create new AST analyzer for a language
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(ChunkerError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { parser, language })
    }

    /// Parse `content` and return its top-level units ordered by start line, non-overlapping.
    pub fn analyze(&mut self, content: &str) -> Result<Vec<SyntaxUnit>> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            log::debug!(
                "{} source has syntax errors; units are best effort",
                self.language.as_str()
            );
        }

        let source = Source {
            text: content,
            lines: content.lines().collect(),
        };
        let mut units = Vec::new();
        self.collect_units(&source, root, None, 1, &mut units);
        Ok(units)
    }

    /// Collect units among the direct children of `node`. `floor` is the first line leading
    /// trivia may extend back to.
    fn collect_units(
        &self,
        source: &Source<'_>,
        node: Node,
        scope: Option<&str>,
        floor: usize,
        out: &mut Vec<SyntaxUnit>,
    ) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();

        for child in children {
            let unit = match self.language {
                Language::Rust => self.rust_unit(source, child, scope),
                Language::Python => self.python_unit(source, child, scope),
                Language::JavaScript | Language::TypeScript | Language::Tsx => {
                    self.js_unit(source, child, scope)
                }
                _ => None,
            };

            if let Some(mut unit) = unit {
                let lower = out.last().map_or(floor, |prev| prev.end_line + 1);
                unit.start_line = self.extend_over_leading_trivia(source, unit.start_line, lower);
                push_unit(out, unit);
            }
        }
    }

    fn rust_unit(&self, source: &Source<'_>, node: Node, scope: Option<&str>) -> Option<SyntaxUnit> {
        let chunk_type = match node.kind() {
            "function_item" | "function_signature_item" if scope.is_some() => ChunkType::Method,
            "function_item" => ChunkType::Function,
            "struct_item" | "union_item" => ChunkType::Struct,
            "enum_item" => ChunkType::Enum,
            "impl_item" => ChunkType::Impl,
            "trait_item" => ChunkType::Interface,
            "mod_item" => ChunkType::Module,
            "const_item" => ChunkType::Const,
            "static_item" => ChunkType::Variable,
            "type_item" => ChunkType::Type,
            "macro_definition" => ChunkType::Macro,
            _ => return None,
        };

        let name = if chunk_type == ChunkType::Impl {
            Self::extract_impl_target(source, node)
        } else {
            Self::extract_symbol_name(source, node)
        };
        let mut unit = Self::base_unit(node, chunk_type, name, scope, "::");

        if chunk_type.is_container() {
            if let Some(body) = child_of_kind(node, "declaration_list") {
                let member_scope = unit.symbol_name.clone();
                let floor = body.start_position().row + 2;
                self.collect_units(source, body, member_scope.as_deref().or(Some("")), floor, &mut unit.members);
            }
            // Free functions inside `mod` are not methods.
            if chunk_type == ChunkType::Module {
                for member in &mut unit.members {
                    if member.chunk_type == ChunkType::Method {
                        member.chunk_type = ChunkType::Function;
                    }
                }
            }
        }

        Some(unit)
    }

    fn python_unit(&self, source: &Source<'_>, node: Node, scope: Option<&str>) -> Option<SyntaxUnit> {
        if node.kind() == "decorated_definition" {
            let inner = node.child_by_field_name("definition")?;
            let mut unit = self.python_unit(source, inner, scope)?;
            unit.start_line = node.start_position().row + 1;
            return Some(unit);
        }

        let chunk_type = match node.kind() {
            "function_definition" if scope.is_some() => ChunkType::Method,
            "function_definition" => ChunkType::Function,
            "class_definition" => ChunkType::Class,
            _ => return None,
        };

        let name = Self::extract_symbol_name(source, node);
        let mut unit = Self::base_unit(node, chunk_type, name, scope, ".");

        if chunk_type == ChunkType::Class {
            if let Some(body) = child_of_kind(node, "block") {
                let member_scope = unit.symbol_name.clone();
                let floor = node.start_position().row + 2;
                self.collect_units(source, body, member_scope.as_deref().or(Some("")), floor, &mut unit.members);
            }
        }

        Some(unit)
    }

    fn js_unit(&self, source: &Source<'_>, node: Node, scope: Option<&str>) -> Option<SyntaxUnit> {
        match node.kind() {
            // `export function f()` / `export default class C {}`: the range covers the export.
            "export_statement" => {
                let inner = node
                    .child_by_field_name("declaration")
                    .or_else(|| named_children(node).into_iter().find(|c| c.kind() != "comment"))?;
                let mut unit = self.js_unit(source, inner, scope)?;
                unit.start_line = node.start_position().row + 1;
                unit.end_line = unit.end_line.max(node.end_position().row + 1);
                return Some(unit);
            }
            "lexical_declaration" | "variable_declaration" => {
                return Self::js_function_binding(source, node, scope);
            }
            _ => {}
        }

        let chunk_type = match node.kind() {
            "function_declaration" | "generator_function_declaration" => ChunkType::Function,
            "class_declaration" | "abstract_class_declaration" | "class" => ChunkType::Class,
            "method_definition" => ChunkType::Method,
            "field_definition" | "public_field_definition" => ChunkType::Variable,
            "interface_declaration" => ChunkType::Interface,
            "type_alias_declaration" => ChunkType::Type,
            "enum_declaration" => ChunkType::Enum,
            _ => return None,
        };

        let name = Self::extract_symbol_name(source, node);
        let mut unit = Self::base_unit(node, chunk_type, name, scope, ".");

        if chunk_type == ChunkType::Class {
            if let Some(body) = child_of_kind(node, "class_body") {
                let member_scope = unit.symbol_name.clone();
                let floor = body.start_position().row + 2;
                self.collect_units(source, body, member_scope.as_deref().or(Some("")), floor, &mut unit.members);
            }
        }

        Some(unit)
    }

    /// `const handler = (req) => {...}` and `const f = function () {...}`
    fn js_function_binding(source: &Source<'_>, node: Node, scope: Option<&str>) -> Option<SyntaxUnit> {
        let declarator = child_of_kind(node, "variable_declarator")?;
        let value = declarator.child_by_field_name("value")?;
        if !matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "function" | "generator_function"
        ) {
            return None;
        }
        let name = declarator
            .child_by_field_name("name")
            .map(|n| source.node_text(n).to_string());
        Some(Self::base_unit(node, ChunkType::Function, name, scope, "."))
    }

    fn base_unit(
        node: Node,
        chunk_type: ChunkType,
        symbol_name: Option<String>,
        scope: Option<&str>,
        separator: &str,
    ) -> SyntaxUnit {
        let parent_scope = scope.filter(|s| !s.is_empty()).map(str::to_string);
        let qualified_name = match (&parent_scope, &symbol_name) {
            (Some(parent), Some(name)) => Some(format!("{parent}{separator}{name}")),
            (None, Some(name)) => Some(name.clone()),
            _ => None,
        };

        SyntaxUnit {
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            chunk_type,
            symbol_name,
            parent_scope,
            qualified_name,
            members: Vec::new(),
        }
    }

    /// Walk upward over comment/attribute lines directly above `start_line`. A blank line
    /// ends the block; the result never goes below `lower`.
    fn extend_over_leading_trivia(&self, source: &Source<'_>, start_line: usize, lower: usize) -> usize {
        let mut start = start_line;
        while start > lower.max(1) {
            let Some(line) = source.lines.get(start - 2) else {
                break;
            };
            if !self.language.is_leading_trivia(line) {
                break;
            }
            start -= 1;
        }
        start
    }

    /// Extract the target of an impl block (struct/trait name)
    fn extract_impl_target(source: &Source<'_>, impl_node: Node) -> Option<String> {
        let target = impl_node.child_by_field_name("type")?;
        match target.kind() {
            // impl MyStruct
            "type_identifier" => Some(source.node_text(target).to_string()),
            // impl<T> MyStruct<T>, impl module::MyStruct
            "generic_type" | "scoped_type_identifier" => {
                let mut cursor = target.walk();
                let found = target
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "type_identifier")
                    .last()
                    .map(|c| source.node_text(c).to_string());
                found.or_else(|| {
                    child_of_kind(target, "scoped_type_identifier")
                        .and_then(|inner| inner.child_by_field_name("name"))
                        .map(|n| source.node_text(n).to_string())
                })
            }
            _ => Some(source.node_text(target).to_string()),
        }
    }

    /// Extract symbol name from AST node
    fn extract_symbol_name(source: &Source<'_>, node: Node) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(source.node_text(name).to_string());
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let is_name_node = matches!(
                child.kind(),
                "identifier" | "name" | "type_identifier" | "field_identifier" | "property_identifier"
            );

            if is_name_node {
                return Some(source.node_text(child).to_string());
            }
        }
        None
    }
}

/// Two units sharing a line (`struct A; struct B;`) are folded into the first one so
/// that ranges never overlap.
fn push_unit(out: &mut Vec<SyntaxUnit>, unit: SyntaxUnit) {
    if let Some(prev) = out.last_mut() {
        if unit.start_line <= prev.end_line {
            prev.end_line = prev.end_line.max(unit.end_line);
            prev.members.clear();
            return;
        }
    }
    out.push(unit);
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}
