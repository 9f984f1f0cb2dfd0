//! Rule tree of compiled stylesheets.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Compiled output is plain CSS, so a shallow tree is enough for reduction:
//! top-level rules with their declarations, and at-rules kept as raw text.
//! Parsing is built on `cssparser`. Comments are treated as whitespace by the
//! tokenizer and stripped from declaration values, so they never appear in the
//! tree. Rules that fail to parse are dropped. A leading `@charset` is
//! consumed by the stylesheet parser itself and never becomes a node.
//!
//! [`Stylesheet`] serializes back in the expanded style compilers emit:
//!
//! ```text
//! .btn {
//!   color: #1890ff;
//! }
//! ```

use std::fmt;

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser,
};
use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());

/// A single declaration (`property: value [!important]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name
    pub property: String,
    /// Raw value text without comments and without `!important`
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }
}

/// A style rule: raw selector text and its declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

/// An at-rule kept as raw text (`@media`, `@font-face`, `@charset`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// Name without the `@`
    pub name: String,
    pub prelude: String,
    /// Raw block contents, `None` for statement at-rules like `@charset "UTF-8";`
    pub block: Option<String>,
}

/// A top-level node of a compiled stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(StyleRule),
    AtRule(AtRule),
}

/// A parsed compiled stylesheet, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

impl Stylesheet {
    /// Iterate over the style rules, skipping at-rules.
    pub fn rules(&self) -> impl Iterator<Item = &StyleRule> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Rule(rule) => Some(rule),
            Node::AtRule(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            match node {
                Node::Rule(rule) => {
                    writeln!(f, "{} {{", rule.selector)?;
                    for decl in &rule.declarations {
                        let important = if decl.important { " !important" } else { "" };
                        writeln!(f, "  {}: {}{};", decl.property, decl.value, important)?;
                    }
                    writeln!(f, "}}")?;
                }
                Node::AtRule(at_rule) => {
                    let prelude = if at_rule.prelude.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", at_rule.prelude)
                    };
                    match &at_rule.block {
                        Some(block) => {
                            writeln!(f, "@{}{} {{\n{}\n}}", at_rule.name, prelude, block.trim())?
                        }
                        None => writeln!(f, "@{}{};", at_rule.name, prelude)?,
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse compiled CSS into a [`Stylesheet`].
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top = TopLevelParser;

    let nodes = StyleSheetParser::new(&mut parser, &mut top)
        .flatten()
        .collect();
    Stylesheet { nodes }
}

fn strip_comments(text: &str) -> String {
    BLOCK_COMMENT.replace_all(text, "").trim().to_string()
}

/// Split a trailing `!important` off a raw value.
fn split_important(value: &str) -> (String, bool) {
    let trimmed = value.trim();
    if let Some(pos) = trimmed.rfind("!important") {
        if trimmed[pos..].trim() == "!important" {
            return (trimmed[..pos].trim_end().to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}

/// Consume everything left in `input` and return it as raw text.
fn consume_rest<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next_including_whitespace_and_comments().is_ok() {}
    input.slice_from(start)
}

struct TopLevelParser;

impl<'i> QualifiedRuleParser<'i> for TopLevelParser {
    type Prelude = String;
    type QualifiedRule = Node;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(strip_comments(consume_rest(input)))
    }

    fn parse_block<'t>(
        &mut self,
        selector: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut body = BodyParser;
        let declarations = RuleBodyParser::new(input, &mut body).flatten().collect();
        Ok(Node::Rule(StyleRule {
            selector,
            declarations,
        }))
    }
}

impl<'i> AtRuleParser<'i> for TopLevelParser {
    type Prelude = (String, String);
    type AtRule = Node;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok((name.as_ref().to_string(), strip_comments(consume_rest(input))))
    }

    fn parse_block<'t>(
        &mut self,
        (name, prelude): Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        let block = consume_rest(input).to_string();
        Ok(Node::AtRule(AtRule {
            name,
            prelude,
            block: Some(block),
        }))
    }

    fn rule_without_block(
        &mut self,
        (name, prelude): Self::Prelude,
        _start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        Ok(Node::AtRule(AtRule {
            name,
            prelude,
            block: None,
        }))
    }
}

/// Declaration parser for rule bodies. Nested rules are not expected in
/// compiled output and are skipped.
struct BodyParser;

impl<'i> DeclarationParser<'i> for BodyParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let raw = strip_comments(consume_rest(input));
        let (value, important) = split_important(&raw);
        Ok(Declaration {
            property: name.to_ascii_lowercase(),
            value,
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for BodyParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for BodyParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for BodyParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_rules_and_declarations() {
        let css = ".btn {\n  color: #1890ff;\n  font-size: 12px;\n}\n.a, .b { background: red !important }";
        let sheet = parse_stylesheet(css);

        let rules: Vec<&StyleRule> = sheet.rules().collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selector, ".btn");
        assert_eq!(
            rules[0].declarations,
            vec![
                Declaration::new("color", "#1890ff"),
                Declaration::new("font-size", "12px"),
            ]
        );
        assert_eq!(rules[1].selector, ".a, .b");
        assert_eq!(rules[1].declarations[0].value, "red");
        assert!(rules[1].declarations[0].important);
    }

    #[test]
    fn test_comments_are_dropped() {
        let css = "/* header */\n.a {\n  /* inner */\n  color: red /* trailing */;\n}";
        let sheet = parse_stylesheet(css);
        assert_eq!(sheet.to_string(), ".a {\n  color: red;\n}\n");
    }

    #[test]
    fn test_at_rules_are_kept_as_nodes() {
        let css = "@charset \"UTF-8\";\n@media screen { .a { color: red; } }\n.b { color: blue; }";
        let sheet = parse_stylesheet(css);

        assert_eq!(sheet.nodes.len(), 2);
        match &sheet.nodes[0] {
            Node::AtRule(at_rule) => {
                assert_eq!(at_rule.name, "media");
                assert_eq!(at_rule.prelude, "screen");
                assert!(at_rule.block.as_deref().unwrap().contains(".a"));
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
        match &sheet.nodes[1] {
            Node::Rule(rule) => assert_eq!(rule.selector, ".b"),
            other => panic!("expected rule, got {:?}", other),
        }
        assert!(!sheet.to_string().contains("@charset"));
    }

    #[test]
    fn test_display_round_trip_is_stable() {
        let css = ".a {\n  color: red;\n  border: 1px solid #000;\n}\n";
        let once = parse_stylesheet(css).to_string();
        let twice = parse_stylesheet(&once).to_string();
        assert_eq!(once, css);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_split_important() {
        assert_eq!(split_important("red !important"), ("red".to_string(), true));
        assert_eq!(split_important("red"), ("red".to_string(), false));
    }
}
