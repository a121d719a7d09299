//! Element Query
//!
//! A small CSS selector subset for querySelector/querySelectorAll:
//! type, `*`, `.class`, `#id`, `[attr]`, `[attr=value]`, compound
//! selectors, descendant (` `) and child (`>`) combinators, and `,` groups.

use std::iter::Peekable;
use std::str::Chars;

use crate::{DomTree, ElementData, NodeId};

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Compounds left to right; the combinator links a compound to the one before it
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Parse a selector string; `None` when it is empty or malformed
    pub fn parse(input: &str) -> Option<Self> {
        let groups = input
            .split(',')
            .map(|group| ComplexSelector::parse(group.trim()))
            .collect::<Option<Vec<_>>>()?;
        if groups.is_empty() {
            return None;
        }
        Some(Self { groups })
    }

    /// Check whether an element matches any group
    pub fn matches(&self, tree: &DomTree, element: NodeId) -> bool {
        self.groups.iter().any(|g| g.matches(tree, element, g.parts.len()))
    }
}

impl ComplexSelector {
    fn parse(input: &str) -> Option<Self> {
        let mut chars = input.chars().peekable();
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;

        loop {
            skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some('>') => {
                    if parts.is_empty() {
                        return None;
                    }
                    chars.next();
                    combinator = Combinator::Child;
                    skip_whitespace(&mut chars);
                }
                _ => {}
            }
            let compound = Compound::parse(&mut chars)?;
            parts.push((combinator, compound));
            combinator = Combinator::Descendant;
        }

        if parts.is_empty() { None } else { Some(Self { parts }) }
    }

    /// Match compounds `..len` right to left, anchored at `element`
    fn matches(&self, tree: &DomTree, element: NodeId, len: usize) -> bool {
        let Some((combinator, compound)) = self.parts.get(len.wrapping_sub(1)) else {
            return false;
        };
        let Some(data) = tree.element(element) else {
            return false;
        };
        if !compound.matches(data) {
            return false;
        }
        if len == 1 {
            return true;
        }

        match combinator {
            Combinator::Child => tree
                .parent(element)
                .is_some_and(|parent| self.matches(tree, parent, len - 1)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent(element);
                while let Some(id) = ancestor {
                    if self.matches(tree, id, len - 1) {
                        return true;
                    }
                    ancestor = tree.parent(id);
                }
                false
            }
        }
    }
}

impl Compound {
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Option<Self> {
        let mut compound = Compound::default();
        let mut any = false;

        if chars.peek() == Some(&'*') {
            chars.next();
            any = true;
        } else if chars.peek().is_some_and(|&c| is_ident_char(c)) {
            compound.tag = Some(read_ident(chars).to_ascii_lowercase());
            any = true;
        }

        loop {
            match chars.peek() {
                Some('.') => {
                    chars.next();
                    compound.classes.push(non_empty(read_ident(chars))?);
                }
                Some('#') => {
                    chars.next();
                    compound.ids.push(non_empty(read_ident(chars))?);
                }
                Some('[') => {
                    chars.next();
                    let mut body = String::new();
                    loop {
                        match chars.next()? {
                            ']' => break,
                            c => body.push(c),
                        }
                    }
                    let attr = match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                            (non_empty(name.trim().to_ascii_lowercase())?, Some(value.to_string()))
                        }
                        None => (non_empty(body.trim().to_ascii_lowercase())?, None),
                    };
                    compound.attrs.push(attr);
                }
                _ => break,
            }
            any = true;
        }

        any.then_some(compound)
    }

    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if element.name != *tag {
                return false;
            }
        }
        self.ids.iter().all(|id| element.id() == Some(id.as_str()))
            && self.classes.iter().all(|class| element.has_class(class))
            && self.attrs.iter().all(|(name, value)| match value {
                Some(value) => element.get_attr(name) == Some(value.as_str()),
                None => element.has_attr(name),
            })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

impl DomTree {
    /// Elements under `scope` matching a parsed selector, in document order
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| selector.matches(self, id))
            .collect()
    }

    /// First element under `scope` matching `selector`
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.descendants(scope)
            .into_iter()
            .find(|&id| selector.matches(self, id))
    }

    /// Every element under `scope` matching `selector`
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Some(selector) => self.select(scope, &selector),
            None => {
                tracing::debug!("Ignoring unsupported selector: {}", selector);
                Vec::new()
            }
        }
    }

    /// Check if an element matches `selector`
    pub fn matches(&self, element: NodeId, selector: &str) -> bool {
        Selector::parse(selector).is_some_and(|s| s.matches(self, element))
    }
}
