use crate::dom::{DomTree, NodeHandle};
use scraper::{ElementRef, Html, Node};
use std::collections::HashMap;

/// Parse raw HTML into an owned mutable tree.
///
/// Script/style subtrees are kept: excluding them from rewriting is the
/// classifier's responsibility, and svg subtrees carry the decorative
/// markers the engine clones.
pub fn parse_html(html: &str) -> DomTree {
    let document = Html::parse_document(html);
    let root = NodeHandle::document();
    root.append_child(&convert_element(document.root_element()));
    DomTree::new(root)
}

fn convert_element(el: ElementRef<'_>) -> NodeHandle {
    let tag = el.value().name.local.as_ref().to_string();
    let attributes: HashMap<String, String> = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let node = NodeHandle::element(tag, attributes);

    for child_ref in el.children() {
        match child_ref.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child_ref) {
                    node.append_child(&convert_element(child_el));
                }
            }
            Node::Text(t) => {
                let s = t.text.to_string();
                if !s.trim().is_empty() {
                    node.append_child(&NodeHandle::text(s));
                }
            }
            _ => {}
        }
    }

    node
}
