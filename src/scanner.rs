//! Content scanner: walks the page tree and selects eligible leaf blocks.
//! Bottom-most block wins — a block containing another block tag is never
//! selected itself, preventing duplicate translation of nested containers.

use tracing::debug;

use crate::annotator::ATTR_ENTRY_ID;
use crate::lang;
use crate::page::{NodeId, PageTree};

/// Attribute marking the pipeline's own UI subtree; never scanned.
pub const ATTR_UI_CONTAINER: &str = "data-lingo-container";

/// Tags treated as translation units.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "address",
    "article", "aside", "figcaption", "td", "th", "dd", "dt",
];

/// Tags rejected in every scope: no text worth translating, or text that
/// must never be touched.
const TECHNICAL_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "img", "input", "textarea", "code", "head",
    "meta", "button", "link", "map", "object", "video", "audio",
];

/// Landmarks rejected only in main-content scope.
const STRUCTURAL_TAGS: &[&str] = &["header", "footer", "nav", "aside", "menu", "dialog"];

/// Scan scope: the whole page, or just the main-content landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    WholePage,
    MainContent,
}

/// Produce the eligible leaf blocks in document order. Side-effect free;
/// callers feed the result into the scheduler.
pub fn scan(page: &PageTree, scope: ScanScope) -> Vec<NodeId> {
    let root = match scope {
        ScanScope::WholePage => page.root(),
        ScanScope::MainContent => find_main_root(page).unwrap_or_else(|| page.root()),
    };

    let mut blocks = Vec::new();
    collect(page, root, scope, &mut blocks);
    debug!(candidates = blocks.len(), scope = ?scope, "scan pass complete");
    blocks
}

/// First `article`/`main`/`role=main` landmark, if any.
fn find_main_root(page: &PageTree) -> Option<NodeId> {
    page.descendants(page.root()).into_iter().find(|&n| {
        matches!(page.tag(n), Some("article") | Some("main"))
            || page.attr(n, "role") == Some("main")
    })
}

fn collect(page: &PageTree, node: NodeId, scope: ScanScope, out: &mut Vec<NodeId>) {
    for &child in page.children(node) {
        let Some(tag) = page.tag(child) else {
            continue; // text node
        };
        if excluded(page, child, tag, scope) {
            continue;
        }
        if BLOCK_TAGS.contains(&tag)
            && !has_block_descendant(page, child)
            && lang::contains_han(&page.text_content(child))
        {
            out.push(child);
            // A qualifying leaf is atomic; never split into sub-blocks.
            continue;
        }
        collect(page, child, scope, out);
    }
}

/// Whether a subtree must not be entered at all.
fn excluded(page: &PageTree, node: NodeId, tag: &str, scope: ScanScope) -> bool {
    if TECHNICAL_TAGS.contains(&tag) {
        return true;
    }
    if scope == ScanScope::MainContent && STRUCTURAL_TAGS.contains(&tag) {
        return true;
    }
    if page.attr(node, "contenteditable").is_some() || page.attr(node, "hidden").is_some() {
        return true;
    }
    // Already pending or terminal: discovery never re-enters.
    if page.scan_state(node).is_some() {
        return true;
    }
    // The pipeline's own UI and already-annotated units.
    if page.attr(node, ATTR_UI_CONTAINER).is_some() || page.attr(node, ATTR_ENTRY_ID).is_some() {
        return true;
    }
    false
}

fn has_block_descendant(page: &PageTree, node: NodeId) -> bool {
    page.descendants(node)
        .into_iter()
        .any(|n| page.tag(n).map(|t| BLOCK_TAGS.contains(&t)).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ScanState;

    fn add_block(page: &mut PageTree, parent: NodeId, tag: &str, text: &str) -> NodeId {
        let el = page.element(tag);
        let t = page.text(text);
        page.append_child(el, t);
        page.append_child(parent, el);
        el
    }

    #[test]
    fn bottom_most_block_wins() {
        let mut page = PageTree::new();
        let root = page.root();
        let outer = page.element("div");
        page.append_child(root, outer);
        let inner = add_block(&mut page, outer, "p", "中文内容");

        let blocks = scan(&page, ScanScope::WholePage);
        assert_eq!(blocks, vec![inner]);
    }

    #[test]
    fn non_han_blocks_are_ignored() {
        let mut page = PageTree::new();
        let root = page.root();
        add_block(&mut page, root, "p", "english only");
        let zh = add_block(&mut page, root, "p", "中文");
        assert_eq!(scan(&page, ScanScope::WholePage), vec![zh]);
    }

    #[test]
    fn tagged_blocks_are_never_rediscovered() {
        let mut page = PageTree::new();
        let root = page.root();
        let a = add_block(&mut page, root, "p", "第一段");
        let b = add_block(&mut page, root, "p", "第二段");
        page.set_scan_state(a, ScanState::Pending);
        assert_eq!(scan(&page, ScanScope::WholePage), vec![b]);

        page.set_scan_state(a, ScanState::Done);
        page.set_scan_state(b, ScanState::Error);
        assert!(scan(&page, ScanScope::WholePage).is_empty());
    }

    #[test]
    fn technical_editable_and_own_ui_subtrees_are_excluded() {
        let mut page = PageTree::new();
        let root = page.root();
        let script = page.element("script");
        let t = page.text("中文注释");
        page.append_child(script, t);
        page.append_child(root, script);

        let editable = add_block(&mut page, root, "div", "可编辑中文");
        page.set_attr(editable, "contenteditable", "true");

        let ui = page.element("div");
        page.set_attr(ui, ATTR_UI_CONTAINER, "true");
        page.append_child(root, ui);
        add_block(&mut page, ui, "p", "挂件中文");

        let hidden = add_block(&mut page, root, "p", "隐藏中文");
        page.set_attr(hidden, "hidden", "");

        assert!(scan(&page, ScanScope::WholePage).is_empty());
    }

    #[test]
    fn main_content_scope_uses_landmark_and_skips_structure() {
        let mut page = PageTree::new();
        let root = page.root();
        add_block(&mut page, root, "p", "页面顶部中文");

        let article = page.element("article");
        page.append_child(root, article);
        let in_article = add_block(&mut page, article, "p", "正文中文");
        let nav = page.element("nav");
        page.append_child(article, nav);
        add_block(&mut page, nav, "li", "导航中文");

        assert_eq!(scan(&page, ScanScope::MainContent), vec![in_article]);

        // Whole-page scope still sees navigation list items.
        let whole = scan(&page, ScanScope::WholePage);
        assert_eq!(whole.len(), 3);
    }
}
