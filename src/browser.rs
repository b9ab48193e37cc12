//! Capability interface over the browser-automation layer.
//!
//! Scrapers never build selector strings by hand. They describe where a
//! field lives as a [`Locator`]: a semantic anchor (usually a visible text
//! landmark) plus a chain of structural steps relative to it. The browser
//! implementation decides how that path is evaluated.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::BrowserError;

/// Opaque handle to a node realized in the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(String);

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Element(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Where a lookup starts.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Document,
    Within(&'a Element),
}

/// The node a locator path starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Any descendant with this tag.
    Tag(String),
    /// A direct child with this tag.
    Child(String),
    /// A `tag` whose own text contains the landmark.
    Text { tag: String, text: String },
    /// A `tag` whose attribute equals `value`.
    AttrEquals { tag: String, attr: String, value: String },
    /// A `tag` whose attribute contains `value`.
    AttrContains { tag: String, attr: String, value: String },
    /// Any element with this local name, for namespaced (SVG) markup.
    LocalName(String),
}

/// One structural hop away from the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Up(usize),
    Child { tag: String, nth: Option<usize> },
}

/// Declarative path: anchor first, then structural steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    anchor: Anchor,
    steps: Vec<Step>,
}

impl Locator {
    pub fn new(anchor: Anchor) -> Self {
        Locator { anchor, steps: Vec::new() }
    }

    pub fn tag(tag: &str) -> Self {
        Self::new(Anchor::Tag(tag.to_string()))
    }

    pub fn child(tag: &str) -> Self {
        Self::new(Anchor::Child(tag.to_string()))
    }

    pub fn text(tag: &str, text: &str) -> Self {
        Self::new(Anchor::Text { tag: tag.to_string(), text: text.to_string() })
    }

    pub fn attr_eq(tag: &str, attr: &str, value: &str) -> Self {
        Self::new(Anchor::AttrEquals {
            tag: tag.to_string(),
            attr: attr.to_string(),
            value: value.to_string(),
        })
    }

    pub fn attr_contains(tag: &str, attr: &str, value: &str) -> Self {
        Self::new(Anchor::AttrContains {
            tag: tag.to_string(),
            attr: attr.to_string(),
            value: value.to_string(),
        })
    }

    pub fn local_name(name: &str) -> Self {
        Self::new(Anchor::LocalName(name.to_string()))
    }

    pub fn up(mut self, levels: usize) -> Self {
        if levels == 0 {
            return self;
        }
        match self.steps.last_mut() {
            Some(Step::Up(n)) => *n += levels,
            _ => self.steps.push(Step::Up(levels)),
        }
        self
    }

    pub fn then(mut self, tag: &str) -> Self {
        self.steps.push(Step::Child { tag: tag.to_string(), nth: None });
        self
    }

    /// Child step with a 1-based position, as in XPath.
    pub fn then_nth(mut self, tag: &str, nth: usize) -> Self {
        self.steps.push(Step::Child { tag: tag.to_string(), nth: Some(nth) });
        self
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Renders the path as XPath. Document lookups are absolute, lookups
    /// within an element are relative to it.
    pub fn to_xpath(&self, relative: bool) -> String {
        let prefix = if relative { "." } else { "" };
        let mut out = match &self.anchor {
            Anchor::Tag(tag) => format!("{prefix}//{tag}"),
            Anchor::Child(tag) => {
                if relative { format!("./{tag}") } else { format!("/{tag}") }
            }
            Anchor::Text { tag, text } => {
                format!("{prefix}//{tag}[contains(text(),{})]", quote(text))
            }
            Anchor::AttrEquals { tag, attr, value } => {
                format!("{prefix}//{tag}[@{attr}={}]", quote(value))
            }
            Anchor::AttrContains { tag, attr, value } => {
                format!("{prefix}//{tag}[contains(@{attr},{})]", quote(value))
            }
            Anchor::LocalName(name) => format!("{prefix}//*[local-name()={}]", quote(name)),
        };
        for step in &self.steps {
            match step {
                Step::Up(n) => {
                    for _ in 0..*n {
                        out.push_str("/..");
                    }
                }
                Step::Child { tag, nth: Some(i) } => out.push_str(&format!("/{tag}[{i}]")),
                Step::Child { tag, nth: None } => out.push_str(&format!("/{tag}")),
            }
        }
        out
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xpath(false))
    }
}

// XPath 1.0 has no escapes; pick the quote the literal does not contain.
fn quote(s: &str) -> String {
    if s.contains('"') {
        format!("'{s}'")
    } else {
        format!("\"{s}\"")
    }
}

/// What the scrapers need from a browser session.
///
/// Lookups that match nothing return `Ok(None)` / an empty list. `Err` is
/// reserved for the session itself failing.
pub trait Browser {
    fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    fn find(&self, scope: Scope<'_>, locator: &Locator) -> Result<Option<Element>, BrowserError>;

    fn find_all(&self, scope: Scope<'_>, locator: &Locator) -> Result<Vec<Element>, BrowserError>;

    fn scroll_into_view(&self, element: &Element) -> Result<(), BrowserError>;

    fn hover(&self, element: &Element) -> Result<(), BrowserError>;

    fn click(&self, element: &Element) -> Result<(), BrowserError>;

    fn type_text(&self, element: &Element, text: &str) -> Result<(), BrowserError>;

    fn text(&self, element: &Element) -> Result<String, BrowserError>;

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError>;

    fn outer_html(&self, element: &Element) -> Result<String, BrowserError>;

    /// URLs of the network resources the page has requested so far.
    fn observed_urls(&self) -> Result<Vec<String>, BrowserError>;

    /// Ends the session. Calling it again is a no-op.
    fn close(&self) -> Result<(), BrowserError>;

    /// Polls until at least one node matches or `timeout` elapses.
    fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
        poll: Duration,
    ) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.find_all(Scope::Document, locator)?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(poll);
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory browser for exercising scrapers without Chrome.

    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use super::*;

    #[derive(Default, Clone)]
    pub struct FakeNode {
        pub text: String,
        pub attrs: HashMap<String, String>,
        pub html: String,
    }

    impl FakeNode {
        pub fn text(text: &str) -> Self {
            FakeNode { text: text.to_string(), ..Default::default() }
        }

        pub fn attr(mut self, name: &str, value: &str) -> Self {
            self.attrs.insert(name.to_string(), value.to_string());
            self
        }

        pub fn html(mut self, html: &str) -> Self {
            self.html = html.to_string();
            self
        }
    }

    const DOC: &str = "#document";

    /// Nodes are registered under `(scope id, rendered xpath)`. Every scroll
    /// reveals the next batch from `scroll_batches`, so card lists can grow
    /// (or be virtualized) the way a lazily loading listing does.
    #[derive(Default)]
    pub struct FakeBrowser {
        nodes: RefCell<HashMap<String, FakeNode>>,
        index: RefCell<HashMap<(String, String), Vec<String>>>,
        scroll_batches: RefCell<Vec<(String, Vec<String>)>>,
        urls: RefCell<Vec<String>>,
        url_batches: RefCell<Vec<Vec<String>>>,
        next_id: Cell<usize>,
        pub navigations: RefCell<Vec<String>>,
        pub scrolls: Cell<usize>,
        pub hovers: RefCell<Vec<String>>,
        pub clicks: RefCell<Vec<String>>,
        pub typed: RefCell<Vec<String>>,
        pub closed: Cell<usize>,
        pub fail_navigation: Cell<bool>,
    }

    impl FakeBrowser {
        pub fn new() -> Self {
            Self::default()
        }

        fn alloc(&self, node: FakeNode) -> String {
            let id = format!("n{}", self.next_id.get());
            self.next_id.set(self.next_id.get() + 1);
            self.nodes.borrow_mut().insert(id.clone(), node);
            id
        }

        fn key(scope: Scope<'_>, locator: &Locator) -> (String, String) {
            match scope {
                Scope::Document => (DOC.to_string(), locator.to_xpath(false)),
                Scope::Within(el) => (el.id().to_string(), locator.to_xpath(true)),
            }
        }

        /// Registers a node matching `locator` within `scope`, returning its handle.
        pub fn add(&self, scope: Scope<'_>, locator: &Locator, node: FakeNode) -> Element {
            let id = self.alloc(node);
            self.index
                .borrow_mut()
                .entry(Self::key(scope, locator))
                .or_default()
                .push(id.clone());
            Element::new(id)
        }

        /// Queues the full document-level match set for `locator` after the
        /// next scroll.
        pub fn on_scroll(&self, locator: &Locator, nodes: Vec<FakeNode>) {
            let ids = nodes.into_iter().map(|n| self.alloc(n)).collect();
            self.scroll_batches.borrow_mut().push((locator.to_xpath(false), ids));
        }

        pub fn set_urls(&self, urls: &[&str]) {
            *self.urls.borrow_mut() = urls.iter().map(|u| u.to_string()).collect();
        }

        /// URLs the page "requests" after each subsequent scroll.
        pub fn on_scroll_urls(&self, urls: &[&str]) {
            self.url_batches
                .borrow_mut()
                .push(urls.iter().map(|u| u.to_string()).collect());
        }

        fn node(&self, element: &Element) -> Result<FakeNode, BrowserError> {
            self.nodes
                .borrow()
                .get(element.id())
                .cloned()
                .ok_or_else(|| BrowserError::Chrome(anyhow::anyhow!("stale element {}", element.id())))
        }
    }

    impl Browser for FakeBrowser {
        fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            if self.closed.get() > 0 {
                return Err(BrowserError::Closed);
            }
            if self.fail_navigation.get() {
                return Err(BrowserError::Chrome(anyhow::anyhow!("net::ERR_NAME_NOT_RESOLVED at {url}")));
            }
            self.navigations.borrow_mut().push(url.to_string());
            Ok(())
        }

        fn find(&self, scope: Scope<'_>, locator: &Locator) -> Result<Option<Element>, BrowserError> {
            Ok(self.find_all(scope, locator)?.into_iter().next())
        }

        fn find_all(&self, scope: Scope<'_>, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
            Ok(self
                .index
                .borrow()
                .get(&Self::key(scope, locator))
                .map(|ids| ids.iter().cloned().map(Element::new).collect())
                .unwrap_or_default())
        }

        fn scroll_into_view(&self, element: &Element) -> Result<(), BrowserError> {
            self.node(element)?;
            self.scrolls.set(self.scrolls.get() + 1);
            let mut batches = self.scroll_batches.borrow_mut();
            if !batches.is_empty() {
                let (xpath, ids) = batches.remove(0);
                self.index.borrow_mut().insert((DOC.to_string(), xpath), ids);
            }
            let mut url_batches = self.url_batches.borrow_mut();
            if !url_batches.is_empty() {
                let more = url_batches.remove(0);
                self.urls.borrow_mut().extend(more);
            }
            Ok(())
        }

        fn hover(&self, element: &Element) -> Result<(), BrowserError> {
            self.hovers.borrow_mut().push(element.id().to_string());
            Ok(())
        }

        fn click(&self, element: &Element) -> Result<(), BrowserError> {
            self.clicks.borrow_mut().push(element.id().to_string());
            Ok(())
        }

        fn type_text(&self, _element: &Element, text: &str) -> Result<(), BrowserError> {
            self.typed.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn text(&self, element: &Element) -> Result<String, BrowserError> {
            Ok(self.node(element)?.text)
        }

        fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
            Ok(self.node(element)?.attrs.get(name).cloned())
        }

        fn outer_html(&self, element: &Element) -> Result<String, BrowserError> {
            Ok(self.node(element)?.html)
        }

        fn observed_urls(&self) -> Result<Vec<String>, BrowserError> {
            Ok(self.urls.borrow().clone())
        }

        fn close(&self) -> Result<(), BrowserError> {
            self.closed.set(self.closed.get() + 1);
            Ok(())
        }
    }
}
