//! Parsed HTML documents and the content transformer.

use scraper::node::Text;
use scraper::{Html, Node};

use crate::rewrite::tags::TagSet;
use crate::rewrite::text::{apply, Insertion, TextRewriter};
use crate::rewrite::RewriteError;

/// Counters for a single transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub elements: usize,
    pub decorations: usize,
}

/// A parsed page, owned by one request and dropped after serialization.
pub struct Document {
    html: Html,
    stats: RewriteStats,
}

impl Document {
    /// Parse markup with browser-style error recovery.
    pub fn parse(raw: &str) -> Result<Self, RewriteError> {
        let html = Html::parse_document(raw);
        let has_root = html
            .tree
            .root()
            .children()
            .any(|child| child.value().is_element());
        if !has_root {
            return Err(RewriteError::Parse("no root element".to_string()));
        }
        if !html.errors.is_empty() {
            tracing::trace!(recovered = html.errors.len(), "Parsed with markup errors");
        }
        Ok(Self {
            html,
            stats: RewriteStats::default(),
        })
    }

    /// Decorate the text of every eligible element in document order.
    ///
    /// Each text node belongs to its nearest eligible ancestor. Within one
    /// element, adjacent text nodes are matched as a single string so that a
    /// word split by inline markup still counts, and decorations are written
    /// back into the node where the word ends. A nested eligible element
    /// breaks the run and is rewritten on its own turn.
    pub fn rewrite_text(&mut self, tags: &TagSet, rewriter: &TextRewriter) -> RewriteStats {
        let targets: Vec<_> = self
            .html
            .tree
            .root()
            .descendants()
            .filter(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|element| tags.matches(element.name()))
            })
            .map(|node| node.id())
            .collect();

        let mut stats = RewriteStats::default();
        for target in targets {
            let runs = {
                let Some(element) = self.html.tree.get(target) else {
                    continue;
                };
                let mut runs = Vec::new();
                let mut current = Vec::new();
                let mut stack: Vec<_> = element.children().collect();
                stack.reverse();
                while let Some(node) = stack.pop() {
                    match node.value() {
                        Node::Text(text) => current.push((node.id(), String::from(&**text))),
                        Node::Element(nested) if tags.matches(nested.name()) => {
                            if !current.is_empty() {
                                runs.push(std::mem::take(&mut current));
                            }
                        }
                        Node::Element(_) => {
                            let mut children: Vec<_> = node.children().collect();
                            children.reverse();
                            stack.extend(children);
                        }
                        _ => {}
                    }
                }
                if !current.is_empty() {
                    runs.push(current);
                }
                runs
            };

            let mut decorated = 0;
            for run in &runs {
                let (changed, count) = rewrite_run(rewriter, &run[..]);
                decorated += count;
                for (id, text) in changed {
                    if let Some(mut node) = self.html.tree.get_mut(id) {
                        *node.value() = Node::Text(Text { text: text.into() });
                    }
                }
            }
            if decorated > 0 {
                stats.elements += 1;
                stats.decorations += decorated;
            }
        }

        self.stats.elements += stats.elements;
        self.stats.decorations += stats.decorations;
        stats
    }

    pub fn stats(&self) -> RewriteStats {
        self.stats
    }

    /// Serialize the whole tree back to markup.
    pub fn to_html(&self) -> String {
        self.html.html()
    }
}

/// Rewrite a run of adjacent text nodes as one string. Returns the nodes whose
/// text changed and the number of decorations placed.
fn rewrite_run<Id: Copy>(rewriter: &TextRewriter, run: &[(Id, String)]) -> (Vec<(Id, String)>, usize) {
    let content: String = run.iter().map(|(_, text)| text.as_str()).collect();
    if content.is_empty() {
        return (Vec::new(), 0);
    }
    let plan = rewriter.plan(&content);
    if plan.is_empty() {
        return (Vec::new(), 0);
    }

    let mut changed = Vec::new();
    let mut pending = plan.iter().peekable();
    let mut base = 0;
    for (id, text) in run {
        let end = base + text.len();
        let mut local = Vec::new();
        while let Some(insertion) = pending.next_if(|insertion| insertion.offset <= end) {
            local.push(Insertion {
                offset: insertion.offset - base,
                symbol: insertion.symbol,
            });
        }
        if !local.is_empty() {
            changed.push((*id, apply(text, &local)));
        }
        base = end;
    }
    (changed, plan.len())
}

/// Parses pages and decorates their text-bearing elements.
#[derive(Debug, Clone)]
pub struct ContentTransformer {
    tags: TagSet,
    rewriter: TextRewriter,
}

impl ContentTransformer {
    pub fn new(tags: TagSet, rewriter: TextRewriter) -> Self {
        Self { tags, rewriter }
    }

    pub fn transform(&self, raw: &str) -> Result<Document, RewriteError> {
        let mut document = Document::parse(raw)?;
        document.rewrite_text(&self.tags, &self.rewriter);
        Ok(document)
    }

    /// Transform a fetched body. Bodies that are not UTF-8 cannot be
    /// re-serialized faithfully and are reported as parse failures.
    pub fn transform_bytes(&self, raw: &[u8]) -> Result<Document, RewriteError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| RewriteError::Parse(format!("body is not valid UTF-8: {e}")))?;
        self.transform(text)
    }

    pub fn rewriter(&self) -> &TextRewriter {
        &self.rewriter
    }
}
