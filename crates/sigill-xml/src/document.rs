#![forbid(unsafe_code)]

//! Owned XML document with element handles and text-splicing edits.

use sigill_core::ns::attr;
use sigill_core::Error;

/// A handle to an element of an [`XmlDocument`].
///
/// A handle records the element's position among all elements in document
/// order, together with the number of structural edits the document had
/// seen when the handle was taken. The document keeps a log of how each
/// edit moved element positions, so a handle taken before an edit still
/// finds the same element afterwards. A handle to an element that an edit
/// removed fails with [`Error::MissingElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    index: usize,
    generation: usize,
}

impl ElementRef {
    /// The document element. Valid in every generation.
    pub const ROOT: ElementRef = ElementRef { index: 0, generation: 0 };

    /// Position among the elements of the text the handle was taken from.
    pub fn index(self) -> usize {
        self.index
    }

    /// Find the node this handle points at in a parse of the text it was
    /// taken from. Use [`XmlDocument::resolve`] once the document has been
    /// edited since.
    pub fn resolve<'a, 'input>(
        self,
        doc: &'a roxmltree::Document<'input>,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        doc.descendants().filter(|n| n.is_element()).nth(self.index)
    }
}

/// How one structural edit moved element positions: `removed` elements
/// starting at `first` were replaced by `inserted` new ones.
#[derive(Debug, Clone, Copy)]
struct Shift {
    first: usize,
    removed: usize,
    inserted: usize,
}

/// An owned XML document.
///
/// The text is always well-formed: every constructor and every edit
/// re-parses it. To work with the tree call [`XmlDocument::parse_doc`].
/// Two documents are equal when their text is.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
    shifts: Vec<Shift>,
}

impl PartialEq for XmlDocument {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for XmlDocument {}

impl XmlDocument {
    /// Parse and validate XML, taking ownership of the text.
    pub fn parse(text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        crate::parse(&text)?;
        Ok(Self { text, shifts: Vec::new() })
    }

    /// Parse and validate XML from UTF-8 bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// The serialized document.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Parse the stored text into a temporary roxmltree document.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        crate::parse(&self.text)
    }

    /// Handle to the document element.
    pub fn root(&self) -> ElementRef {
        ElementRef::ROOT
    }

    /// Handle to `node`, an element of a parse of the current text.
    pub fn element_ref(&self, node: roxmltree::Node<'_, '_>) -> Option<ElementRef> {
        if !node.is_element() {
            return None;
        }
        node.document()
            .descendants()
            .filter(|n| n.is_element())
            .position(|n| n.id() == node.id())
            .map(|index| ElementRef { index, generation: self.shifts.len() })
    }

    /// The node `el` points at in `doc`, a parse of the current text.
    pub fn resolve<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
        el: ElementRef,
    ) -> Result<roxmltree::Node<'a, 'input>, Error> {
        let current = self.current(el)?;
        current.resolve(doc).ok_or_else(|| {
            Error::MissingElement(format!("element #{} not in document", current.index))
        })
    }

    /// Find the element whose `Id`, `ID` or `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Result<Option<ElementRef>, Error> {
        let doc = self.parse_doc()?;
        Ok(find_by_id(&doc, id).and_then(|n| self.element_ref(n)))
    }

    /// First element in document order with the given namespace and local name.
    pub fn find_element(&self, ns: &str, local_name: &str) -> Result<Option<ElementRef>, Error> {
        let doc = self.parse_doc()?;
        Ok(find_element(&doc, ns, local_name).and_then(|n| self.element_ref(n)))
    }

    /// All elements with the given namespace and local name, in document order.
    pub fn find_elements(&self, ns: &str, local_name: &str) -> Result<Vec<ElementRef>, Error> {
        let doc = self.parse_doc()?;
        Ok(doc
            .descendants()
            .filter(|n| is_named(n, ns, local_name))
            .filter_map(|n| self.element_ref(n))
            .collect())
    }

    /// Value of an unqualified attribute on `el`.
    pub fn attribute(&self, el: ElementRef, name: &str) -> Result<Option<String>, Error> {
        let doc = self.parse_doc()?;
        let node = self.resolve(&doc, el)?;
        Ok(node.attribute(name).map(str::to_owned))
    }

    /// The element's identifier (`Id`, then `ID`, then `id`), if any.
    pub fn id_of(&self, el: ElementRef) -> Result<Option<String>, Error> {
        let doc = self.parse_doc()?;
        let node = self.resolve(&doc, el)?;
        Ok(id_attribute(node).map(str::to_owned))
    }

    /// Concatenated text content of `el` and its descendants.
    pub fn text_content(&self, el: ElementRef) -> Result<String, Error> {
        let doc = self.parse_doc()?;
        let node = self.resolve(&doc, el)?;
        Ok(node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect())
    }

    /// The source text of `el`, from its start tag to its end tag.
    pub fn element_source(&self, el: ElementRef) -> Result<&str, Error> {
        let range = {
            let doc = self.parse_doc()?;
            self.resolve(&doc, el)?.range()
        };
        Ok(&self.text[range])
    }

    /// Add an attribute right after the element name.
    ///
    /// Fails if the element already carries an attribute with that name.
    pub fn insert_attribute(&mut self, el: ElementRef, name: &str, value: &str) -> Result<(), Error> {
        let span = {
            let doc = self.parse_doc()?;
            let node = self.resolve(&doc, el)?;
            if node.has_attribute(name) {
                return Err(Error::XmlStructure(format!(
                    "element <{}> already has a {name} attribute",
                    node.tag_name().name()
                )));
            }
            ElementSpan::of(&self.text, node)?
        };
        let insertion = format!(" {name}=\"{}\"", crate::writer::escape_attr(value));
        let text = splice(&self.text, span.qname_end..span.qname_end, &insertion);
        self.commit(text, None)
    }

    /// Append serialized XML as the last child of `el`.
    ///
    /// A self-closing element is expanded into a start/end tag pair.
    pub fn append_child_xml(&mut self, el: ElementRef, fragment: &str) -> Result<(), Error> {
        let (span, edit) = self.span(el, |node| Edit {
            first: element_count(node),
            removed: 0,
            before: 0,
        })?;
        let text = if span.self_closing {
            span.expand(&self.text, fragment)
        } else {
            splice(&self.text, span.end_tag_start..span.end_tag_start, fragment)
        };
        self.commit(text, Some(edit))
    }

    /// Set the text of an element that has no children.
    pub fn set_text(&mut self, el: ElementRef, value: &str) -> Result<(), Error> {
        {
            let doc = self.parse_doc()?;
            let node = self.resolve(&doc, el)?;
            if node.has_children() {
                return Err(Error::XmlStructure(format!(
                    "element <{}> is not empty",
                    node.tag_name().name()
                )));
            }
        }
        self.append_child_xml(el, &crate::writer::escape_text(value))
    }

    /// Replace all children of `el` with serialized XML.
    pub fn replace_content(&mut self, el: ElementRef, fragment: &str) -> Result<(), Error> {
        let (span, edit) = self.span(el, |node| Edit {
            first: 1,
            removed: element_count(node) - 1,
            before: 0,
        })?;
        let text = if span.self_closing {
            span.expand(&self.text, fragment)
        } else {
            splice(&self.text, span.start_tag_end..span.end_tag_start, fragment)
        };
        self.commit(text, Some(edit))
    }

    /// The source span of `el` and the edit about to be made to it.
    /// `edit` gives `first` relative to `el` and the number of removed elements.
    fn span(
        &self,
        el: ElementRef,
        edit: impl FnOnce(roxmltree::Node<'_, '_>) -> Edit,
    ) -> Result<(ElementSpan, Edit), Error> {
        let current = self.current(el)?;
        let doc = self.parse_doc()?;
        let node = self.resolve(&doc, current)?;
        let mut edit = edit(node);
        edit.first += current.index;
        edit.before = element_count(doc.root());
        Ok((ElementSpan::of(&self.text, node)?, edit))
    }

    /// Bring `el` up to the current generation.
    fn current(&self, el: ElementRef) -> Result<ElementRef, Error> {
        let pending = self.shifts.get(el.generation..).ok_or_else(|| {
            Error::MissingElement(format!("element #{} belongs to another document", el.index))
        })?;
        let mut index = el.index;
        for shift in pending {
            if index >= shift.first + shift.removed {
                index = index - shift.removed + shift.inserted;
            } else if index >= shift.first {
                return Err(Error::MissingElement(format!(
                    "element #{} was removed by an edit",
                    el.index
                )));
            }
        }
        Ok(ElementRef { index, generation: self.shifts.len() })
    }

    /// Replace the text, logging how `edit` moved element positions.
    fn commit(&mut self, text: String, edit: Option<Edit>) -> Result<(), Error> {
        let after = element_count(crate::parse(&text)?.root());
        self.text = text;
        if let Some(edit) = edit {
            let inserted = (after + edit.removed).saturating_sub(edit.before);
            if inserted > 0 || edit.removed > 0 {
                self.shifts.push(Shift { first: edit.first, removed: edit.removed, inserted });
            }
        }
        Ok(())
    }
}

/// A structural edit in progress: where new elements go, how many old
/// ones go away and how many elements the document had before.
struct Edit {
    first: usize,
    removed: usize,
    before: usize,
}

/// Number of elements in the subtree of `node`, `node` included.
fn element_count(node: roxmltree::Node<'_, '_>) -> usize {
    node.descendants().filter(|n| n.is_element()).count()
}

impl std::str::FromStr for XmlDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Byte offsets of an element's tags within the source text.
struct ElementSpan {
    qname: String,
    qname_end: usize,
    /// Offset of the `>` closing the start tag.
    gt: usize,
    start_tag_end: usize,
    end_tag_start: usize,
    self_closing: bool,
}

impl ElementSpan {
    fn of(text: &str, node: roxmltree::Node<'_, '_>) -> Result<Self, Error> {
        let range = node.range();
        let bytes = text.as_bytes();
        if bytes.get(range.start) != Some(&b'<') {
            return Err(Error::XmlStructure(format!(
                "element <{}> has no source position",
                node.tag_name().name()
            )));
        }

        let mut i = range.start + 1;
        while i < range.end && !matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n' | b'/' | b'>') {
            i += 1;
        }
        let qname_end = i;

        let mut quote: Option<u8> = None;
        while i < range.end {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => break,
                None => {}
            }
            i += 1;
        }
        if i >= range.end {
            return Err(Error::XmlStructure("unterminated start tag".into()));
        }

        let self_closing = bytes[i - 1] == b'/';
        let start_tag_end = i + 1;
        let end_tag_start = if self_closing {
            start_tag_end
        } else {
            text[..range.end]
                .rfind("</")
                .filter(|&p| p >= start_tag_end)
                .ok_or_else(|| Error::XmlStructure("missing end tag".into()))?
        };

        Ok(Self {
            qname: text[range.start + 1..qname_end].to_owned(),
            qname_end,
            gt: i,
            start_tag_end,
            end_tag_start,
            self_closing,
        })
    }

    /// Turn `<a .../>` into `<a ...>{content}</a>`.
    fn expand(&self, text: &str, content: &str) -> String {
        let replacement = format!(">{content}</{}>", self.qname);
        splice(text, self.gt - 1..self.start_tag_end, &replacement)
    }
}

fn splice(text: &str, range: std::ops::Range<usize>, with: &str) -> String {
    let mut out = String::with_capacity(text.len() + with.len());
    out.push_str(&text[..range.start]);
    out.push_str(with);
    out.push_str(&text[range.end..]);
    out
}

fn is_named(node: &roxmltree::Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// The element's qualified name as written in the source (`prefix:local`).
pub fn qualified_name(node: roxmltree::Node<'_, '_>) -> String {
    let text = node.document().input_text();
    let start = node.range().start;
    if text.as_bytes().get(start) == Some(&b'<') {
        let rest = &text[start + 1..];
        let len = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        return rest[..len].to_owned();
    }
    node.tag_name().name().to_owned()
}

/// The value of the first identifier attribute present on `node`.
pub fn id_attribute<'a>(node: roxmltree::Node<'a, '_>) -> Option<&'a str> {
    attr::ID_ATTRS.iter().find_map(|name| node.attribute(*name))
}

/// Find an element by identifier value.
pub fn find_by_id<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    id: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && attr::ID_ATTRS.iter().any(|a| n.attribute(*a) == Some(id)))
}

/// First descendant element with the given namespace and local name.
pub fn find_element<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    doc.descendants().find(|n| is_named(n, ns, local_name))
}

/// First child element with the given namespace and local name.
pub fn find_child_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| is_named(n, ns, local_name))
}

/// All child elements with the given namespace and local name.
pub fn find_child_elements<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> + 'a
where
    'input: 'a,
{
    let ns = ns.to_owned();
    let local_name = local_name.to_owned();
    node.children().filter(move |n| is_named(n, &ns, &local_name))
}
