#![forbid(unsafe_code)]

//! Same-document URI references as used by `Reference/@URI`.

use sigill_core::Error;

/// What a same-document `URI` attribute points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SameDocumentRef {
    /// `URI=""` or `#xpointer(/)`: the whole document.
    Document,
    /// `#id` or `#xpointer(id('id'))`: the element carrying that identifier.
    Id(String),
}

impl SameDocumentRef {
    /// Parse a reference URI. External references are rejected.
    pub fn parse(uri: &str) -> Result<Self, Error> {
        if uri.is_empty() {
            return Ok(Self::Document);
        }
        let fragment = uri
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidUri(format!("not a same-document reference: {uri}")))?;
        if fragment == "xpointer(/)" {
            return Ok(Self::Document);
        }
        if let Some(id) = parse_xpointer_id(fragment) {
            return Ok(Self::Id(id.to_owned()));
        }
        if fragment.is_empty() || fragment.starts_with("xpointer(") {
            return Err(Error::InvalidUri(format!("unsupported reference: {uri}")));
        }
        Ok(Self::Id(fragment.to_owned()))
    }

    /// The `URI` attribute value for this reference.
    pub fn to_uri(&self) -> String {
        match self {
            Self::Document => String::new(),
            Self::Id(id) => format!("#{id}"),
        }
    }
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix("xpointer(id(")?.strip_suffix("))")?;
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_forms() {
        assert_eq!(SameDocumentRef::parse("").unwrap(), SameDocumentRef::Document);
        assert_eq!(SameDocumentRef::parse("#xpointer(/)").unwrap(), SameDocumentRef::Document);
        assert_eq!(
            SameDocumentRef::parse("#NFe531502").unwrap(),
            SameDocumentRef::Id("NFe531502".into())
        );
        assert_eq!(
            SameDocumentRef::parse("#xpointer(id('x1'))").unwrap(),
            SameDocumentRef::Id("x1".into())
        );
    }

    #[test]
    fn rejects_external_references() {
        assert!(matches!(
            SameDocumentRef::parse("http://example.com/doc.xml"),
            Err(Error::InvalidUri(_))
        ));
        assert!(SameDocumentRef::parse("#").is_err());
        assert!(SameDocumentRef::parse("#xpointer(//a)").is_err());
    }

    #[test]
    fn round_trips_uri() {
        assert_eq!(SameDocumentRef::Id("a".into()).to_uri(), "#a");
        assert_eq!(SameDocumentRef::Document.to_uri(), "");
    }
}
