//! Documents and fields.
//!
//! A document is a flat list of named fields. How a field is treated by the
//! index (one exact term, tokenized text, numeric range key, stored or not)
//! is decided by its [`FieldKind`], mirroring the usual inverted-index field
//! flavours.

use serde::{Deserialize, Serialize};

use crate::tokenizer::Tokenizer;

/// How the index treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Indexed as one exact term and stored.
    Keyword,
    /// Stored only, never indexed.
    Binary,
    /// Tokenized, indexed and stored.
    Text,
    /// Tokenized and indexed, but the value is not kept.
    UnStored,
    /// Indexed for range queries and stored.
    Numeric,
}

impl FieldKind {
    pub fn is_stored(self) -> bool {
        !matches!(self, Self::UnStored)
    }
}

/// Field payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
    Integer(i64),
}

/// A named, typed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
}

impl Field {
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Keyword,
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn binary(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Binary,
            value: FieldValue::Bytes(value.into()),
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn unstored(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::UnStored,
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn numeric(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
            value: FieldValue::Integer(value),
        }
    }

    /// Index terms produced by this field.
    fn terms(&self, tokenizer: &dyn Tokenizer) -> Vec<IndexTerm> {
        match (self.kind, &self.value) {
            (FieldKind::Binary, _) => Vec::new(),
            (FieldKind::Keyword, FieldValue::Text(value)) => vec![IndexTerm::Term {
                field: self.name.clone(),
                term: value.clone(),
            }],
            (FieldKind::Text | FieldKind::UnStored, FieldValue::Text(value)) => tokenizer
                .tokenize(value)
                .into_iter()
                .map(|term| IndexTerm::Term {
                    field: self.name.clone(),
                    term,
                })
                .collect(),
            (FieldKind::Numeric, FieldValue::Integer(value)) => vec![IndexTerm::Numeric {
                field: self.name.clone(),
                value: *value,
            }],
            (FieldKind::Numeric, FieldValue::Text(value)) => value
                .trim()
                .parse()
                .map(|value| {
                    vec![IndexTerm::Numeric {
                        field: self.name.clone(),
                        value,
                    }]
                })
                .unwrap_or_default(),
            (FieldKind::Keyword, FieldValue::Integer(value)) => vec![IndexTerm::Term {
                field: self.name.clone(),
                term: value.to_string(),
            }],
            // Raw bytes are not searchable.
            (_, FieldValue::Bytes(_)) => Vec::new(),
            (FieldKind::Text | FieldKind::UnStored, FieldValue::Integer(value)) => {
                vec![IndexTerm::Term {
                    field: self.name.clone(),
                    term: value.to_string(),
                }]
            }
        }
    }
}

/// A document: an ordered list of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Byte value of a field. Text fields are returned as their UTF-8 bytes.
    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Bytes(value)) => Some(value),
            Some(FieldValue::Text(value)) => Some(value.as_bytes()),
            _ => None,
        }
    }

    /// Integer value of a field. Numeric text is parsed.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Integer(value)) => Some(*value),
            Some(FieldValue::Text(value)) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Split into the stored part and the index terms it produces.
    pub(crate) fn analyze(self, tokenizer: &dyn Tokenizer) -> StoredDocument {
        let mut terms = Vec::new();
        let mut stored = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            terms.extend(field.terms(tokenizer));
            if field.kind.is_stored() {
                stored.push(field);
            }
        }
        terms.sort();
        terms.dedup();
        StoredDocument {
            document: Document { fields: stored },
            terms,
        }
    }
}

/// One entry a document contributes to the inverted index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) enum IndexTerm {
    Term { field: String, term: String },
    Numeric { field: String, value: i64 },
}

/// What an index persists per document: the retrievable fields plus the
/// terms it was indexed under, so deletion can remove exactly those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredDocument {
    pub document: Document,
    pub terms: Vec<IndexTerm>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::SingleSpaceTokenizer;

    #[test]
    fn test_unstored_field_is_indexed_but_dropped() {
        let doc = Document::new()
            .with_field(Field::keyword("identifier", "page_1"))
            .with_field(Field::unstored("lifetime", "1700000000"));

        let stored = doc.analyze(&SingleSpaceTokenizer);

        assert!(stored.document.field("lifetime").is_none());
        assert!(stored.terms.contains(&IndexTerm::Term {
            field: "lifetime".to_string(),
            term: "1700000000".to_string()
        }));
    }

    #[test]
    fn test_text_field_is_tokenized() {
        let doc = Document::new().with_field(Field::text("tags", "pageId_1  news "));
        let stored = doc.analyze(&SingleSpaceTokenizer);
        assert_eq!(stored.terms.len(), 2);
        assert_eq!(stored.document.text("tags"), Some("pageId_1  news "));
    }

    #[test]
    fn test_binary_field_not_indexed() {
        let doc = Document::new().with_field(Field::binary("content", b"payload".to_vec()));
        let stored = doc.analyze(&SingleSpaceTokenizer);
        assert!(stored.terms.is_empty());
        assert_eq!(stored.document.bytes("content"), Some(&b"payload"[..]));
    }

    #[test]
    fn test_numeric_accessors() {
        let doc = Document::new()
            .with_field(Field::numeric("lifetime", 42))
            .with_field(Field::keyword("legacy", " 17 "));
        assert_eq!(doc.integer("lifetime"), Some(42));
        assert_eq!(doc.integer("legacy"), Some(17));
        assert_eq!(doc.integer("missing"), None);
    }
}
