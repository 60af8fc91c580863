use mongodb::bson::{Bson, DateTime, Document, oid::ObjectId};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

/// A movie document exactly as stored.
///
/// Callers may store any fields they like; the accessors cover the ones the
/// repositories care about. Serializes as plain JSON (see [`PlainDocument`]).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Movie {
    document: Document,
}

/// A comment document exactly as stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Comment {
    document: Document,
}

impl Movie {
    pub fn id(&self) -> Option<ObjectId> {
        self.document.get_object_id("_id").ok()
    }

    pub fn title(&self) -> Option<&str> {
        self.document.get_str("title").ok()
    }

    pub fn plot(&self) -> Option<&str> {
        self.document.get_str("plot").ok()
    }

    /// Runtime in minutes, whatever numeric type it was stored as.
    pub fn runtime(&self) -> Option<f64> {
        match self.document.get("runtime")? {
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            Bson::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl Comment {
    /// Builds the document to insert: caller fields, with `movie_id` and
    /// `date` always set by us.
    pub fn compose(fields: Document, movie_id: ObjectId, date: DateTime) -> Document {
        let mut document = fields;
        document.remove("_id");
        document.insert("movie_id", movie_id);
        document.insert("date", date);
        document
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.document.get_object_id("_id").ok()
    }

    pub fn text(&self) -> Option<&str> {
        self.document.get_str("text").ok()
    }

    pub fn movie_id(&self) -> Option<ObjectId> {
        self.document.get_object_id("movie_id").ok()
    }

    pub fn date(&self) -> Option<DateTime> {
        self.document.get_datetime("date").ok().copied()
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get_str("name").ok()
    }

    pub fn email(&self) -> Option<&str> {
        self.document.get_str("email").ok()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl From<Document> for Movie {
    fn from(document: Document) -> Self {
        Self { document }
    }
}

impl From<Document> for Comment {
    fn from(document: Document) -> Self {
        Self { document }
    }
}

impl Serialize for Movie {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PlainDocument(&self.document).serialize(serializer)
    }
}

impl Serialize for Comment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PlainDocument(&self.document).serialize(serializer)
    }
}

/// A document as callers see it: object ids as hex strings and dates as
/// RFC 3339 strings, at any depth. Every other value keeps its BSON encoding.
pub struct PlainDocument<'a>(pub &'a Document);

struct PlainValue<'a>(&'a Bson);

impl Serialize for PlainDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, &PlainValue(value))?;
        }
        map.end()
    }
}

impl Serialize for PlainValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Bson::ObjectId(id) => serializer.serialize_str(&id.to_hex()),
            Bson::DateTime(date) => match date.try_to_rfc3339_string() {
                Ok(text) => serializer.serialize_str(&text),
                // Outside the RFC 3339 year range.
                Err(_) => self.0.serialize(serializer),
            },
            Bson::Document(document) => PlainDocument(document).serialize(serializer),
            Bson::Array(values) => serializer.collect_seq(values.iter().map(PlainValue)),
            other => other.serialize(serializer),
        }
    }
}
