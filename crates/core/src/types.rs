use serde::{Deserialize, Serialize};
use url::Url;

/// A `(value, unit)` pair as produced by `parse_value_unit` and friends.
/// Either side may be empty; never `None` — the canonical schema always
/// emits every column, missing values as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: String,
    pub unit: String,
}

impl Measurement {
    pub fn new(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// One node of the category tree built by the walker. Immutable once the
/// traversal completes; children only ever hold their own name/url, never a
/// back-reference to the parent, so the tree can't become cyclic by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub name: String,
    pub url: Url,
    pub depth: u32,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn new(name: impl Into<String>, url: Url, depth: u32) -> Self {
        Self {
            name: name.into(),
            url,
            depth,
            children: Vec::new(),
        }
    }

    /// Depth-first iterator over this node and all of its descendants.
    pub fn iter(&self) -> CategoryNodeIter<'_> {
        CategoryNodeIter { stack: vec![self] }
    }
}

pub struct CategoryNodeIter<'a> {
    stack: Vec<&'a CategoryNode>,
}

impl<'a> Iterator for CategoryNodeIter<'a> {
    type Item = &'a CategoryNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// A discovered product page, with the category breadcrumb (parent→leaf) it
/// was reached through preserved for `Category (parent)`/`Category (sub)`
/// stamping during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUrl {
    pub url: Url,
    pub category_path: Vec<String>,
}

/// The 33 canonical columns, in emission order, exactly as specified in the
/// external interface. Kept as plain data so export and QC never hard-code
/// the order twice.
pub const CANONICAL_COLUMNS: &[&str] = &[
    "Name",
    "SKU",
    "Color",
    "Material",
    "Series",
    "PriceExclVAT.value",
    "PriceExclVAT.unit",
    "PriceInclVAT.value",
    "PriceInclVAT.unit",
    "Length.value",
    "Length.unit",
    "Width.value",
    "Width.unit",
    "Height.value",
    "Height.unit",
    "Depth.value",
    "Depth.unit",
    "Diameter.value",
    "Diameter.unit",
    "Capacity.value",
    "Capacity.unit",
    "Volume.value",
    "Volume.unit",
    "Weight.value",
    "Weight.unit",
    "Data (text)",
    "Category (parent)",
    "Category (sub)",
    "ImageURL",
    "ProductURL",
    "Description",
    "ExtraData",
];

/// A flat product record with the canonical key set. Every field is always
/// present; a missing value is the empty string, never absent, so exporters
/// never need to special-case a hole in the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub sku: String,
    pub color: String,
    pub material: String,
    pub series: String,
    pub price_excl_vat: Measurement,
    pub price_incl_vat: Measurement,
    pub length: Measurement,
    pub width: Measurement,
    pub height: Measurement,
    pub depth: Measurement,
    pub diameter: Measurement,
    pub capacity: Measurement,
    pub volume: Measurement,
    pub weight: Measurement,
    pub data_text: String,
    pub category_parent: String,
    pub category_sub: String,
    pub image_url: String,
    pub product_url: String,
    pub description: String,
    pub extra_data: String,
}

impl ProductRecord {
    /// Render the record as `(column, value)` pairs in canonical order, for
    /// exporters and for any validator that needs field access by name.
    pub fn columns(&self) -> [(&'static str, &str); 32] {
        [
            ("Name", &self.name),
            ("SKU", &self.sku),
            ("Color", &self.color),
            ("Material", &self.material),
            ("Series", &self.series),
            ("PriceExclVAT.value", &self.price_excl_vat.value),
            ("PriceExclVAT.unit", &self.price_excl_vat.unit),
            ("PriceInclVAT.value", &self.price_incl_vat.value),
            ("PriceInclVAT.unit", &self.price_incl_vat.unit),
            ("Length.value", &self.length.value),
            ("Length.unit", &self.length.unit),
            ("Width.value", &self.width.value),
            ("Width.unit", &self.width.unit),
            ("Height.value", &self.height.value),
            ("Height.unit", &self.height.unit),
            ("Depth.value", &self.depth.value),
            ("Depth.unit", &self.depth.unit),
            ("Diameter.value", &self.diameter.value),
            ("Diameter.unit", &self.diameter.unit),
            ("Capacity.value", &self.capacity.value),
            ("Capacity.unit", &self.capacity.unit),
            ("Volume.value", &self.volume.value),
            ("Volume.unit", &self.volume.unit),
            ("Weight.value", &self.weight.value),
            ("Weight.unit", &self.weight.unit),
            ("Data (text)", &self.data_text),
            ("Category (parent)", &self.category_parent),
            ("Category (sub)", &self.category_sub),
            ("ImageURL", &self.image_url),
            ("ProductURL", &self.product_url),
            ("Description", &self.description),
            ("ExtraData", &self.extra_data),
        ]
    }
}

/// A persisted cache entry: `{hash, data}` keyed externally by SKU or URL,
/// generic over the payload so the same on-disk shape backs both the raw-HTML
/// cache (payload = `String`) and the parsed-record cache (payload =
/// `ProductRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub hash: String,
    pub data: T,
}

/// QC error taxonomy, bucketed for the errors report rather than raised as
/// an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingField,
    InvalidPrice,
    InvalidSku,
    InvalidImage,
    InvalidUrl,
    ShortName,
    MissingCategory,
    PriceOutlier,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::MissingField => "MissingField",
            ErrorKind::InvalidPrice => "InvalidPrice",
            ErrorKind::InvalidSku => "InvalidSKU",
            ErrorKind::InvalidImage => "InvalidImage",
            ErrorKind::InvalidUrl => "InvalidURL",
            ErrorKind::ShortName => "ShortName",
            ErrorKind::MissingCategory => "MissingCategory",
            ErrorKind::PriceOutlier => "PriceOutlier",
        };
        f.write_str(s)
    }
}

/// One QC violation, keyed by the record's SKU (or URL, when SKU is blank).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error_kind: ErrorKind,
    pub subject_key: String,
    pub detail: String,
}
