//! Document payload submitted to the registration service.
//!
//! Field names on the wire are fixed by the remote API; the serde renames
//! below must not change.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A registration document.
///
/// Absent string fields are sent as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Free-form description
    pub description: String,
    /// Document identifier
    pub doc_id: String,
    /// Document status
    pub doc_status: String,
    /// Document type, e.g. `LP_INTRODUCE_GOODS`
    pub doc_type: String,
    /// Whether the goods are imported
    #[serde(rename = "importRequest")]
    pub import_request: bool,
    /// INN of the goods owner
    pub owner_inn: String,
    /// INN of the participant submitting the document
    pub participant_inn: String,
    /// INN of the producer
    pub producer_inn: String,
    /// Production date
    pub production_date: String,
    /// Production type
    pub production_type: String,
    /// Products covered by the document, in submission order
    pub products: Vec<Product>,
}

/// One product entry of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Kind of conformity certificate
    pub certificate_document: String,
    /// Certificate issue date
    pub certificate_document_date: String,
    /// Certificate number
    pub certificate_document_number: String,
    /// INN of the goods owner
    pub owner_inn: String,
    /// INN of the producer
    pub producer_inn: String,
    /// Production date
    pub production_date: String,
    /// TN VED commodity classification code
    pub tnved_code: String,
    /// Unit identification code
    pub uit_code: String,
    /// Transport package identification code
    pub uitu_code: String,
    /// Registration date
    pub reg_date: String,
    /// Registration number
    pub reg_number: String,
}

impl Document {
    /// Serialize to the JSON body expected by the remote API.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a document from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn keys(value: &Value) -> BTreeSet<&str> {
        value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn test_document_wire_keys() {
        let document = Document {
            doc_id: "doc-1".to_string(),
            import_request: true,
            products: vec![Product::default()],
            ..Default::default()
        };

        let value: Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();

        let expected: BTreeSet<&str> = [
            "description",
            "doc_id",
            "doc_status",
            "doc_type",
            "importRequest",
            "owner_inn",
            "participant_inn",
            "producer_inn",
            "production_date",
            "production_type",
            "products",
        ]
        .into_iter()
        .collect();
        assert_eq!(keys(&value), expected);
        assert_eq!(value["importRequest"], Value::Bool(true));
        assert_eq!(value["doc_id"], "doc-1");

        let product = &value["products"][0];
        let expected_product: BTreeSet<&str> = [
            "certificate_document",
            "certificate_document_date",
            "certificate_document_number",
            "owner_inn",
            "producer_inn",
            "production_date",
            "tnved_code",
            "uit_code",
            "uitu_code",
            "reg_date",
            "reg_number",
        ]
        .into_iter()
        .collect();
        assert_eq!(keys(product), expected_product);
        // Empty values are still present
        assert_eq!(product["uitu_code"], "");
    }

    #[test]
    fn test_products_keep_order() {
        let document = Document {
            products: vec![
                Product {
                    uit_code: "first".to_string(),
                    ..Default::default()
                },
                Product {
                    uit_code: "second".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let parsed = Document::from_json(&document.to_json().unwrap()).unwrap();
        assert_eq!(parsed.products[0].uit_code, "first");
        assert_eq!(parsed.products[1].uit_code, "second");
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let document = Document::from_json(
            r#"{"doc_id": "abc", "importRequest": true, "products": [{"tnved_code": "6401"}]}"#,
        )
        .unwrap();

        assert_eq!(document.doc_id, "abc");
        assert!(document.import_request);
        assert_eq!(document.description, "");
        assert_eq!(document.products.len(), 1);
        assert_eq!(document.products[0].tnved_code, "6401");
        assert_eq!(document.products[0].reg_number, "");
    }

    #[test]
    fn test_from_json_invalid() {
        let result = Document::from_json("{not json");
        assert!(matches!(result, Err(crate::error::CrptError::Encoding(_))));
    }
}
