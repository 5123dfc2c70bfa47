//! Proposal codec.
//!
//! Two levels of validation exist:
//!
//! - [`validate_json`] only checks that the bytes are a non-empty, well-formed
//!   JSON document. Ingestion uses it and stores the original bytes verbatim.
//! - [`parse`] additionally maps the top-level object onto [`Proposal`].
//!   Field names match case-insensitively, unknown fields are dropped and
//!   missing fields stay `None`. Nothing is required.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire names of every field [`Proposal`] knows about, in serialization order.
const FIELDS: [&str; 7] = [
    "nome",
    "cpf",
    "rendaMensal",
    "idade",
    "telefone",
    "email",
    "dadosAdicionais",
];

/// A credit application as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "cpf", default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,

    #[serde(
        rename = "rendaMensal",
        default,
        with = "crate::amount::exact_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_income: Option<Decimal>,

    #[serde(rename = "idade", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,

    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Opaque structured value carried through untouched.
    #[serde(
        rename = "dadosAdicionais",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_data: Option<Value>,
}

/// Why a payload could not be accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty body")]
    EmptyBody,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Well-formed JSON that does not fit the proposal shape.
    #[error("unexpected proposal shape: {0}")]
    Shape(String),
}

impl ParseError {
    /// Errors caused by the submitted bytes themselves.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ParseError::EmptyBody | ParseError::InvalidJson(_))
    }
}

/// Check that `bytes` is a non-blank, syntactically valid JSON document.
///
/// Any JSON value is accepted, including arrays and scalars.
pub fn validate_json(bytes: &[u8]) -> Result<(), ParseError> {
    if is_blank(bytes) {
        return Err(ParseError::EmptyBody);
    }
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes)
        .map(|_| ())
        .map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// Decode a stored proposal.
pub fn parse(bytes: &[u8]) -> Result<Proposal, ParseError> {
    validate_json(bytes)?;
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ParseError::Shape(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            )))
        }
    };

    serde_json::from_value(Value::Object(canonicalize_fields(object)))
        .map_err(|e| ParseError::Shape(e.to_string()))
}

/// Compact UTF-8 JSON with stable field order.
pub fn serialize<T: Serialize>(record: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(record)
}

/// Indented UTF-8 JSON with stable field order.
pub fn serialize_pretty<T: Serialize>(record: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(record)
}

fn is_blank(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim().is_empty(),
        Err(_) => false,
    }
}

/// Rename known fields to their canonical spelling and drop everything else.
///
/// When the same field appears with different casings the last one wins.
fn canonicalize_fields(object: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in object {
        if let Some(canonical) = FIELDS.iter().find(|f| f.eq_ignore_ascii_case(&key)) {
            out.insert((*canonical).to_string(), value);
        }
    }
    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn blank_bodies_are_empty() {
        assert_eq!(validate_json(b""), Err(ParseError::EmptyBody));
        assert_eq!(validate_json(b"  \n\t "), Err(ParseError::EmptyBody));
        assert_eq!(parse(b"\r\n"), Err(ParseError::EmptyBody));
    }

    #[test]
    fn malformed_json_is_rejected() {
        for body in [&b"{"[..], b"{\"nome\":}", b"nope", b"{} trailing", b"\xff\xfe"] {
            let err = validate_json(body).unwrap_err();
            assert!(matches!(err, ParseError::InvalidJson(_)), "{body:?} -> {err:?}");
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn any_json_document_validates() {
        for body in [&b"{}"[..], b"[]", b"42", b"\"text\"", b"null", b"{\"x\":[1,2]}"] {
            assert_eq!(validate_json(body), Ok(()), "{:?}", String::from_utf8_lossy(body));
        }
    }

    #[test]
    fn parse_reads_all_fields() {
        let body = json!({
            "nome": "Maria",
            "cpf": "123.456.789-00",
            "rendaMensal": 3500.50,
            "idade": 34,
            "telefone": "+55 11 99999-0000",
            "email": "maria@example.com",
            "dadosAdicionais": {"origem": "app"}
        });
        let proposal = parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(proposal.name.as_deref(), Some("Maria"));
        assert_eq!(proposal.national_id.as_deref(), Some("123.456.789-00"));
        assert_eq!(proposal.monthly_income, Some(dec("3500.5")));
        assert_eq!(proposal.age, Some(34));
        assert_eq!(proposal.phone.as_deref(), Some("+55 11 99999-0000"));
        assert_eq!(proposal.email.as_deref(), Some("maria@example.com"));
        assert_eq!(proposal.additional_data, Some(json!({"origem": "app"})));
    }

    #[test]
    fn field_names_match_case_insensitively() {
        let body = br#"{"NOME":"Ana","RendaMensal":2500,"IDADE":40}"#;
        let proposal = parse(body).unwrap();
        assert_eq!(proposal.name.as_deref(), Some("Ana"));
        assert_eq!(proposal.monthly_income, Some(dec("2500")));
        assert_eq!(proposal.age, Some(40));
    }

    #[test]
    fn missing_and_unknown_fields_are_tolerated() {
        let proposal = parse(br#"{"unexpected":true,"idade":null}"#).unwrap();
        assert_eq!(proposal, Proposal::default());
    }

    #[test]
    fn non_object_documents_are_shape_errors() {
        let err = parse(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, ParseError::Shape(ref m) if m.contains("array")), "{err:?}");
        assert!(!err.is_client_error());
        assert!(matches!(parse(b"null"), Err(ParseError::Shape(_))));
    }

    #[test]
    fn wrong_field_types_are_shape_errors() {
        assert!(matches!(parse(br#"{"idade":"trinta"}"#), Err(ParseError::Shape(_))));
        assert!(matches!(parse(br#"{"nome":12}"#), Err(ParseError::Shape(_))));
        assert!(matches!(
            parse(br#"{"idade":30,"rendaMensal":"3000"}"#),
            Err(ParseError::Shape(_))
        ));
        assert!(matches!(parse(br#"{"rendaMensal":true}"#), Err(ParseError::Shape(_))));
    }

    #[test]
    fn income_keeps_every_digit() {
        let proposal = parse(br#"{"idade":30,"rendaMensal":2000.0000000000001}"#).unwrap();
        assert_eq!(proposal.monthly_income, Some(dec("2000.0000000000001")));
        assert!(proposal.monthly_income.unwrap() > dec("2000"));

        let proposal = parse(br#"{"rendaMensal":1234.123456789012345}"#).unwrap();
        assert_eq!(
            proposal.monthly_income.map(|d| d.to_string()).as_deref(),
            Some("1234.123456789012345")
        );
        let text = String::from_utf8(serialize(&proposal).unwrap()).unwrap();
        assert_eq!(text, r#"{"rendaMensal":1234.123456789012345}"#);
    }

    #[test]
    fn income_outside_decimal_range_is_a_shape_error() {
        assert!(matches!(parse(br#"{"rendaMensal":1e40}"#), Err(ParseError::Shape(_))));
    }

    #[test]
    fn serialize_uses_declaration_order_and_omits_missing() {
        let proposal = Proposal {
            name: Some("Ana".to_string()),
            age: Some(30),
            monthly_income: Some(dec("3000")),
            ..Proposal::default()
        };
        let text = String::from_utf8(serialize(&proposal).unwrap()).unwrap();
        assert_eq!(text, r#"{"nome":"Ana","rendaMensal":3000,"idade":30}"#);
    }
}
