//! Request input and rule checking
//!
//! Rules are checked all at once so a rejected caller sees every problem in
//! one response, not just the first.

use std::collections::HashMap;

use crate::signing::SigningType;
use crate::types::Violation;

/// Decoded request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BodyInput {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Body was present but could not be decoded
    Invalid(String),
}

/// Everything the gateway needs from an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    /// Query pairs in order of appearance, keys kept verbatim (`ccParams[]`)
    pub query: Vec<(String, String)>,
    pub body: BodyInput,
    /// Raw `Authorization` header
    pub authorization: Option<String>,
}

impl RequestInput {
    pub fn from_query(query: Vec<(String, String)>) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: BodyInput) -> Self {
        self.body = body;
        self
    }

    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Accumulates violations while extracting fields.
#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `signingType` must be exactly `VAULT` or `DEFAULT`.
    pub fn signing_type(&mut self, input: &RequestInput) -> Option<SigningType> {
        let values = input.query_values("signingType");
        let parsed = match values.as_slice() {
            [single] => single.parse::<SigningType>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.violations
                .push(Violation::query("signingType", SigningType::ALLOWED));
        }
        parsed
    }

    /// Required, non-empty, single-valued query string.
    pub fn query_string(&mut self, input: &RequestInput, name: &'static str) -> Option<String> {
        match input.query_values(name).as_slice() {
            [value] if !value.is_empty() => Some((*value).to_string()),
            [] | [_] => {
                self.violations
                    .push(Violation::query(name, "must be a non-empty string"));
                None
            }
            _ => {
                self.violations.push(Violation::query(name, "must be a string"));
                None
            }
        }
    }

    /// Optional query array. Accepts `name[]`, `name[<n>]` and a repeated
    /// bare `name`; a single bare `name=value` is not an array.
    pub fn query_array(&mut self, input: &RequestInput, name: &'static str) -> Vec<String> {
        let bracketed = format!("{}[", name);
        let mut bare = Vec::new();
        let mut indexed: Vec<(Option<usize>, String)> = Vec::new();

        for (key, value) in &input.query {
            if key == name {
                bare.push(value.clone());
            } else if let Some(rest) = key.strip_prefix(&bracketed) {
                match rest.strip_suffix(']') {
                    Some("") => indexed.push((None, value.clone())),
                    Some(idx) => match idx.parse::<usize>() {
                        Ok(i) => indexed.push((Some(i), value.clone())),
                        Err(_) => {
                            self.violations.push(Violation::query(name, "must be an array"));
                            return Vec::new();
                        }
                    },
                    None => {
                        self.violations.push(Violation::query(name, "must be an array"));
                        return Vec::new();
                    }
                }
            }
        }

        if !bare.is_empty() && !indexed.is_empty() {
            self.violations.push(Violation::query(name, "must be an array"));
            return Vec::new();
        }

        if bare.len() == 1 {
            self.violations.push(Violation::query(name, "must be an array"));
            return Vec::new();
        }

        if !bare.is_empty() {
            return bare;
        }

        if indexed.iter().all(|(i, _)| i.is_some()) {
            indexed.sort_by_key(|(i, _)| *i);
        }
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    /// Required, non-empty string field of a JSON/form body.
    pub fn body_string(&mut self, input: &RequestInput, name: &'static str) -> Option<String> {
        let value = match &input.body {
            BodyInput::Json(serde_json::Value::Object(map)) => map.get(name),
            BodyInput::Invalid(reason) => {
                self.violations.push(Violation::body(
                    name,
                    format!("must be a non-empty string (body could not be decoded: {reason})"),
                ));
                return None;
            }
            _ => None,
        };

        match value {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::String(_)) | None => {
                self.violations
                    .push(Violation::body(name, "must be a non-empty string"));
                None
            }
            Some(_) => {
                self.violations.push(Violation::body(name, "must be a string"));
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Err` with every collected violation, or `Ok` if none.
    pub fn finish(self) -> Result<(), Vec<Violation>> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

/// Turn decoded form pairs into a JSON object of strings (last value wins).
pub fn form_to_json(pairs: Vec<(String, String)>) -> serde_json::Value {
    let map: HashMap<String, String> = pairs.into_iter().collect();
    serde_json::Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> RequestInput {
        RequestInput::from_query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_signing_type() {
        let mut v = Validator::new();
        assert_eq!(
            v.signing_type(&input(&[("signingType", "VAULT")])),
            Some(SigningType::Vault)
        );
        assert!(v.is_empty());

        for bad in [
            input(&[]),
            input(&[("signingType", "X509")]),
            input(&[("signingType", "DEFAULT"), ("signingType", "VAULT")]),
        ] {
            let mut v = Validator::new();
            assert_eq!(v.signing_type(&bad), None);
            let violations = v.finish().unwrap_err();
            assert_eq!(violations[0].param, "signingType");
            assert_eq!(violations[0].msg, "only VAULT and DEFAULT identity supported");
        }
    }

    #[test]
    fn test_query_string_rules() {
        let mut v = Validator::new();
        assert_eq!(
            v.query_string(&input(&[("username", "alice")]), "username"),
            Some("alice".to_string())
        );
        assert_eq!(v.query_string(&input(&[("username", "")]), "username"), None);
        assert_eq!(v.query_string(&input(&[]), "username"), None);
        assert_eq!(
            v.query_string(&input(&[("username", "a"), ("username", "b")]), "username"),
            None
        );

        let violations = v.finish().unwrap_err();
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[2].msg, "must be a string");
    }

    #[test]
    fn test_query_array_forms() {
        let mut v = Validator::new();
        assert_eq!(
            v.query_array(
                &input(&[("ccParams[]", "asset1"), ("ccParams[]", "blue")]),
                "ccParams"
            ),
            vec!["asset1", "blue"]
        );
        assert_eq!(
            v.query_array(
                &input(&[("ccParams[1]", "blue"), ("ccParams[0]", "asset1")]),
                "ccParams"
            ),
            vec!["asset1", "blue"]
        );
        assert_eq!(
            v.query_array(
                &input(&[("ccParams", "asset1"), ("ccParams", "blue")]),
                "ccParams"
            ),
            vec!["asset1", "blue"]
        );
        assert!(v.query_array(&input(&[]), "ccParams").is_empty());
        assert!(v.is_empty());
    }

    #[test]
    fn test_single_bare_value_is_not_an_array() {
        let mut v = Validator::new();
        assert!(v
            .query_array(&input(&[("ccParams", "asset1")]), "ccParams")
            .is_empty());
        let violations = v.finish().unwrap_err();
        assert_eq!(violations[0].param, "ccParams");
        assert_eq!(violations[0].msg, "must be an array");
    }

    #[test]
    fn test_body_string() {
        let mut v = Validator::new();
        let ok = RequestInput::default()
            .with_body(BodyInput::Json(serde_json::json!({ "secret": "s3cr3t" })));
        assert_eq!(v.body_string(&ok, "secret"), Some("s3cr3t".into()));

        let numeric =
            RequestInput::default().with_body(BodyInput::Json(serde_json::json!({ "secret": 42 })));
        assert_eq!(v.body_string(&numeric, "secret"), None);

        let empty = RequestInput::default();
        assert_eq!(v.body_string(&empty, "secret"), None);

        let garbled = RequestInput::default().with_body(BodyInput::Invalid("eof".into()));
        assert_eq!(v.body_string(&garbled, "secret"), None);

        let violations = v.finish().unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().all(|x| x.location == "body"));
        assert_eq!(violations[0].msg, "must be a string");
    }

    #[test]
    fn test_form_to_json() {
        let json = form_to_json(vec![("secret".into(), "s3cr3t".into())]);
        assert_eq!(json["secret"], "s3cr3t");
    }
}
