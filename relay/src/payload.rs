use indexmap::IndexMap;
use url::form_urlencoded;

/// Field name to value, in the order the fields were first seen.
pub type FormFields = IndexMap<String, String>;

/// Field values supplied by the caller. Keys are passed upstream verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionPayload(FormFields);

impl SubmissionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub fn from_form_encoded(body: &[u8]) -> Self {
        form_urlencoded::parse(body).into_owned().collect()
    }

    /// Adds query string parameters for keys the payload does not already carry.
    pub fn merge_query(&mut self, query: &str) {
        for (key, value) in form_urlencoded::parse(query.as_bytes()).into_owned() {
            self.insert_if_absent(key, value);
        }
    }

    /// Inserts a field unless the key is already present.
    pub fn insert_if_absent(&mut self, key: String, value: String) {
        self.0.entry(key).or_insert(value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_fields(self) -> FormFields {
        self.0
    }
}

/// Repeated keys keep their first value.
impl FromIterator<(String, String)> for SubmissionPayload {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut payload = SubmissionPayload::new();
        for (key, value) in iter {
            payload.insert_if_absent(key, value);
        }
        payload
    }
}

/// Encodes fields the same way a browser submits an HTML form.
pub fn encode_form(fields: &FormFields) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter())
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_form_encoded() {
        let payload =
            SubmissionPayload::from_form_encoded(b"entry.1=Jane+Doe&entry.2=a%26b&entry.1=dup");

        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get("entry.1"), Some("Jane Doe"));
        assert_eq!(payload.get("entry.2"), Some("a&b"));

        let keys: Vec<_> = payload.into_fields().into_keys().collect();
        assert_eq!(keys, vec!["entry.1", "entry.2"]);
    }

    #[test]
    fn test_empty_body() {
        let payload = SubmissionPayload::from_form_encoded(b"");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_merge_query_keeps_body_values() {
        let mut payload = SubmissionPayload::from_form_encoded(b"entry.1=body");
        payload.merge_query("entry.1=query&entry.3=extra");

        assert_eq!(payload.get("entry.1"), Some("body"));
        assert_eq!(payload.get("entry.3"), Some("extra"));
    }

    #[test]
    fn test_encode_form() {
        let fields = FormFields::from([
            ("entry.1".to_string(), "Jane Doe".to_string()),
            ("draftResponse".to_string(), "[]".to_string()),
        ]);

        assert_eq!(encode_form(&fields), "entry.1=Jane+Doe&draftResponse=%5B%5D");
    }
}
