use regex::Regex;

/// Pulls a named token out of a semi-structured document.
pub trait TokenExtractor: Send + Sync {
    fn extract(&self, document: &str) -> Option<String>;
}

/// Finds `name="<field>" value="<token>"` anywhere in a page, ignoring case.
pub struct RegexTokenExtractor {
    pattern: Regex,
}

impl RegexTokenExtractor {
    pub fn new(field: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r#"(?i)name\s*=\s*"{}"\s+value\s*=\s*"([^"]+)""#,
            regex::escape(field)
        ))?;

        Ok(Self { pattern })
    }
}

impl TokenExtractor for RegexTokenExtractor {
    fn extract(&self, document: &str) -> Option<String> {
        self.pattern
            .captures(document)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
