//! Input firewall: redacts destructive shell fragments before text reaches
//! the router, memory or a backend prompt.

pub const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "format C:",
    "shutdown",
    "del /f /q",
    "mkfs",
    "poweroff",
];

pub const REDACTION: &str = "[BLOCKED]";

#[derive(Debug, Clone)]
pub struct InputFirewall {
    patterns: Vec<String>,
}

impl InputFirewall {
    pub fn new() -> Self {
        Self::with_patterns(DANGEROUS_PATTERNS.iter().copied())
    }

    pub fn with_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(str::to_ascii_lowercase)
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Replace every case-insensitive match of a dangerous pattern with `[BLOCKED]`.
    pub fn sanitize(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for pattern in &self.patterns {
            // ASCII lowering keeps byte offsets aligned with `cleaned`.
            let lowered = cleaned.to_ascii_lowercase();
            if !lowered.contains(pattern.as_str()) {
                continue;
            }
            log::warn!("Blocked dangerous pattern: {pattern:?}");
            let mut out = String::with_capacity(cleaned.len());
            let mut last = 0;
            for (start, _) in lowered.match_indices(pattern.as_str()) {
                out.push_str(&cleaned[last..start]);
                out.push_str(REDACTION);
                last = start + pattern.len();
            }
            out.push_str(&cleaned[last..]);
            cleaned = out;
        }
        cleaned
    }
}

impl Default for InputFirewall {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_untouched() {
        let fw = InputFirewall::new();
        assert_eq!(fw.sanitize("what's the next boss?"), "what's the next boss?");
    }

    #[test]
    fn redacts_all_occurrences() {
        let fw = InputFirewall::new();
        assert_eq!(
            fw.sanitize("run this: rm -rf / && shutdown now; rm -rf ~"),
            "run this: [BLOCKED] / && [BLOCKED] now; [BLOCKED] ~"
        );
    }

    #[test]
    fn matching_ignores_case() {
        let fw = InputFirewall::new();
        assert_eq!(fw.sanitize("FORMAT c: please"), "[BLOCKED] please");
        assert_eq!(fw.sanitize("ShutDown"), "[BLOCKED]");
    }

    #[test]
    fn non_ascii_text_survives() {
        let fw = InputFirewall::new();
        assert_eq!(fw.sanitize("héllo mkfs wörld"), "héllo [BLOCKED] wörld");
    }

    #[test]
    fn custom_patterns() {
        let fw = InputFirewall::with_patterns(["drop table", ""]);
        assert_eq!(fw.sanitize("DROP TABLE users; rm -rf"), "[BLOCKED] users; rm -rf");
    }
}
