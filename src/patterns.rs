//! Compiled extraction grammars.
//!
//! The norm-code grammars are lexical approximations of the naming
//! convention used by the standards body, not formal grammars. Unusual
//! spacing or long runs without whitespace (common in document XML) can
//! make the current-notation grammar under- or over-match; that is a known
//! limitation and the grammar is kept as is.

use regex::Regex;

/// Marker prefix used by Polish standards (`PN-EN 1990:2004`).
pub const DEFAULT_MARKER: &str = "PN";

/// Current notation: marker, separator, a short lazy middle section, a
/// mandatory `:YYYY` year with optional `-NN`, an optional non-whitespace
/// run ending in a 4-digit year and an optional trailing `-NN`.
const CURRENT_TAIL: &str = r"[ -].{1,30}?:\d{4}(?:-\d\d)?(?:\S+?\d{4})?(?:-\d{2})?";

/// Pre-1994 notation: `PN-76/B-03001`.
const LEGACY_TAIL: &str = r"[ -]\d{2}/.\S+\d";

/// Three mutually exclusive date forms followed by an optional time.
///
/// Capture groups: `month_name`, `slash` and `dash` hold the date (exactly
/// one participates), `time` holds the possibly-empty time candidate.
const DATE_TIME: &str = concat!(
    r"(?:",
    r"(?P<month_name>(?:Jan|Apr|Feb|Mar|May|Jun|Jul|Aug|Oct|Sep|Nov|Dec) (?:[1-9]|[12][0-9]|3[01]) \d*)",
    r"|(?P<slash>[0-1][0-9]/(?:0[1-9]|[12][0-9]|3[01])/\d*)",
    r"|(?P<dash>(?:0[1-9]|[12][0-9]|3[01])-[0-1][0-9]-\d*)",
    r")",
    r" ?",
    r"(?P<time>(?:(?:0[0-9]|[0-9]|1[0-9]|2[0-3]):(?:0[0-9]|[1-4][0-9]|5[0-9]))?(?:AM|PM|am|pm)?)",
);

/// The regular-expression grammars used by the extractor.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    marker: String,
    norm_current: Regex,
    norm_legacy: Regex,
    date_time: Regex,
}

impl PatternLibrary {
    /// Compile the grammars for the default `PN` marker.
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_MARKER).expect("built-in grammars are valid")
    }

    /// Compile the grammars for a custom marker prefix.
    ///
    /// The marker is matched literally.
    pub fn with_marker(marker: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(marker);
        Ok(Self {
            marker: marker.to_string(),
            norm_current: Regex::new(&format!("{escaped}{CURRENT_TAIL}"))?,
            norm_legacy: Regex::new(&format!("{escaped}{LEGACY_TAIL}"))?,
            date_time: Regex::new(DATE_TIME)?,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn norm_current(&self) -> &Regex {
        &self.norm_current
    }

    pub fn norm_legacy(&self) -> &Regex {
        &self.norm_legacy
    }

    pub fn date_time(&self) -> &Regex {
        &self.date_time
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(re: &Regex, text: &str) -> Vec<String> {
        re.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }

    #[test]
    fn test_current_notation_basic() {
        let lib = PatternLibrary::new();
        let text = "Zgodnie z PN-EN 1990:2004 oraz PN-B-03264:2002 i PN-EN 206-1:2003/A1:2005.";
        assert_eq!(
            all(lib.norm_current(), text),
            vec![
                "PN-EN 1990:2004",
                "PN-B-03264:2002",
                "PN-EN 206-1:2003/A1:2005",
            ]
        );
    }

    #[test]
    fn test_current_notation_year_suffix() {
        let lib = PatternLibrary::new();
        assert_eq!(
            all(lib.norm_current(), "norma PN-EN 1991-1-1:2004-12 dalej"),
            vec!["PN-EN 1991-1-1:2004-12"]
        );
    }

    #[test]
    fn test_current_notation_requires_year() {
        let lib = PatternLibrary::new();
        assert!(all(lib.norm_current(), "PN-EN 1990 bez roku").is_empty());
    }

    #[test]
    fn test_current_notation_lazy_middle_spans_codes() {
        // Known limitation: the lazy middle section runs into the next code
        // when the first one has no year.
        let lib = PatternLibrary::new();
        assert_eq!(
            all(lib.norm_current(), "PN-EN 1990 i PN-B-1:2000 "),
            vec!["PN-EN 1990 i PN-B-1:2000"]
        );
    }

    #[test]
    fn test_legacy_notation() {
        let lib = PatternLibrary::new();
        assert_eq!(
            all(lib.norm_legacy(), "wg PN-76/B-03001. oraz PN 82/B-02000 koniec"),
            vec!["PN-76/B-03001", "PN 82/B-02000"]
        );
    }

    #[test]
    fn test_custom_marker_is_literal() {
        let lib = PatternLibrary::with_marker("EN+").unwrap();
        assert_eq!(all(lib.norm_current(), "EN+ 1990:2002 "), vec!["EN+ 1990:2002"]);
        assert!(all(lib.norm_current(), "ENN 1990:2002 ").is_empty());
        assert_eq!(lib.marker(), "EN+");
    }

    #[test]
    fn test_date_alternatives_are_exclusive() {
        let lib = PatternLibrary::new();
        for (text, group) in [
            ("Jan 5 2021", "month_name"),
            ("01/05/2021", "slash"),
            ("05-01-2021", "dash"),
        ] {
            let caps = lib.date_time().captures(text).unwrap();
            let present: Vec<_> = ["month_name", "slash", "dash"]
                .into_iter()
                .filter(|name| caps.name(name).is_some())
                .collect();
            assert_eq!(present, vec![group], "input {text}");
        }
    }

    #[test]
    fn test_date_time_groups() {
        let lib = PatternLibrary::new();
        let caps = lib.date_time().captures("Jan 5 2021 11:30PM").unwrap();
        assert_eq!(&caps["month_name"], "Jan 5 2021");
        assert_eq!(&caps["time"], "11:30PM");

        let caps = lib.date_time().captures("05-01-2021 23:45").unwrap();
        assert_eq!(&caps["dash"], "05-01-2021");
        assert_eq!(&caps["time"], "23:45");

        let caps = lib.date_time().captures("05-01-2021.").unwrap();
        assert_eq!(&caps["time"], "");
    }
}
