use lazy_static::lazy_static;

use super::error::TriageError;

lazy_static! {
    /// Built-in crisis and self-harm terms, Arabic and English.
    pub static ref DEFAULT_CRISIS_TERMS: Vec<&'static str> = vec![
        "انتحار",
        "أنتحر",
        "أؤذي نفسي",
        "اذي نفسي",
        "أذى",
        "kill myself",
        "suicide",
        "self harm",
        "تهديد",
        "خطر",
        "خطير",
        "ساعدوني",
        "عاجل",
    ];
}

/// Substring matcher over raw feedback text, independent of any model output.
///
/// Terms are case-folded once at construction; scripts without case
/// (Arabic) pass through `to_lowercase` unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrisisLexicon {
    terms: Vec<String>,
}

impl Default for CrisisLexicon {
    fn default() -> Self {
        Self {
            terms: DEFAULT_CRISIS_TERMS.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl CrisisLexicon {
    /// Builds a lexicon from explicit terms.
    ///
    /// # Errors
    /// `Configuration` if the list is empty or any term is blank.
    pub fn new<I, S>(terms: I) -> Result<Self, TriageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lexicon = Self { terms: Vec::new() };
        lexicon.extend(terms)?;
        if lexicon.terms.is_empty() {
            return Err(TriageError::Configuration("Crisis lexicon cannot be empty".into()));
        }
        Ok(lexicon)
    }

    /// Appends terms to the lexicon, skipping ones already present.
    pub fn extend<I, S>(&mut self, terms: I) -> Result<(), TriageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, term) in terms.into_iter().enumerate() {
            let term = term.as_ref().trim();
            if term.is_empty() {
                return Err(TriageError::Configuration(format!(
                    "Crisis term {} cannot be empty",
                    i + 1
                )));
            }
            let folded = term.to_lowercase();
            if !self.terms.contains(&folded) {
                self.terms.push(folded);
            }
        }
        Ok(())
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True when any crisis term occurs in `text`.
    pub fn detect(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.terms.iter().any(|term| folded.contains(term.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_arabic_terms() {
        let lexicon = CrisisLexicon::default();
        assert!(lexicon.detect("أفكر في الانتحار كل يوم"));
        assert!(lexicon.detect("ساعدوني من فضلكم"));
        assert!(!lexicon.detect("أشعر بالتعب من العمل"));
    }

    #[test]
    fn test_english_terms_are_case_insensitive() {
        let lexicon = CrisisLexicon::default();
        assert!(lexicon.detect("I want to KILL MYSELF"));
        assert!(lexicon.detect("thoughts of Self Harm lately"));
        assert!(!lexicon.detect("I feel a bit tired"));
    }

    #[test]
    fn test_rejects_blank_terms() {
        assert!(matches!(
            CrisisLexicon::new(vec!["suicide", "  "]),
            Err(TriageError::Configuration(_))
        ));
        assert!(matches!(
            CrisisLexicon::new(Vec::<String>::new()),
            Err(TriageError::Configuration(_))
        ));
    }

    #[test]
    fn test_extend_deduplicates() {
        let mut lexicon = CrisisLexicon::default();
        let before = lexicon.terms().len();
        lexicon.extend(["SUICIDE", "overdose"]).unwrap();
        assert_eq!(lexicon.terms().len(), before + 1);
        assert!(lexicon.detect("took an Overdose"));
    }
}
