// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Word and sentence figures over the evidence corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_words_per_sentence: f64,
}

impl CorpusStats {
    /// Compute figures for `entries` joined into one text
    ///
    /// Words are whitespace-delimited tokens. Sentences are the non-empty
    /// fragments left after flattening newlines and splitting on `.`.
    pub fn compute<S: AsRef<str>>(entries: &[S]) -> Self {
        let corpus = entries
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");

        let word_count = corpus.split_whitespace().count();
        let sentence_count = corpus
            .replace('\n', " ")
            .split('.')
            .filter(|s| !s.trim().is_empty())
            .count();
        let avg_words_per_sentence = if sentence_count > 0 {
            word_count as f64 / sentence_count as f64
        } else {
            0.0
        };

        Self {
            word_count,
            sentence_count,
            avg_words_per_sentence,
        }
    }

    /// Human-readable line appended to the evidence log
    pub fn summary_line(&self) -> String {
        format!(
            "[stats] words={} sentences={} avg_words_per_sentence={:.2}",
            self.word_count, self.sentence_count, self.avg_words_per_sentence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let stats = CorpusStats::compute(&["Prices rose. Wages lagged.", "Rates\nheld steady."]);
        assert_eq!(stats.word_count, 7);
        assert_eq!(stats.sentence_count, 3);
        assert!((stats.avg_words_per_sentence - 7.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_sentences_means_zero_average() {
        let stats = CorpusStats::compute::<&str>(&[]);
        assert_eq!(stats, CorpusStats::default());
        assert_eq!(stats.avg_words_per_sentence, 0.0);

        let dots = CorpusStats::compute(&[" . .. "]);
        assert_eq!(dots.sentence_count, 0);
        assert_eq!(dots.word_count, 2);
        assert_eq!(dots.avg_words_per_sentence, 0.0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let evidence = vec![
            "Headline inflation eased to 2.4%.".to_string(),
            "Core stayed sticky".to_string(),
        ];
        assert_eq!(CorpusStats::compute(&evidence), CorpusStats::compute(&evidence));
    }

    #[test]
    fn test_summary_line() {
        let stats = CorpusStats {
            word_count: 10,
            sentence_count: 4,
            avg_words_per_sentence: 2.5,
        };
        assert_eq!(
            stats.summary_line(),
            "[stats] words=10 sentences=4 avg_words_per_sentence=2.50"
        );
    }
}
