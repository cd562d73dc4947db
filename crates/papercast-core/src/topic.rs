/// Label used when no candidate topics are supplied.
pub const UNSPECIFIED_TOPIC: &str = "Unspecified";

/// Picks one label for a text out of caller-supplied candidates.
pub trait TopicClassifier: Send + Sync {
    /// Must return an element of `topics`, or [`UNSPECIFIED_TOPIC`] iff `topics` is empty.
    fn classify(&self, text: &str, topics: &[String]) -> String;
}

/// Case-insensitive substring frequency classifier.
///
/// Counts non-overlapping occurrences of each topic in the text and returns
/// the most frequent one; ties go to the earliest topic in the list.
///
/// An empty topic counts zero occurrences. Plain substring counting would
/// match the empty string at every position and let a blank entry beat every
/// real topic, so blank entries only win when nothing else matches and they
/// come first.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringClassifier;

impl SubstringClassifier {
    fn occurrences(haystack: &str, topic: &str) -> usize {
        let needle = topic.to_lowercase();
        if needle.is_empty() {
            return 0;
        }
        haystack.matches(needle.as_str()).count()
    }
}

impl TopicClassifier for SubstringClassifier {
    fn classify(&self, text: &str, topics: &[String]) -> String {
        let Some(first) = topics.first() else {
            return UNSPECIFIED_TOPIC.to_string();
        };

        let haystack = text.to_lowercase();
        let mut best = first;
        let mut best_count = Self::occurrences(&haystack, first);
        for topic in &topics[1..] {
            let count = Self::occurrences(&haystack, topic);
            if count > best_count {
                best = topic;
                best_count = count;
            }
        }
        best.clone()
    }
}
