use crate::model::Article;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "another", "because", "being", "between", "could",
    "first", "great", "however", "large", "other", "over", "really", "should", "their",
    "there", "these", "thing", "those", "until", "where", "while", "would",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub keyword: String,
    pub frequency: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub trends: Vec<Trend>,
    pub suggestions: Vec<String>,
}

/// Turns a batch of stored articles into insights.
pub trait Summarizer {
    fn summarize(&self, articles: &[Article]) -> Insights;
}

/// Frequency-count heuristics; no language model involved.
#[derive(Debug, Clone)]
pub struct KeywordSummarizer {
    pub max_articles: usize,
    pub sentence_limit: usize,
    pub top_trends: usize,
    pub suggestion_count: usize,
}

impl Default for KeywordSummarizer {
    fn default() -> Self {
        Self {
            max_articles: 5,
            sentence_limit: 3,
            top_trends: 8,
            suggestion_count: 3,
        }
    }
}

impl Summarizer for KeywordSummarizer {
    fn summarize(&self, articles: &[Article]) -> Insights {
        let selected = &articles[..articles.len().min(self.max_articles)];

        let summary = selected
            .iter()
            .map(|a| format!("- {}: {}", a.headline, lead_sentences(&a.content, self.sentence_limit)))
            .collect::<Vec<_>>()
            .join("\n");

        let trends = extract_keywords(selected, self.top_trends);
        let suggestions = policy_suggestions(&trends[..trends.len().min(self.suggestion_count)]);

        Insights {
            summary,
            trends,
            suggestions,
        }
    }
}

/// The first `limit` sentences of `text`, split after `.`, `!` or `?` followed by whitespace.
pub fn lead_sentences(text: &str, limit: usize) -> String {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(next_idx, next)) = chars.peek()
            && next.is_whitespace()
        {
            sentences.push(text[start..=idx].trim());
            start = next_idx;
        }
    }
    sentences.push(text[start..].trim());

    sentences
        .into_iter()
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased runs of three or more ASCII letters.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() >= 3)
        .map(|word| word.to_ascii_lowercase())
}

/// Most frequent non-stop-word tokens across headlines and bodies.
/// Ties are broken alphabetically so the output is stable.
pub fn extract_keywords(articles: &[Article], top_k: usize) -> Vec<Trend> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for article in articles {
        for token in tokenize(&article.headline).chain(tokenize(&article.content)) {
            if !STOP_WORDS.contains(&token.as_str()) {
                *counts.entry(token).or_default() += 1;
            }
        }
    }

    let mut trends: Vec<Trend> = counts
        .into_iter()
        .map(|(keyword, frequency)| Trend { keyword, frequency })
        .collect();
    trends.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    trends.truncate(top_k);
    trends
}

pub fn policy_suggestions(trends: &[Trend]) -> Vec<String> {
    trends
        .iter()
        .map(|t| {
            format!(
                "Investigate targeted guidance or incentives related to '{}', as it appears in recent coverage ({} mentions).",
                t.keyword, t.frequency
            )
        })
        .collect()
}

/// Top five trends per website.
pub fn trends_by_website(articles: &[Article]) -> BTreeMap<String, Vec<Trend>> {
    let mut grouped: BTreeMap<String, Vec<Article>> = BTreeMap::new();
    for article in articles {
        let key = if article.website.is_empty() {
            "unknown".to_string()
        } else {
            article.website.clone()
        };
        grouped.entry(key).or_default().push(article.clone());
    }

    grouped
        .into_iter()
        .map(|(website, items)| (website, extract_keywords(&items, 5)))
        .collect()
}
