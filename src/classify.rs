use anyhow::Context as _;
use regex::Regex;

pub const UNKNOWN: &str = "Unknown";

const PROFESSIONS: &[&str] = &[
    "Actor",
    "Actress",
    "Singer",
    "Musician",
    "Athlete",
    "Director",
    "Producer",
    "Basketball player",
];

const NATIONALITIES: &[&str] = &[
    "American",
    "British",
    "Canadian",
    "Australian",
    "French",
    "German",
    "Italian",
    "Mexican",
    "Spanish",
    "Japanese",
    "Korean",
    "Chinese",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    profession: Regex,
    nationality: Regex,
}

impl Classifier {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            profession: vocabulary_regex(PROFESSIONS).context("build profession pattern")?,
            nationality: vocabulary_regex(NATIONALITIES).context("build nationality pattern")?,
        })
    }

    /// Binary: `Female` when the extract uses "she ", otherwise `Male`.
    pub fn gender(&self, extract: &str) -> Gender {
        if extract.to_lowercase().contains("she ") {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    /// First vocabulary profession in `description`, or `Unknown`.
    pub fn profession(&self, description: &str) -> String {
        first_match(&self.profession, PROFESSIONS, description)
    }

    /// First vocabulary nationality in `description`, or `Unknown`.
    pub fn nationality(&self, description: &str) -> String {
        first_match(&self.nationality, NATIONALITIES, description)
    }
}

fn vocabulary_regex(vocabulary: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = vocabulary
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)({alternation})"))
}

fn first_match(pattern: &Regex, vocabulary: &[&str], text: &str) -> String {
    pattern
        .find(text)
        .and_then(|found| {
            vocabulary
                .iter()
                .find(|word| word.eq_ignore_ascii_case(found.as_str()))
        })
        .map_or_else(|| UNKNOWN.to_owned(), |word| (*word).to_owned())
}

/// `min(100, round(content_length / scale * 100))`. A zero scale scores 0.
pub fn popularity_score(content_length: usize, scale: u64) -> u8 {
    if scale == 0 {
        return 0;
    }
    let score = (content_length as f64 / scale as f64 * 100.0).round();
    score.clamp(0.0, 100.0) as u8
}
