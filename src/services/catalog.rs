use serde::Serialize;

use crate::models::profile::TutorListing;

/// Every subject a tutor can be browsed by.
pub const SUBJECTS: [&str; 14] = [
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "English",
    "Computer Science",
    "English Literature",
    "Essay Writing",
    "History",
    "Political Science",
    "Spanish",
    "French",
    "Statistics",
    "Calculus",
];

#[derive(Debug, Clone, Serialize)]
pub struct SubjectCategory {
    pub name: &'static str,
    pub subjects: Vec<&'static str>,
}

pub fn categories() -> Vec<SubjectCategory> {
    [
        ("Mathematics", vec!["Mathematics", "Calculus", "Statistics"]),
        ("Sciences", vec!["Physics", "Chemistry", "Biology"]),
        ("Languages", vec!["English", "Spanish", "French"]),
        ("Social Sciences", vec!["History", "Political Science"]),
        ("Other", vec!["Essay Writing", "Computer Science"]),
    ]
    .into_iter()
    .map(|(name, subjects)| SubjectCategory { name, subjects })
    .collect()
}

/// Catalogue subjects containing `query`, case-insensitively
pub fn search_subjects(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_lowercase();
    SUBJECTS
        .iter()
        .copied()
        .filter(|s| s.to_lowercase().contains(&query))
        .collect()
}

/// Trims subject names and drops blanks and case-insensitive duplicates,
/// keeping the first spelling.
pub fn normalize_subject_names(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut result = Vec::new();

    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let key = name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        result.push(name.to_string());
    }

    result
}

/// Tutor grid filtering. `subject` must match one of the tutor's subjects;
/// `q` matches the name, any subject, or the bio.
pub fn filter_tutors(
    tutors: Vec<TutorListing>,
    subject: Option<&str>,
    query: Option<&str>,
) -> Vec<TutorListing> {
    let subject = subject
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let query = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    tutors
        .into_iter()
        .filter(|tutor| {
            let profile = &tutor.profile;

            let subject_ok = subject.as_ref().map_or(true, |wanted| {
                profile.subjects.iter().any(|s| s.to_lowercase() == *wanted)
            });

            let query_ok = query.as_ref().map_or(true, |q| {
                profile.full_name.to_lowercase().contains(q)
                    || profile.subjects.iter().any(|s| s.to_lowercase().contains(q))
                    || profile
                        .bio
                        .as_ref()
                        .is_some_and(|bio| bio.to_lowercase().contains(q))
            });

            subject_ok && query_ok
        })
        .collect()
}
