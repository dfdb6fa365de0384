use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{error, info, instrument, warn};

use super::{parser::parse_questions, Question, DEFAULT_CATEGORY};
use crate::error::LoadError;

const QUIZ_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedQuiz {
    pub category: String,
    pub name: String,
    pub questions: Vec<Question>,
}

/// `General_Knowledge.txt` becomes `General Knowledge`.
pub fn quiz_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.replace('_', " ").trim().to_owned();
    (!name.is_empty()).then_some(name)
}

/// Keeps the questions that offer a choice, logging the rest.
pub fn playable(questions: Vec<Question>, source: &str) -> Vec<Question> {
    let total = questions.len();
    let kept: Vec<Question> = questions.into_iter().filter(Question::is_playable).collect();
    if kept.len() < total {
        warn!(
            "{}: skipped {} question(s) without incorrect options",
            source,
            total - kept.len()
        );
    }
    kept
}

pub fn load_file(path: &Path) -> Result<Vec<Question>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_owned(),
        source,
    })?;
    let questions = playable(parse_questions(&content), &path.display().to_string());
    if questions.is_empty() {
        return Err(LoadError::NoQuestions {
            path: path.to_owned(),
        });
    }
    Ok(questions)
}

/// Loads `root/*.txt` into the default category and `root/<category>/*.txt`
/// into `<category>`. A missing root is created and yields nothing. Broken
/// files are logged and skipped.
#[instrument(level = "info")]
pub fn load_dir(root: &Path) -> Vec<LoadedQuiz> {
    if !root.is_dir() {
        info!("Quiz directory {} does not exist, creating it", root.display());
        if let Err(e) = fs::create_dir_all(root) {
            error!("Failed to create quiz directory {}: {}", root.display(), e);
        }
        return Vec::new();
    }

    let mut loaded = Vec::new();
    for entry in sorted_entries(root) {
        if entry.is_dir() {
            let Some(category) = entry.file_name().and_then(|n| n.to_str()) else {
                warn!("Skipping category with non UTF-8 name: {}", entry.display());
                continue;
            };
            for file in sorted_entries(&entry) {
                if is_quiz_file(&file) {
                    loaded.extend(load_entry(&file, category));
                }
            }
        } else if is_quiz_file(&entry) {
            loaded.extend(load_entry(&entry, DEFAULT_CATEGORY));
        }
    }

    info!("Loaded {} quiz(zes) from {}", loaded.len(), root.display());
    loaded
}

fn load_entry(path: &Path, category: &str) -> Option<LoadedQuiz> {
    let Some(name) = quiz_name(path) else {
        warn!("Skipping file with unusable name: {}", path.display());
        return None;
    };
    match load_file(path) {
        Ok(questions) => {
            info!(
                "Loaded quiz '{}' ({} questions) into category '{}'",
                name,
                questions.len(),
                category
            );
            Some(LoadedQuiz {
                category: category.to_owned(),
                name,
                questions,
            })
        }
        Err(e) => {
            error!("Failed to load quiz file: {}", e);
            None
        }
    }
}

fn is_quiz_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == QUIZ_EXTENSION)
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(e) => {
            error!("Failed to list {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    entries.sort();
    entries
}
