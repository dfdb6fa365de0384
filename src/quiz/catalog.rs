use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    path::Path,
    sync::Arc,
};

use tracing::{info, instrument, warn};

use super::{loader::playable, loader::LoadedQuiz, Question, Quiz, QuizId, DEFAULT_CATEGORY};
use crate::error::CatalogError;

/// Quiz name to question list, as stored in the catalog file.
pub type CustomQuizzes = BTreeMap<String, Vec<Question>>;

/// Every quiz the bot can run, grouped by category.
///
/// Quizzes read from the quiz directory are fixed for the lifetime of the
/// process. Quizzes added by the administrator are additionally kept in
/// `custom` so they can be written back to the catalog file.
#[derive(Debug, Default)]
pub struct Catalog {
    quizzes: HashMap<QuizId, Arc<Quiz>>,
    custom: CustomQuizzes,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(loaded: Vec<LoadedQuiz>, custom: CustomQuizzes) -> Self {
        let mut catalog = Self::new();
        for quiz in loaded {
            catalog.insert(quiz.category, quiz.name, quiz.questions);
        }
        for (name, questions) in custom {
            if let Err(e) = catalog.add_custom(&name, questions) {
                warn!("Skipping '{}' from the catalog file: {}", name, e);
            }
        }
        catalog
    }

    /// Adds a quiz, replacing one with the same category and name.
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        questions: Vec<Question>,
    ) -> Arc<Quiz> {
        let quiz = Arc::new(Quiz::new(name, category, questions));
        self.quizzes
            .retain(|_, q| !(q.category() == quiz.category() && q.name() == quiz.name()));
        self.quizzes.insert(quiz.id(), quiz.clone());
        quiz
    }

    pub fn get(&self, id: QuizId) -> Option<Arc<Quiz>> {
        self.quizzes.get(&id).cloned()
    }

    pub fn find(&self, category: &str, name: &str) -> Option<Arc<Quiz>> {
        self.quizzes
            .values()
            .find(|q| q.category() == category && q.name() == name)
            .cloned()
    }

    pub fn categories(&self) -> Vec<String> {
        self.quizzes
            .values()
            .map(|q| q.category().to_owned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn in_category(&self, category: &str) -> Vec<Arc<Quiz>> {
        let mut quizzes: Vec<Arc<Quiz>> = self
            .quizzes
            .values()
            .filter(|q| q.category() == category)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| a.name().cmp(b.name()));
        quizzes
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    pub fn custom(&self) -> &CustomQuizzes {
        &self.custom
    }

    pub fn add_custom(
        &mut self,
        name: &str,
        questions: Vec<Question>,
    ) -> Result<Arc<Quiz>, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if !self.custom.contains_key(name) && self.find(DEFAULT_CATEGORY, name).is_some() {
            return Err(CatalogError::ReadOnly(name.to_owned()));
        }
        let questions = playable(questions, name);
        if questions.is_empty() {
            return Err(CatalogError::NoQuestions(name.to_owned()));
        }

        self.custom.insert(name.to_owned(), questions.clone());
        Ok(self.insert(DEFAULT_CATEGORY, name, questions))
    }

    pub fn remove_custom(&mut self, name: &str) -> Result<(), CatalogError> {
        let name = name.trim();
        if self.custom.remove(name).is_none() {
            return if self.quizzes.values().any(|q| q.name() == name) {
                Err(CatalogError::ReadOnly(name.to_owned()))
            } else {
                Err(CatalogError::UnknownQuiz(name.to_owned()))
            };
        }
        self.quizzes
            .retain(|_, q| !(q.category() == DEFAULT_CATEGORY && q.name() == name));
        Ok(())
    }

    pub fn custom_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.custom)
    }
}

/// Reads the catalog file. A missing file is an empty catalog.
#[instrument(level = "info")]
pub fn load_custom(path: &Path) -> Result<CustomQuizzes, CatalogError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Catalog file {} not found, starting empty", path.display());
            return Ok(CustomQuizzes::new());
        }
        Err(source) => {
            return Err(CatalogError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| CatalogError::Json {
        path: path.to_owned(),
        source,
    })
}

/// Rewrites the whole catalog file. Last writer wins.
pub async fn save_custom(path: &Path, json: String) -> Result<(), CatalogError> {
    tokio::fs::write(path, json)
        .await
        .map_err(|source| CatalogError::Io {
            path: path.to_owned(),
            source,
        })
}
