//! Task definitions: the built-in exercise set, custom task drafts, and
//! the repository that merges both with a user's completion history.

mod repo;

pub use repo::{CreateTaskError, TaskRepository};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Difficulty of an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(ValidationError::InvalidDifficulty(other.to_string())),
        }
    }
}

/// A programming exercise presented to the learner.
///
/// `completed` is derived by joining against the user's completion history;
/// it is never stored on the task itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    /// Reference solution shown by "Solve" and sent to the judge.
    pub solution: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Editor template for attempting this task from scratch.
    pub fn editor_template(&self) -> String {
        format!("# {}\n\n# Write your solution here:", self.description)
    }

    /// Editor template with the reference solution filled in.
    pub fn solution_template(&self) -> String {
        format!("# {}\n{}", self.description, self.solution)
    }
}

/// Rejected custom task input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("category must not be empty")]
    EmptyCategory,

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("invalid difficulty: {0}")]
    InvalidDifficulty(String),
}

/// A user-authored task before it is persisted and assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub category: String,
    pub description: String,
    pub solution: String,
    pub difficulty: String,
}

impl TaskDraft {
    /// Validate the draft, returning the parsed difficulty.
    pub fn validate(&self) -> Result<Difficulty, ValidationError> {
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        self.difficulty.parse()
    }
}

/// The built-in exercise set, in seed order. Ids are fixed so completion
/// history keyed on them survives across releases.
pub fn seed_tasks() -> Vec<Task> {
    vec![
        Task {
            id: "1".to_string(),
            category: "Basics".to_string(),
            title: "Hello World".to_string(),
            description: "Write a program that prints 'Hello, World!' to the console.".to_string(),
            solution: "print('Hello, World!')".to_string(),
            difficulty: Difficulty::Easy,
            completed: false,
        },
        Task {
            id: "2".to_string(),
            category: "Variables".to_string(),
            title: "Name and Age".to_string(),
            description: "Create variables for name and age, then print 'My name is [name] and I am [age] years old.'".to_string(),
            solution: "name = 'Alice'\nage = 25\nprint(f'My name is {name} and I am {age} years old.')".to_string(),
            difficulty: Difficulty::Easy,
            completed: false,
        },
        Task {
            id: "3".to_string(),
            category: "Numbers".to_string(),
            title: "Simple Addition".to_string(),
            description: "Create a program that adds two numbers (10 and 20) and prints the sum.".to_string(),
            solution: "a = 10\nb = 20\nprint(a + b)".to_string(),
            difficulty: Difficulty::Easy,
            completed: false,
        },
        Task {
            id: "4".to_string(),
            category: "Strings".to_string(),
            title: "String Concatenation".to_string(),
            description: "Combine two strings 'Hello' and 'Python' with a space between them.".to_string(),
            solution: "str1 = 'Hello'\nstr2 = 'Python'\nprint(f'{str1} {str2}')".to_string(),
            difficulty: Difficulty::Easy,
            completed: false,
        },
        Task {
            id: "5".to_string(),
            category: "Input".to_string(),
            title: "User Input".to_string(),
            description: "Get user's name as input and print 'Hello, [name]!'".to_string(),
            solution: "name = input('Enter your name: ')\nprint(f'Hello, {name}!')".to_string(),
            difficulty: Difficulty::Medium,
            completed: false,
        },
    ]
}
