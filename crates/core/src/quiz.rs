//! Grading of the end-of-course quiz.

use crate::course::CourseData;
use crate::error::QuizError;
use serde::{Deserialize, Serialize};

/// The outcome for a single quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuestionResult {
    /// The option the learner picked, if any.
    pub selected: Option<usize>,
    pub correct_answer_index: usize,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuizResult {
    pub questions: Vec<QuestionResult>,
    pub correct: usize,
    pub total: usize,
}

/// Grades `answers` against the course quiz, position by position.
///
/// Missing trailing answers count as unanswered. An answer list longer than
/// the quiz, or a selection that is not one of the question's options, is
/// rejected.
pub fn grade_quiz(course: &CourseData, answers: &[Option<usize>]) -> Result<QuizResult, QuizError> {
    if answers.len() > course.quiz.len() {
        return Err(QuizError::TooManyAnswers {
            given: answers.len(),
            questions: course.quiz.len(),
        });
    }

    let questions = course
        .quiz
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let selected = answers.get(index).copied().flatten();
            if let Some(selected) = selected {
                if selected >= question.options.len() {
                    return Err(QuizError::OptionOutOfRange {
                        question: index,
                        selected,
                        options: question.options.len(),
                    });
                }
            }
            Ok(QuestionResult {
                selected,
                correct_answer_index: question.correct_answer_index,
                is_correct: selected == Some(question.correct_answer_index),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let correct = questions.iter().filter(|q| q.is_correct).count();
    Ok(QuizResult {
        total: questions.len(),
        correct,
        questions,
    })
}
