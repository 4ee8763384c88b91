//! Per-question aggregation of survey answers.

use std::collections::BTreeMap;

use crate::domain::answer::Answer;

#[derive(Clone, Debug, PartialEq)]
pub struct QuestionScore {
    pub question_id: String,
    pub responses: usize,
    /// Mean of answer points, in `1.0..=3.0`.
    pub average: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreSummary {
    pub respondents: usize,
    pub questions: Vec<QuestionScore>,
}

impl ScoreSummary {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn overall_average(&self) -> Option<f64> {
        let total: usize = self.questions.iter().map(|question| question.responses).sum();
        if total == 0 {
            return None;
        }

        let weighted: f64 = self
            .questions
            .iter()
            .map(|question| question.average * question.responses as f64)
            .sum();
        Some(weighted / total as f64)
    }
}

pub fn score_answers(answers: &[Answer]) -> ScoreSummary {
    let mut totals: BTreeMap<&str, (usize, u32)> = BTreeMap::new();
    let mut respondents: Vec<&str> = Vec::new();

    for answer in answers {
        let entry = totals.entry(answer.question_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += answer.level.points();

        if !respondents.contains(&answer.user_id.as_str()) {
            respondents.push(answer.user_id.as_str());
        }
    }

    let questions = totals
        .into_iter()
        .map(|(question_id, (responses, points))| QuestionScore {
            question_id: question_id.to_owned(),
            responses,
            average: points as f64 / responses as f64,
        })
        .collect();

    ScoreSummary { respondents: respondents.len(), questions }
}
