/// A survey question. Answers reference it by `id`, so ids must stay stable across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
}

pub const QUESTIONS: &[Question] = &[
    Question { id: "energi", text: "Hvordan er energinivået ditt denne uka?" },
    Question { id: "arbeidsmengde", text: "Hvordan opplever du arbeidsmengden?" },
    Question { id: "samarbeid", text: "Hvordan fungerer samarbeidet i teamet?" },
    Question { id: "trygghet", text: "Føler du deg trygg på å si ifra i teamet?" },
];

pub fn find(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|question| question.id == id)
}
