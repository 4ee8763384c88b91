use serde::Serialize;

use helsesjekk_core::domain::answer::AnswerLevel;
use helsesjekk_core::domain::ask::Ask;
use helsesjekk_core::domain::question::{self, QUESTIONS};
use helsesjekk_core::domain::team::Team;
use helsesjekk_core::scoring::ScoreSummary;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "plain_text_input")]
pub struct PlainTextInput {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
    Input { block_id: String, label: TextObject, element: PlainTextInput },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// A message with no blocks; Slack renders the fallback text as the body.
    pub fn text(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub view_type: &'static str,
    pub callback_id: String,
    pub private_metadata: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

pub const SETTINGS_MODAL_CALLBACK_ID: &str = "settings_modal";
pub const TEAM_NAME_BLOCK_ID: &str = "team_name";
pub const TEAM_NAME_ACTION_ID: &str = "team_name_input";

/// Settings surface opened by `/helsesjekk`. The team id travels in `private_metadata`.
pub fn settings_modal(team: &Team) -> ModalView {
    let initial_name = (!team.has_placeholder_name()).then(|| team.name.clone());

    let mut blocks = vec![Block::Section {
        block_id: "settings.intro".to_owned(),
        text: TextObject::mrkdwn(format!(
            "Innstillinger for helsesjekk i <#{channel}>.",
            channel = team.id.as_str()
        )),
    }];
    blocks.push(Block::Input {
        block_id: TEAM_NAME_BLOCK_ID.to_owned(),
        label: TextObject::plain("Teamnavn"),
        element: PlainTextInput {
            action_id: TEAM_NAME_ACTION_ID.to_owned(),
            initial_value: initial_name,
        },
    });
    if !team.active {
        blocks.push(Block::Context {
            block_id: "settings.inactive".to_owned(),
            elements: vec![TextObject::plain("Teamet er deaktivert og får ingen nye spørsmål.")],
        });
    }

    ModalView {
        view_type: "modal",
        callback_id: SETTINGS_MODAL_CALLBACK_ID.to_owned(),
        private_metadata: team.id.as_str().to_owned(),
        title: TextObject::plain("Helsesjekk"),
        submit: TextObject::plain("Lagre"),
        close: TextObject::plain("Avbryt"),
        blocks,
    }
}

const ANSWER_ACTION_PREFIX: &str = "answer";

pub fn answer_action_id(question_id: &str, level: AnswerLevel) -> String {
    format!("{ANSWER_ACTION_PREFIX}.{question_id}.{level}", level = level.as_str())
}

/// Splits `answer.<question>.<level>` back into its parts. Unknown questions are rejected.
pub fn parse_answer_action(action_id: &str) -> Option<(&'static str, AnswerLevel)> {
    let rest = action_id.strip_prefix(ANSWER_ACTION_PREFIX)?.strip_prefix('.')?;
    let (question_id, level) = rest.rsplit_once('.')?;
    let question = question::find(question_id)?;
    Some((question.id, level.parse().ok()?))
}

fn level_label(level: AnswerLevel) -> &'static str {
    match level {
        AnswerLevel::Good => "Bra",
        AnswerLevel::Medium => "Middels",
        AnswerLevel::Bad => "Dårlig",
    }
}

/// Survey round as posted to the team channel. Revealed rounds lose their answer buttons.
pub fn survey_message(team: &Team, ask: &Ask, respondents: usize) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("Ukentlig helsesjekk for {}", team.name))
        .section("survey.header", |section| {
            section.mrkdwn(format!("*Ukentlig helsesjekk for {}* :wave:", team.name));
        });

    for question in QUESTIONS {
        builder = builder.section(format!("survey.question.{}", question.id), |section| {
            section.mrkdwn(format!("*{}*", question.text));
        });
        if !ask.revealed {
            let ask_id = ask.id.to_string();
            builder = builder.actions(format!("survey.answers.{}", question.id), |actions| {
                for level in [AnswerLevel::Good, AnswerLevel::Medium, AnswerLevel::Bad] {
                    let mut button =
                        ButtonElement::new(answer_action_id(question.id, level), level_label(level))
                            .value(ask_id.clone());
                    if level == AnswerLevel::Good {
                        button = button.style(ButtonStyle::Primary);
                    }
                    actions.button(button);
                }
            });
        }
    }

    let status = if ask.revealed {
        format!("Svarene er avslørt. {respondents} svarte.")
    } else {
        format!("{respondents} har svart så langt.")
    };
    builder.context("survey.status", |context| {
        context.plain(status);
    })
    .build()
}

pub fn reveal_message(team: &Team, summary: &ScoreSummary) -> MessageTemplate {
    if summary.is_empty() {
        return MessageBuilder::new(format!("Ingen svar for {} denne gangen", team.name))
            .section("reveal.empty", |section| {
                section.mrkdwn(format!(
                    "Ingen i *{}* svarte på helsesjekken denne gangen.",
                    team.name
                ));
            })
            .build();
    }

    let lines = summary
        .questions
        .iter()
        .map(|score| {
            let text = question::find(&score.question_id)
                .map(|question| question.text)
                .unwrap_or(score.question_id.as_str());
            format!(
                "{} {text}: {:.1} ({} svar)",
                score_icon(score.average),
                score.average,
                score.responses
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    MessageBuilder::new(format!("Resultater for {}", team.name))
        .section("reveal.header", |section| {
            section.mrkdwn(format!("*Resultater for {}*", team.name));
        })
        .section("reveal.questions", |section| {
            section.mrkdwn(lines);
        })
        .context("reveal.summary", |context| {
            context.plain(format!(
                "{} svarte. Snitt {:.1}.",
                summary.respondents,
                summary.overall_average().unwrap_or_default()
            ));
        })
        .build()
}

fn score_icon(average: f64) -> &'static str {
    if average >= 2.5 {
        ":large_green_circle:"
    } else if average >= 1.5 {
        ":large_yellow_circle:"
    } else {
        ":red_circle:"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use helsesjekk_core::domain::answer::{Answer, AnswerLevel};
    use helsesjekk_core::domain::ask::{Ask, AskId};
    use helsesjekk_core::domain::question::QUESTIONS;
    use helsesjekk_core::domain::team::{Team, TeamId};
    use helsesjekk_core::scoring::score_answers;

    use super::{
        answer_action_id, parse_answer_action, reveal_message, settings_modal, survey_message,
        Block, ButtonElement, ButtonStyle, MessageBuilder, SETTINGS_MODAL_CALLBACK_ID,
    };

    fn ask(revealed: bool) -> Ask {
        Ask {
            id: AskId(12),
            team_id: TeamId::channel("C1"),
            timestamp: Utc::now(),
            revealed,
            message_ts: None,
        }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("header", |section| {
                section.mrkdwn("*hei*");
            })
            .actions("buttons", |actions| {
                actions.button(ButtonElement::new("a.b", "Trykk").style(ButtonStyle::Primary));
            })
            .build();

        let json = serde_json::to_value(&message).expect("serialize");

        assert_eq!(json["blocks"][0]["type"], "section");
        assert_eq!(json["blocks"][0]["text"]["type"], "mrkdwn");
        assert_eq!(json["blocks"][1]["elements"][0]["type"], "button");
        assert_eq!(json["blocks"][1]["elements"][0]["text"]["type"], "plain_text");
        assert_eq!(json["blocks"][1]["elements"][0]["style"], "primary");
    }

    #[test]
    fn settings_modal_carries_team_id_and_hides_placeholder_name() {
        let team = Team::new(TeamId::channel("C42"), Team::PLACEHOLDER_NAME);

        let modal = settings_modal(&team);
        let json = serde_json::to_value(&modal).expect("serialize");

        assert_eq!(json["type"], "modal");
        assert_eq!(json["callback_id"], SETTINGS_MODAL_CALLBACK_ID);
        assert_eq!(json["private_metadata"], "C42");
        let input = modal
            .blocks
            .iter()
            .find_map(|block| match block {
                Block::Input { element, .. } => Some(element),
                _ => None,
            })
            .expect("team name input");
        assert_eq!(input.initial_value, None);
        assert_eq!(json["blocks"][1]["element"]["type"], "plain_text_input");
    }

    #[test]
    fn settings_modal_prefills_configured_name() {
        let team = Team::new(TeamId::channel("C42"), "Plattform");
        let json = serde_json::to_value(settings_modal(&team)).expect("serialize");

        assert_eq!(json["blocks"][1]["element"]["initial_value"], "Plattform");
    }

    #[test]
    fn answer_action_ids_round_trip_for_known_questions() {
        let action_id = answer_action_id(QUESTIONS[0].id, AnswerLevel::Medium);

        assert_eq!(parse_answer_action(&action_id), Some((QUESTIONS[0].id, AnswerLevel::Medium)));
        assert_eq!(parse_answer_action("answer.ukjent.good"), None);
        assert_eq!(parse_answer_action("settings.save"), None);
    }

    #[test]
    fn open_survey_has_buttons_for_every_question() {
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        let message = survey_message(&team, &ask(false), 3);

        let action_blocks =
            message.blocks.iter().filter(|block| matches!(block, Block::Actions { .. })).count();
        let json = serde_json::to_value(&message).expect("serialize");
        let last = json["blocks"].as_array().and_then(|blocks| blocks.last()).cloned();

        assert_eq!(action_blocks, QUESTIONS.len());
        assert_eq!(
            last.map(|block| block["elements"][0]["text"].clone()),
            Some(Value::String("3 har svart så langt.".to_owned()))
        );
    }

    #[test]
    fn revealed_survey_drops_buttons() {
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        let message = survey_message(&team, &ask(true), 5);

        assert!(!message.blocks.iter().any(|block| matches!(block, Block::Actions { .. })));
    }

    #[test]
    fn reveal_message_lists_question_averages() {
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        let answers = vec![
            Answer {
                ask_id: AskId(1),
                user_id: "U1".to_owned(),
                question_id: QUESTIONS[0].id.to_owned(),
                level: AnswerLevel::Good,
            },
            Answer {
                ask_id: AskId(1),
                user_id: "U2".to_owned(),
                question_id: QUESTIONS[0].id.to_owned(),
                level: AnswerLevel::Bad,
            },
        ];

        let message = reveal_message(&team, &score_answers(&answers));
        let json = serde_json::to_string(&message).expect("serialize");

        assert!(json.contains(QUESTIONS[0].text));
        assert!(json.contains("2.0 (2 svar)"));
    }

    #[test]
    fn reveal_message_handles_rounds_without_answers() {
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        let message = reveal_message(&team, &score_answers(&[]));

        assert_eq!(message.fallback_text, "Ingen svar for Plattform denne gangen");
    }
}
