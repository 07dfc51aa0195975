// Transport-facing vocabulary: incoming events, outgoing replies, keyboards
// Buttons carry the Event they emit, so no payload strings are parsed

use serde::{Deserialize, Serialize};

use crate::types::{MAX_WELL_BEING, MIN_WELL_BEING};

/// Slash commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Greeting with the main menu
    Start,
    /// Begin logging a meal
    Add,
    /// Abort whatever is in progress
    Cancel,
}

/// Buttons of the meal-logging flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowAction {
    Start,
    Continue,
    Finish,
    Cancel,
    Confirm,
    Back,
    Condition,
}

/// Yes/no questions of the symptom questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symptom {
    Bloating,
    Diarrhea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolAnswer {
    Yes,
    No,
    Cancel,
}

/// One thing the user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    Text(String),
    Action(FlowAction),
    /// Answer to a yes/no question, tagged with the question it was shown for
    Answer { question: Symptom, value: BoolAnswer },
    /// Well-being score button
    Score(u8),
    /// Photo bytes already downloaded by the transport
    Photo(Vec<u8>),
    /// The transport could not fetch a photo the user sent
    PhotoDownloadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Regular chat message
    Message,
    /// Modal popup attached to a rejected button press
    Alert,
    /// Short toast attached to a button press
    Notice,
}

/// Something to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn message(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply {
            kind: ReplyKind::Message,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Message,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Alert,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Notice,
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Inline keyboards shown under bot messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    Start,
    AddingFoods,
    ConfirmFinish,
    Condition(Symptom),
    WellBeing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub event: Event,
}

impl Button {
    fn new(label: impl Into<String>, event: Event) -> Self {
        Button {
            label: label.into(),
            event,
        }
    }
}

impl Keyboard {
    /// Buttons in display order
    pub fn buttons(&self) -> Vec<Button> {
        match self {
            Keyboard::Start => vec![
                Button::new("Добавить еду", Event::Action(FlowAction::Start)),
                Button::new("Самочувствие", Event::Action(FlowAction::Condition)),
            ],
            Keyboard::AddingFoods => vec![
                Button::new("Продолжить ввод", Event::Action(FlowAction::Continue)),
                Button::new("Завершить", Event::Action(FlowAction::Finish)),
                Button::new("Отменить", Event::Action(FlowAction::Cancel)),
            ],
            Keyboard::ConfirmFinish => vec![
                Button::new("Сохранить и продолжить", Event::Action(FlowAction::Confirm)),
                Button::new("Вернуться к вводу", Event::Action(FlowAction::Back)),
                Button::new("Отменить", Event::Action(FlowAction::Cancel)),
            ],
            Keyboard::Condition(question) => [
                ("Да", BoolAnswer::Yes),
                ("Нет", BoolAnswer::No),
                ("Отменить", BoolAnswer::Cancel),
            ]
            .into_iter()
            .map(|(label, value)| {
                Button::new(
                    label,
                    Event::Answer {
                        question: *question,
                        value,
                    },
                )
            })
            .collect(),
            Keyboard::WellBeing => (MIN_WELL_BEING..=MAX_WELL_BEING)
                .map(|score| Button::new(score.to_string(), Event::Score(score)))
                .chain(std::iter::once(Button::new(
                    "Отменить",
                    Event::Action(FlowAction::Cancel),
                )))
                .collect(),
        }
    }

    /// How many buttons go on each row
    pub fn row_width(&self) -> usize {
        match self {
            Keyboard::Condition(_) => 2,
            Keyboard::WellBeing => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_keyboard_tags_question() {
        let buttons = Keyboard::Condition(Symptom::Diarrhea).buttons();
        assert_eq!(buttons.len(), 3);
        assert!(buttons.iter().all(|b| matches!(
            b.event,
            Event::Answer {
                question: Symptom::Diarrhea,
                ..
            }
        )));
    }

    #[test]
    fn test_well_being_keyboard_scores_and_cancel() {
        let buttons = Keyboard::WellBeing.buttons();
        assert_eq!(buttons.len(), 11);
        assert_eq!(buttons[0].event, Event::Score(1));
        assert_eq!(buttons[9].event, Event::Score(10));
        assert_eq!(buttons[10].event, Event::Action(FlowAction::Cancel));
    }
}
