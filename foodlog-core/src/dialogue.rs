// Meal-logging dialogue
// `step` is a pure reducer over (session bag, event); `DialogueEngine` adds I/O around it

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use color_eyre::Result;
use tracing::{debug, error, warn};

use crate::clock::SHORT_ID_LEN;
use crate::context::AppContext;
use crate::event::{BoolAnswer, Command, Event, FlowAction, Keyboard, Reply, Symptom};
use crate::normalize::extract_lines;
use crate::services::ConditionNotSaved;
use crate::session::{SessionBag, SessionLocks, CONDITION_KEY, DRAFT_KEY};
use crate::types::{
    Condition, ConditionDraft, DialogueState, FoodEventDraft, SessionKey, MAX_WELL_BEING,
    MIN_WELL_BEING,
};

/// Items echoed back after each batch of ingredient lines
const PREVIEW_LEN: usize = 5;

pub mod text {
    pub const GREETING: &str =
        "Привет! Я помогу зафиксировать приём пищи. Нажмите “Добавить еду”, чтобы начать.";
    pub const START_PROMPT: &str = "Введите ингредиенты, каждый с новой строки. \
        После этого используйте кнопки ниже, чтобы завершить или продолжить.";
    pub const NO_FOODS_IN_TEXT: &str = "Не нашёл текста с ингредиентами. Напишите список строками.";
    pub const KEEP_TYPING: &str = "Продолжайте вводить ингредиенты.";
    pub const FINISH_WITHOUT_FOODS: &str = "Сначала добавьте ингредиенты.";
    pub const CONFIRM_WITHOUT_FOODS: &str = "Добавьте хотя бы один ингредиент.";
    pub const REVIEW_LIST: &str =
        "Проверьте список ингредиентов. Готовы перейти к оценке состояния?";
    pub const BACK_TO_ADDING: &str = "Введите дополнительные ингредиенты или завершите ввод.";
    pub const FLOW_CANCELLED: &str =
        "Запись отменена. Нажмите «Добавить еду», чтобы начать заново.";
    pub const ASK_BLOATING: &str = "Есть ли вздутие?";
    pub const ASK_DIARRHEA: &str = "Есть ли диарея?";
    pub const ASK_WELL_BEING: &str = "Оцените самочувствие от 1 (плохо) до 10 (отлично).";
    pub const OTHER_QUESTION: &str = "Сейчас задаю другой вопрос.";
    pub const CONDITION_CANCELLED: &str =
        "Фиксация отменена. Ничего не сохранено. Нажмите «Добавить еду», чтобы начать заново.";
    pub const ANSWER_ALL: &str = "Пожалуйста, ответьте на все вопросы.";
    pub const SCORE_OUT_OF_RANGE: &str = "Оценка должна быть от 1 до 10.";
    pub const NOTHING_TO_CANCEL: &str = "Сейчас ничего не записывается.";
    pub const DIALOG_CANCELLED: &str = "Диалог отменён. Введите /add, чтобы начать заново.";
    pub const CONDITION_PLACEHOLDER: &str = "Отдельная запись самочувствия скоро появится. \
        Пока что ответьте на вопросы после добавления еды.";
    pub const IDLE_TEXT: &str =
        "Чтобы записать приём пищи, нажмите «Добавить еду» или введите /add.";
    pub const USE_BUTTONS: &str = "Пожалуйста, воспользуйтесь кнопками под сообщением.";
    pub const STALE_BUTTON: &str = "Эта кнопка сейчас неактивна.";
    pub const ALREADY_SAVING: &str = "Запись уже сохраняется, подождите.";
    pub const SAVE_FAILED: &str =
        "Не удалось сохранить запись. Нажмите оценку ещё раз или отмените ввод.";
    pub const CONDITION_SAVE_FAILED: &str = "Еда сохранена, но самочувствие записать не удалось. \
        Нажмите оценку ещё раз, чтобы повторить.";
    pub const PHOTO_DOWNLOAD_FAILED: &str =
        "Не смог загрузить фото. Попробуйте отправить ещё раз или используйте /add.";
    pub const PHOTO_SERVICE_UNAVAILABLE: &str =
        "Сервис распознавания недоступен. Попробуйте позже или используйте /add.";
    pub const PHOTO_NOTHING_FOUND: &str =
        "Не удалось извлечь ингредиенты. Попробуйте другое фото или используйте /add.";
    pub const PHOTO_RECOGNIZED: &str = "Распознал ингредиенты. Проверьте список и продолжайте:";
}

/// Side effect requested by a transition, run by the engine after the bag is saved
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Persist {
        draft: FoodEventDraft,
        condition: Condition,
    },
}

/// Outcome of feeding one event to the state machine
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub bag: SessionBag,
    pub replies: Vec<Reply>,
    pub effect: Option<Effect>,
}

impl Transition {
    fn stay(bag: SessionBag, reply: Reply) -> Self {
        Transition {
            bag,
            replies: vec![reply],
            effect: None,
        }
    }

    fn to(mut bag: SessionBag, state: DialogueState, reply: Reply) -> Self {
        bag.state = state;
        Self::stay(bag, reply)
    }

    fn cleared(reply: Reply) -> Self {
        Self::stay(SessionBag::default(), reply)
    }
}

/// Advance the dialogue by one event.
///
/// Photos are resolved by the engine before stepping; see [`recognized_photo`].
pub fn step(bag: SessionBag, event: &Event, now: DateTime<FixedOffset>) -> Result<Transition> {
    use DialogueState::*;

    let state = bag.state;
    let transition = match (state, event) {
        (_, Event::Command(Command::Start)) => {
            Transition::stay(bag, Reply::message(text::GREETING, Keyboard::Start))
        }
        (_, Event::Command(Command::Add)) | (_, Event::Action(FlowAction::Start)) => {
            start_flow(now)?
        }
        (Idle, Event::Command(Command::Cancel)) => {
            Transition::stay(bag, Reply::plain(text::NOTHING_TO_CANCEL))
        }
        (_, Event::Command(Command::Cancel)) => {
            Transition::cleared(Reply::message(text::DIALOG_CANCELLED, Keyboard::Start))
        }
        (_, Event::Action(FlowAction::Condition)) => {
            Transition::stay(bag, Reply::message(text::CONDITION_PLACEHOLDER, Keyboard::Start))
        }

        (AddingFoods, Event::Text(input)) => add_foods(bag, input, now)?,
        (Idle, Event::Text(_)) => {
            Transition::stay(bag, Reply::message(text::IDLE_TEXT, Keyboard::Start))
        }
        (_, Event::Text(_)) => Transition::stay(bag, Reply::plain(text::USE_BUTTONS)),

        (AddingFoods, Event::Action(FlowAction::Continue)) => {
            Transition::stay(bag, Reply::notice(text::KEEP_TYPING))
        }
        (AddingFoods, Event::Action(FlowAction::Finish)) => finish_adding(bag, now)?,
        (ConfirmFinish, Event::Action(FlowAction::Back)) => Transition::to(
            bag,
            AddingFoods,
            Reply::message(text::BACK_TO_ADDING, Keyboard::AddingFoods),
        ),
        (ConfirmFinish, Event::Action(FlowAction::Confirm)) => confirm_finish(bag, now)?,
        (AddingFoods | ConfirmFinish, Event::Action(FlowAction::Cancel)) => {
            Transition::cleared(Reply::message(text::FLOW_CANCELLED, Keyboard::Start))
        }
        (
            AskConditionBloating | AskConditionDiarrhea | AskConditionWellBeing,
            Event::Action(FlowAction::Cancel),
        ) => Transition::cleared(Reply::message(text::CONDITION_CANCELLED, Keyboard::Start)),
        (Persisting, Event::Action(FlowAction::Cancel)) => {
            Transition::cleared(Reply::message(text::DIALOG_CANCELLED, Keyboard::Start))
        }

        (
            AskConditionBloating | AskConditionDiarrhea | AskConditionWellBeing,
            Event::Answer { question, value },
        ) => answer_question(bag, *question, *value)?,

        (AskConditionWellBeing, Event::Score(score)) => score_well_being(bag, *score, now)?,

        (_, Event::PhotoDownloadFailed) => {
            Transition::stay(bag, Reply::plain(text::PHOTO_DOWNLOAD_FAILED))
        }
        (_, Event::Photo(_)) => {
            Transition::stay(bag, Reply::plain(text::PHOTO_SERVICE_UNAVAILABLE))
        }

        (Persisting, _) => Transition::stay(bag, Reply::notice(text::ALREADY_SAVING)),
        (_, Event::Action(_) | Event::Answer { .. } | Event::Score(_)) => {
            Transition::stay(bag, Reply::notice(text::STALE_BUTTON))
        }
    };

    debug!(from = ?state, to = ?transition.bag.state, "dialogue step");
    Ok(transition)
}

/// Fresh session holding ingredients read from a photo
pub fn recognized_photo(ingredients: &[String], now: DateTime<FixedOffset>) -> Result<Transition> {
    let mut draft = FoodEventDraft::new(now);
    draft.append_foods(ingredients.iter().cloned());

    let mut bag = SessionBag::default();
    bag.put(DRAFT_KEY, &draft)?;

    let reply = Reply::message(
        format!("{}\n{}", text::PHOTO_RECOGNIZED, bullet_list(ingredients)),
        Keyboard::AddingFoods,
    );
    Ok(Transition::to(bag, DialogueState::AddingFoods, reply))
}

fn start_flow(now: DateTime<FixedOffset>) -> Result<Transition> {
    let mut bag = SessionBag::default();
    bag.put(DRAFT_KEY, &FoodEventDraft::new(now))?;
    Ok(Transition::to(
        bag,
        DialogueState::AddingFoods,
        Reply::message(text::START_PROMPT, Keyboard::AddingFoods),
    ))
}

fn add_foods(mut bag: SessionBag, input: &str, now: DateTime<FixedOffset>) -> Result<Transition> {
    let foods = extract_lines(input);
    if foods.is_empty() {
        return Ok(Transition::stay(
            bag,
            Reply::message(text::NO_FOODS_IN_TEXT, Keyboard::AddingFoods),
        ));
    }

    let mut draft = load_draft(&bag, now)?;
    let added = foods.len();
    draft.append_foods(foods);
    bag.put(DRAFT_KEY, &draft)?;

    let tail = &draft.foods_raw[draft.foods_raw.len().saturating_sub(PREVIEW_LEN)..];
    let reply = Reply::message(
        format!(
            "Добавил {} позиций. Всего: {}.\n{}",
            added,
            draft.foods_raw.len(),
            bullet_list(tail)
        ),
        Keyboard::AddingFoods,
    );
    Ok(Transition::stay(bag, reply))
}

fn finish_adding(bag: SessionBag, now: DateTime<FixedOffset>) -> Result<Transition> {
    let draft = load_draft(&bag, now)?;
    if draft.is_empty() {
        return Ok(Transition::stay(bag, Reply::alert(text::FINISH_WITHOUT_FOODS)));
    }

    let reply = Reply::message(
        format!("{}\n{}", text::REVIEW_LIST, bullet_list(&draft.foods_raw)),
        Keyboard::ConfirmFinish,
    );
    Ok(Transition::to(bag, DialogueState::ConfirmFinish, reply))
}

fn confirm_finish(mut bag: SessionBag, now: DateTime<FixedOffset>) -> Result<Transition> {
    if load_draft(&bag, now)?.is_empty() {
        return Ok(Transition::stay(bag, Reply::alert(text::CONFIRM_WITHOUT_FOODS)));
    }

    bag.put(CONDITION_KEY, &ConditionDraft::default())?;
    Ok(Transition::to(
        bag,
        DialogueState::AskConditionBloating,
        Reply::message(text::ASK_BLOATING, Keyboard::Condition(Symptom::Bloating)),
    ))
}

fn answer_question(
    mut bag: SessionBag,
    question: Symptom,
    value: BoolAnswer,
) -> Result<Transition> {
    let asked = match bag.state {
        DialogueState::AskConditionBloating => Some(Symptom::Bloating),
        DialogueState::AskConditionDiarrhea => Some(Symptom::Diarrhea),
        _ => None,
    };
    if asked != Some(question) {
        return Ok(Transition::stay(bag, Reply::alert(text::OTHER_QUESTION)));
    }

    let answer = match value {
        BoolAnswer::Cancel => {
            return Ok(Transition::cleared(Reply::message(
                text::CONDITION_CANCELLED,
                Keyboard::Start,
            )))
        }
        BoolAnswer::Yes => true,
        BoolAnswer::No => false,
    };

    let mut condition = load_condition(&bag)?;
    let (next, reply) = match question {
        Symptom::Bloating => {
            condition.bloating = Some(answer);
            (
                DialogueState::AskConditionDiarrhea,
                Reply::message(text::ASK_DIARRHEA, Keyboard::Condition(Symptom::Diarrhea)),
            )
        }
        Symptom::Diarrhea => {
            condition.diarrhea = Some(answer);
            (
                DialogueState::AskConditionWellBeing,
                Reply::message(text::ASK_WELL_BEING, Keyboard::WellBeing),
            )
        }
    };
    bag.put(CONDITION_KEY, &condition)?;
    Ok(Transition::to(bag, next, reply))
}

fn score_well_being(
    mut bag: SessionBag,
    score: u8,
    now: DateTime<FixedOffset>,
) -> Result<Transition> {
    if !(MIN_WELL_BEING..=MAX_WELL_BEING).contains(&score) {
        return Ok(Transition::stay(bag, Reply::alert(text::SCORE_OUT_OF_RANGE)));
    }

    let mut condition = load_condition(&bag)?;
    condition.well_being = Some(score);
    let Ok(finalized) = Condition::try_from(&condition) else {
        return Ok(Transition::stay(bag, Reply::alert(text::ANSWER_ALL)));
    };

    let draft = load_draft(&bag, now)?;
    if draft.is_empty() {
        return Ok(Transition::stay(bag, Reply::alert(text::CONFIRM_WITHOUT_FOODS)));
    }

    bag.put(CONDITION_KEY, &condition)?;
    bag.state = DialogueState::Persisting;
    Ok(Transition {
        bag,
        replies: Vec::new(),
        effect: Some(Effect::Persist {
            draft,
            condition: finalized,
        }),
    })
}

/// Stored draft, or an empty one started now when the bag has none
fn load_draft(bag: &SessionBag, now: DateTime<FixedOffset>) -> Result<FoodEventDraft> {
    Ok(bag
        .get::<FoodEventDraft>(DRAFT_KEY)?
        .unwrap_or_else(|| FoodEventDraft::new(now)))
}

fn load_condition(bag: &SessionBag) -> Result<ConditionDraft> {
    Ok(bag.get::<ConditionDraft>(CONDITION_KEY)?.unwrap_or_default())
}

fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn saved_message(foods: usize) -> Reply {
    Reply::message(
        format!(
            "Записал событие. Продукты сохранены в FoodLog и симптомы — в ConditionLog.\n\
             Всего ингредиентов: {}.",
            foods
        ),
        Keyboard::Start,
    )
}

/// Runs the state machine against the session store and the note services
pub struct DialogueEngine {
    ctx: Arc<AppContext>,
    locks: SessionLocks,
}

impl DialogueEngine {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        DialogueEngine {
            ctx,
            locks: SessionLocks::new(),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Handle one event for one session and return what to show the user
    pub async fn handle(&self, key: SessionKey, event: Event) -> Result<Vec<Reply>> {
        if let Event::Photo(ref image) = event {
            return self.handle_photo(key, image).await;
        }

        let _guard = self.locks.acquire(key).await;
        let bag = self.ctx.sessions.get(key).await?;
        let before = bag.clone();

        let Transition {
            mut bag,
            mut replies,
            effect,
        } = step(bag, &event, self.ctx.clock.now())?;

        let effect = match effect {
            Some(Effect::Persist { draft, condition }) => {
                let draft = self.stamp_log_id(&mut bag, draft)?;
                Some(Effect::Persist { draft, condition })
            }
            None => None,
        };

        if bag != before {
            self.save(key, &bag).await?;
        }

        if let Some(Effect::Persist { draft, condition }) = effect {
            replies.push(self.persist(key, bag, &draft, &condition).await?);
        }

        Ok(replies)
    }

    /// Give the draft its food-log token once; retries reuse it
    fn stamp_log_id(
        &self,
        bag: &mut SessionBag,
        mut draft: FoodEventDraft,
    ) -> Result<FoodEventDraft> {
        if draft.log_id.is_none() {
            draft.log_id = Some(self.ctx.clock.short_id(SHORT_ID_LEN));
            bag.put(DRAFT_KEY, &draft)?;
        }
        Ok(draft)
    }

    async fn persist(
        &self,
        key: SessionKey,
        mut bag: SessionBag,
        draft: &FoodEventDraft,
        condition: &Condition,
    ) -> Result<Reply> {
        match self.ctx.food_events.persist_event(draft, condition) {
            Ok(result) => {
                self.ctx.sessions.clear(key).await?;
                Ok(saved_message(result.foods.len()))
            }
            Err(e) => {
                error!(session = %key, error = ?e, "failed to persist food event");
                // Keep the answers so pressing a score again retries the save
                bag.state = DialogueState::AskConditionWellBeing;
                self.save(key, &bag).await?;
                let message = if e.downcast_ref::<ConditionNotSaved>().is_some() {
                    text::CONDITION_SAVE_FAILED
                } else {
                    text::SAVE_FAILED
                };
                Ok(Reply::message(message, Keyboard::WellBeing))
            }
        }
    }

    async fn handle_photo(&self, key: SessionKey, image: &[u8]) -> Result<Vec<Reply>> {
        // Recognition runs outside the session lock; it never reads the bag
        let extracted = tokio::time::timeout(
            self.ctx.photo_timeout,
            self.ctx.photo_intake.extract_ingredients(image),
        )
        .await;

        let ingredients = match extracted {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                warn!(session = %key, error = %e, "photo recognition failed");
                return Ok(vec![Reply::plain(text::PHOTO_SERVICE_UNAVAILABLE)]);
            }
            Err(_) => {
                warn!(
                    session = %key,
                    timeout = ?self.ctx.photo_timeout,
                    "photo recognition timed out"
                );
                return Ok(vec![Reply::plain(text::PHOTO_SERVICE_UNAVAILABLE)]);
            }
        };

        let ingredients: Vec<String> = ingredients
            .iter()
            .flat_map(|item| extract_lines(item))
            .collect();
        if ingredients.is_empty() {
            return Ok(vec![Reply::plain(text::PHOTO_NOTHING_FOUND)]);
        }

        let _guard = self.locks.acquire(key).await;
        let transition = recognized_photo(&ingredients, self.ctx.clock.now())?;
        self.save(key, &transition.bag).await?;
        Ok(transition.replies)
    }

    /// Store the bag, or drop the key entirely once the dialogue is over
    async fn save(&self, key: SessionKey, bag: &SessionBag) -> Result<()> {
        if bag.is_idle() && bag.data.is_empty() {
            self.ctx.sessions.clear(key).await
        } else {
            self.ctx.sessions.set(key, bag).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ReplyKind;
    use chrono::TimeZone;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 12, 19, 30, 0)
            .unwrap()
    }

    fn run(bag: SessionBag, events: &[Event]) -> Transition {
        let mut transition = Transition {
            bag,
            replies: Vec::new(),
            effect: None,
        };
        for event in events {
            transition = step(transition.bag, event, now()).unwrap();
        }
        transition
    }

    fn draft_of(bag: &SessionBag) -> FoodEventDraft {
        bag.get(DRAFT_KEY).unwrap().unwrap()
    }

    fn adding(lines: &str) -> Transition {
        run(
            SessionBag::default(),
            &[Event::Command(Command::Add), Event::Text(lines.to_string())],
        )
    }

    #[test]
    fn test_start_creates_fresh_draft() {
        let t = run(SessionBag::default(), &[Event::Action(FlowAction::Start)]);
        assert_eq!(t.bag.state, DialogueState::AddingFoods);
        let draft = draft_of(&t.bag);
        assert_eq!(draft.started_at, now());
        assert!(draft.foods_raw.is_empty());
        assert_eq!(t.replies[0].keyboard, Some(Keyboard::AddingFoods));
    }

    #[test]
    fn test_start_discards_previous_session() {
        let t = adding("Паста");
        let t = run(t.bag, &[Event::Command(Command::Add)]);
        assert!(draft_of(&t.bag).foods_raw.is_empty());
        assert!(t.bag.get::<ConditionDraft>(CONDITION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_text_appends_and_previews_last_five() {
        let t = adding("1\n2\n3");
        let t = run(t.bag, &[Event::Text("4\n\n  5 \n6\n7".to_string())]);

        assert_eq!(draft_of(&t.bag).foods_raw, vec!["1", "2", "3", "4", "5", "6", "7"]);
        let reply = &t.replies[0].text;
        assert!(reply.starts_with("Добавил 4 позиций. Всего: 7."));
        assert!(reply.contains("• 3\n• 4\n• 5\n• 6\n• 7"));
        assert!(!reply.contains("• 2"));
    }

    #[test]
    fn test_blank_text_reprompts_without_mutation() {
        let t = adding("Паста");
        let before = t.bag.clone();
        let t = run(t.bag, &[Event::Text("  \n\n ".to_string())]);

        assert_eq!(t.bag, before);
        assert_eq!(t.replies, vec![Reply::message(text::NO_FOODS_IN_TEXT, Keyboard::AddingFoods)]);
    }

    #[test]
    fn test_continue_is_acknowledged() {
        let t = adding("Паста");
        let before = t.bag.clone();
        let t = run(t.bag, &[Event::Action(FlowAction::Continue)]);
        assert_eq!(t.bag, before);
        assert_eq!(t.replies, vec![Reply::notice(text::KEEP_TYPING)]);
    }

    #[test]
    fn test_finish_and_confirm_require_foods() {
        let t = run(
            SessionBag::default(),
            &[Event::Command(Command::Add), Event::Action(FlowAction::Finish)],
        );
        assert_eq!(t.bag.state, DialogueState::AddingFoods);
        assert_eq!(t.replies, vec![Reply::alert(text::FINISH_WITHOUT_FOODS)]);

        // A draft emptied behind our back is caught at confirmation too
        let mut bag = t.bag;
        bag.state = DialogueState::ConfirmFinish;
        let t = run(bag, &[Event::Action(FlowAction::Confirm)]);
        assert_eq!(t.bag.state, DialogueState::ConfirmFinish);
        assert_eq!(t.replies[0].kind, ReplyKind::Alert);
        assert!(t.effect.is_none());
    }

    #[test]
    fn test_finish_then_confirm_reaches_bloating() {
        let t = adding("Паста\nСыр");
        let t = run(t.bag, &[Event::Action(FlowAction::Finish)]);
        assert_eq!(t.bag.state, DialogueState::ConfirmFinish);
        assert!(t.replies[0].text.contains("• Паста\n• Сыр"));

        let t = run(t.bag, &[Event::Action(FlowAction::Confirm)]);
        assert_eq!(t.bag.state, DialogueState::AskConditionBloating);
        assert_eq!(
            t.bag.get::<ConditionDraft>(CONDITION_KEY).unwrap(),
            Some(ConditionDraft::default())
        );
        assert_eq!(t.replies[0].keyboard, Some(Keyboard::Condition(Symptom::Bloating)));
    }

    #[test]
    fn test_back_keeps_foods() {
        let t = adding("Паста");
        let t = run(
            t.bag,
            &[
                Event::Action(FlowAction::Finish),
                Event::Action(FlowAction::Back),
                Event::Text("Сыр".to_string()),
            ],
        );
        assert_eq!(t.bag.state, DialogueState::AddingFoods);
        assert_eq!(draft_of(&t.bag).foods_raw, vec!["Паста", "Сыр"]);
    }

    #[test]
    fn test_cancel_from_every_active_state_clears() {
        let prefixes: Vec<Vec<Event>> = vec![
            vec![],
            vec![Event::Action(FlowAction::Finish)],
            vec![Event::Action(FlowAction::Finish), Event::Action(FlowAction::Confirm)],
            vec![
                Event::Action(FlowAction::Finish),
                Event::Action(FlowAction::Confirm),
                Event::Answer {
                    question: Symptom::Bloating,
                    value: BoolAnswer::No,
                },
            ],
            vec![
                Event::Action(FlowAction::Finish),
                Event::Action(FlowAction::Confirm),
                Event::Answer {
                    question: Symptom::Bloating,
                    value: BoolAnswer::No,
                },
                Event::Answer {
                    question: Symptom::Diarrhea,
                    value: BoolAnswer::No,
                },
            ],
        ];

        for prefix in prefixes {
            let t = run(adding("Паста").bag, &prefix);
            assert!(!t.bag.is_idle());
            let t = run(t.bag, &[Event::Action(FlowAction::Cancel)]);
            assert_eq!(t.bag, SessionBag::default());
            assert!(t.effect.is_none());
            assert_eq!(t.replies[0].keyboard, Some(Keyboard::Start));
        }
    }

    #[test]
    fn test_answer_cancel_clears_with_notice() {
        let t = adding("Паста");
        let t = run(
            t.bag,
            &[
                Event::Action(FlowAction::Finish),
                Event::Action(FlowAction::Confirm),
                Event::Answer {
                    question: Symptom::Bloating,
                    value: BoolAnswer::Cancel,
                },
            ],
        );
        assert_eq!(t.bag, SessionBag::default());
        assert_eq!(t.replies[0].text, text::CONDITION_CANCELLED);
    }

    #[test]
    fn test_mismatched_question_is_rejected() {
        let t = adding("Паста");
        let t = run(
            t.bag,
            &[Event::Action(FlowAction::Finish), Event::Action(FlowAction::Confirm)],
        );
        let before = t.bag.clone();

        let t = run(
            t.bag,
            &[Event::Answer {
                question: Symptom::Diarrhea,
                value: BoolAnswer::Yes,
            }],
        );
        assert_eq!(t.bag, before);
        assert_eq!(t.replies, vec![Reply::alert(text::OTHER_QUESTION)]);
    }

    #[test]
    fn test_full_questionnaire_requests_persist() {
        let t = adding("Паста\nСыр");
        let t = run(
            t.bag,
            &[
                Event::Action(FlowAction::Finish),
                Event::Action(FlowAction::Confirm),
                Event::Answer {
                    question: Symptom::Bloating,
                    value: BoolAnswer::Yes,
                },
                Event::Answer {
                    question: Symptom::Diarrhea,
                    value: BoolAnswer::No,
                },
                Event::Score(6),
            ],
        );

        assert_eq!(t.bag.state, DialogueState::Persisting);
        assert!(t.replies.is_empty());
        match t.effect {
            Some(Effect::Persist { draft, condition }) => {
                assert_eq!(draft.foods_raw, vec!["Паста", "Сыр"]);
                assert_eq!(condition, Condition::new(true, false, 6).unwrap());
            }
            None => panic!("expected a persist effect"),
        }
    }

    #[test]
    fn test_score_out_of_range_or_incomplete() {
        let mut bag = adding("Паста").bag;
        bag.state = DialogueState::AskConditionWellBeing;
        bag.put(CONDITION_KEY, &ConditionDraft::default()).unwrap();

        let t = run(bag.clone(), &[Event::Score(11)]);
        assert_eq!(t.replies, vec![Reply::alert(text::SCORE_OUT_OF_RANGE)]);
        assert_eq!(t.bag, bag);

        let t = run(bag.clone(), &[Event::Score(5)]);
        assert_eq!(t.replies, vec![Reply::alert(text::ANSWER_ALL)]);
        assert_eq!(t.bag, bag);
        assert!(t.effect.is_none());
    }

    #[test]
    fn test_stale_buttons_get_one_notice() {
        let cases = [
            (SessionBag::default(), Event::Action(FlowAction::Finish)),
            (SessionBag::default(), Event::Score(3)),
            (adding("Паста").bag, Event::Action(FlowAction::Confirm)),
            (
                adding("Паста").bag,
                Event::Answer {
                    question: Symptom::Bloating,
                    value: BoolAnswer::Yes,
                },
            ),
        ];

        for (bag, event) in cases {
            let before = bag.clone();
            let t = run(bag, &[event]);
            assert_eq!(t.bag, before);
            assert_eq!(t.replies, vec![Reply::notice(text::STALE_BUTTON)]);
        }
    }

    #[test]
    fn test_commands() {
        let t = run(SessionBag::default(), &[Event::Command(Command::Cancel)]);
        assert_eq!(t.replies, vec![Reply::plain(text::NOTHING_TO_CANCEL)]);

        let t = run(adding("Паста").bag, &[Event::Command(Command::Start)]);
        assert_eq!(t.bag.state, DialogueState::AddingFoods);
        assert_eq!(t.replies[0].text, text::GREETING);

        let t = run(t.bag, &[Event::Command(Command::Cancel)]);
        assert_eq!(t.bag, SessionBag::default());
        assert_eq!(t.replies[0].text, text::DIALOG_CANCELLED);
    }

    #[test]
    fn test_idle_text_hints_at_start() {
        let t = run(SessionBag::default(), &[Event::Text("Паста".to_string())]);
        assert!(t.bag.is_idle());
        assert_eq!(t.replies, vec![Reply::message(text::IDLE_TEXT, Keyboard::Start)]);
    }

    #[test]
    fn test_recognized_photo_starts_adding() {
        let t = recognized_photo(&["хлеб".to_string(), "масло".to_string()], now()).unwrap();
        assert_eq!(t.bag.state, DialogueState::AddingFoods);
        assert_eq!(draft_of(&t.bag).foods_raw, vec!["хлеб", "масло"]);
        assert!(t.replies[0].text.ends_with("• хлеб\n• масло"));
    }
}
