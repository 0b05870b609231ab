//! End-to-end conversations through the adapter, state and dialog layers.

use crate::adapter::TurnAdapter;
use crate::bot::Bot;
use crate::error::{TurnError, dialog_failure};
use crate::testing::TestFlow;
use async_trait::async_trait;
use colloquy_core::{Result, TurnContext};
use colloquy_dialog::{
    DIALOG_STATE_PROPERTY, DateTimePrompt, DateTimeResolution, DialogError, DialogSet,
    PromptOptions, Recognizer, RecognizerError, Validation,
};
use colloquy_state::{BotState, MemoryStorage};
use std::sync::Arc;

/// Resolves a fixed phrasebook the way a full date grammar would.
struct Phrasebook;

#[async_trait]
impl Recognizer for Phrasebook {
    type Candidate = DateTimeResolution;

    fn name(&self) -> &str {
        "phrasebook"
    }

    async fn recognize(
        &self,
        text: &str,
        _locale: &str,
    ) -> Result<Vec<DateTimeResolution>, RecognizerError> {
        Ok(match text {
            "5th December 2018 at 9am" => vec![DateTimeResolution::new(
                "2018-12-05T09",
                "2018-12-05 09:00:00",
            )],
            "Wednesday 4 oclock" => vec![
                DateTimeResolution::new("XXXX-WXX-3T04", "04:00:00"),
                DateTimeResolution::new("XXXX-WXX-3T16", "16:00:00"),
                DateTimeResolution::new("XXXX-WXX-3T04", "04:00:00"),
            ],
            _ => Vec::new(),
        })
    }
}

enum Reply {
    First,
    AllTimexes,
}

/// Prompts for a date whenever nothing is active, and echoes the result.
struct DateBot {
    dialogs: DialogSet,
    reply: Reply,
}

impl DateBot {
    fn new(state: &BotState, prompt: DateTimePrompt<Phrasebook>, reply: Reply) -> Self {
        let mut dialogs = DialogSet::with_state(state.property_accessor(DIALOG_STATE_PROPERTY));
        dialogs.add(prompt).unwrap();
        Self { dialogs, reply }
    }

    async fn run(&self, turn: &mut TurnContext) -> Result<(), DialogError> {
        let mut dc = self.dialogs.create_context(turn).await?;
        let result = dc.continue_dialog().await?;
        if !dc.turn().responded() && !result.is_waiting() && !result.has_result() {
            dc.prompt("when", PromptOptions::new("What date would you like?"))
                .await?;
        } else if !result.is_waiting() && result.has_result() {
            let resolutions: Vec<DateTimeResolution> = result.result_as()?.unwrap_or_default();
            let text = match self.reply {
                Reply::First => resolutions
                    .first()
                    .map(|r| format!("Timex:'{}' Value:'{}'", r.timex, r.value))
                    .unwrap_or_default(),
                Reply::AllTimexes => {
                    let mut timexes: Vec<&str> = Vec::new();
                    for resolution in &resolutions {
                        if !timexes.contains(&resolution.timex.as_str()) {
                            timexes.push(&resolution.timex);
                        }
                    }
                    timexes.join(" ")
                }
            };
            dc.turn_mut().send_text(text);
        }
        dc.persist().await
    }
}

#[async_trait]
impl Bot for DateBot {
    async fn on_turn(&self, turn: &mut TurnContext) -> Result<(), TurnError> {
        let conversation = turn.conversation().clone();
        self.run(turn)
            .await
            .map_err(|report| dialog_failure(report, &conversation))
    }
}

fn flow(prompt: DateTimePrompt<Phrasebook>, reply: Reply) -> TestFlow {
    let state = BotState::conversation(Arc::new(MemoryStorage::new()));
    let adapter = TurnAdapter::default().use_state(state.clone());
    TestFlow::new(adapter, DateBot::new(&state, prompt, reply)).with_locale("en-us")
}

#[tokio::test]
async fn date_and_hour_resolve_to_hour_precision() {
    let mut flow = flow(DateTimePrompt::new("when", Phrasebook), Reply::First);

    flow.send("hello")
        .await
        .unwrap()
        .assert_reply("What date would you like?");
    flow.send("5th December 2018 at 9am")
        .await
        .unwrap()
        .assert_reply("Timex:'2018-12-05T09' Value:'2018-12-05 09:00:00'")
        .assert_no_reply();
}

#[tokio::test]
async fn ambiguous_time_keeps_every_reading() {
    let mut flow = flow(DateTimePrompt::new("when", Phrasebook), Reply::AllTimexes);

    flow.send("hello")
        .await
        .unwrap()
        .assert_reply("What date would you like?");
    flow.send("Wednesday 4 oclock")
        .await
        .unwrap()
        .assert_reply("XXXX-WXX-3T04 XXXX-WXX-3T16");
}

#[tokio::test]
async fn validator_can_truncate_to_the_date() {
    let prompt = DateTimePrompt::new("when", Phrasebook).with_validator(|context| {
        let Some(first) = context.recognized.candidates().first() else {
            return Validation::Reject;
        };
        let timex = first.timex.split('T').next().unwrap_or_default();
        let value = first.value.split(' ').next().unwrap_or_default();
        Validation::Accept(vec![DateTimeResolution::new(timex, value)])
    });
    let mut flow = flow(prompt, Reply::First);

    flow.send("hello")
        .await
        .unwrap()
        .assert_reply("What date would you like?");
    flow.send("5th December 2018 at 9am")
        .await
        .unwrap()
        .assert_reply("Timex:'2018-12-05' Value:'2018-12-05'");
}

#[tokio::test]
async fn unrecognized_answer_asks_again() {
    let mut flow = flow(DateTimePrompt::new("when", Phrasebook), Reply::First);

    flow.send("hello")
        .await
        .unwrap()
        .assert_reply("What date would you like?");
    flow.send("whenever")
        .await
        .unwrap()
        .assert_reply("What date would you like?");
    flow.send("5th December 2018 at 9am")
        .await
        .unwrap()
        .assert_reply("Timex:'2018-12-05T09' Value:'2018-12-05 09:00:00'");
}
