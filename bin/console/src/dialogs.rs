//! The table-booking conversation.

use colloquy_bot::DialogBot;
use colloquy_core::Result;
use colloquy_dialog::{
    ComponentDialog, DateTimePrompt, DateTimeResolution, DialogError, DialogSettings,
    IsoDateTimeRecognizer, NumberPrompt, NumberRecognizer, PromptOptions, StepOutcome, TextPrompt,
    TextRecognizer, Validation, WaterfallDialog,
};
use colloquy_state::BotState;
use serde_json::json;

pub const BOOKING: &str = "booking";
pub const WELCOME: &str = "Welcome! Say anything to book a table.";

const NAME_PROMPT: &str = "booking.name";
const DATE_PROMPT: &str = "booking.date";
const PARTY_PROMPT: &str = "booking.party";
const MAX_PARTY: f64 = 12.0;

/// Builds the booking bot.
///
/// # Errors
///
/// Returns an error if two dialogs share an id.
pub fn booking_bot(state: BotState, settings: DialogSettings) -> Result<DialogBot, DialogError> {
    let mut bot = DialogBot::new(state, BOOKING)
        .with_settings(settings)
        .with_welcome(WELCOME);
    bot.add_dialog(booking()?)?;
    Ok(bot)
}

fn booking() -> Result<ComponentDialog, DialogError> {
    let mut component = ComponentDialog::new(BOOKING);
    component.add_dialog(steps())?;
    component.add_dialog(TextPrompt::new(NAME_PROMPT, TextRecognizer))?;
    component.add_dialog(
        DateTimePrompt::new(DATE_PROMPT, IsoDateTimeRecognizer).with_validator(|context| {
            match context.recognized.candidates().first() {
                Some(first) => Validation::Accept(vec![first.clone()]),
                None => Validation::Reject,
            }
        }),
    )?;
    component.add_dialog(
        NumberPrompt::new(PARTY_PROMPT, NumberRecognizer).with_validator(|context| {
            match context.recognized.candidates().first() {
                Some(&size) if size.fract() == 0.0 && (1.0..=MAX_PARTY).contains(&size) => {
                    Validation::Accept(vec![size])
                }
                _ => Validation::Reject,
            }
        }),
    )?;
    Ok(component)
}

fn steps() -> WaterfallDialog {
    WaterfallDialog::new("booking.steps")
        .add_step(|dc, _step| {
            Box::pin(async move {
                let options = PromptOptions::new("What name is the booking under?");
                Ok(StepOutcome::Dialog(dc.prompt(NAME_PROMPT, options).await?))
            })
        })
        .add_step(|dc, mut step| {
            Box::pin(async move {
                let name: String = step.result_as()?.unwrap_or_default();
                step.set_value(dc, "name", &name)?;
                let options = PromptOptions::new(format!("Thanks {name}. Which date? (YYYY-MM-DD)"))
                    .with_retry_prompt("Please give the date as YYYY-MM-DD, optionally with a time.");
                Ok(StepOutcome::Dialog(dc.prompt(DATE_PROMPT, options).await?))
            })
        })
        .add_step(|dc, mut step| {
            Box::pin(async move {
                let date: Vec<DateTimeResolution> = step.result_as()?.unwrap_or_default();
                let when = date.first().map(|d| d.value.clone()).unwrap_or_default();
                step.set_value(dc, "when", &when)?;
                let options = PromptOptions::new("How many people?")
                    .with_retry_prompt("Please give a whole number between 1 and 12.");
                Ok(StepOutcome::Dialog(dc.prompt(PARTY_PROMPT, options).await?))
            })
        })
        .add_step(|dc, step| {
            Box::pin(async move {
                let size: f64 = step.result_as()?.unwrap_or_default();
                let name: String = step.value("name")?.unwrap_or_default();
                let when: String = step.value("when")?.unwrap_or_default();
                dc.turn_mut()
                    .send_text(format!("Booked a table for {size} under {name} on {when}."));
                Ok(StepOutcome::End(Some(json!({
                    "name": name,
                    "when": when,
                    "party_size": size,
                }))))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_bot::testing::TestFlow;
    use colloquy_bot::{AdapterSettings, TurnAdapter};
    use colloquy_state::MemoryStorage;
    use std::sync::Arc;

    fn flow() -> TestFlow {
        let state = BotState::conversation(Arc::new(MemoryStorage::new()));
        let adapter = TurnAdapter::new(AdapterSettings::default()).use_state(state.clone());
        TestFlow::new(adapter, booking_bot(state, DialogSettings::default()).unwrap())
    }

    #[tokio::test]
    async fn books_a_table() {
        let mut flow = flow();

        flow.join("user").await.unwrap().assert_reply(WELCOME);
        flow.send("hello")
            .await
            .unwrap()
            .assert_reply("What name is the booking under?");
        flow.send("Ada")
            .await
            .unwrap()
            .assert_reply("Thanks Ada. Which date? (YYYY-MM-DD)");
        flow.send("next week")
            .await
            .unwrap()
            .assert_reply("Please give the date as YYYY-MM-DD, optionally with a time.");
        flow.send("2018-12-05 19:30")
            .await
            .unwrap()
            .assert_reply("How many people?");
        flow.send("20")
            .await
            .unwrap()
            .assert_reply("Please give a whole number between 1 and 12.");
        flow.send("4")
            .await
            .unwrap()
            .assert_reply("Booked a table for 4 under Ada on 2018-12-05 19:30:00.")
            .assert_no_reply();
    }
}
