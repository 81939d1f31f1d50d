use anyhow::Result;
use chrono::NaiveDate;
use inquire::{CustomType, Select, Text};
use uuid::Uuid;

use analyst_core::{NewAnalyst, Tier, DEFAULT_SENTIMENT_SCORE};

/// Prompts the user for a new analyst
pub fn prompt_new_analyst() -> Result<NewAnalyst> {
    let name = Text::new("Name:").with_placeholder("John Smith").prompt()?;
    let firm = Text::new("Firm:").with_placeholder("Gartner").prompt()?;

    let tier = Select::new("Tier:", Tier::all()).prompt()?;

    let mut new = NewAnalyst::new(name, firm).with_tier(tier);

    let contacted = inquire::Confirm::new("Have you been in contact already?")
        .with_default(false)
        .prompt()?;
    if contacted {
        let date = CustomType::<NaiveDate>::new("Last contact:")
            .with_help_message("YYYY-MM-DD")
            .with_error_message("Please enter a date as YYYY-MM-DD")
            .prompt()?;
        new = new.with_last_contact(date);
    }

    let sentiment = CustomType::<i32>::new("Sentiment (1-10):")
        .with_default(DEFAULT_SENTIMENT_SCORE)
        .with_error_message("Please enter a whole number")
        .prompt()?;

    Ok(new.with_sentiment(sentiment))
}

/// Prompts the user to pick one analyst among several with the same name
pub fn prompt_select_analyst(candidates: Vec<(Uuid, String)>) -> Result<Uuid> {
    let options: Vec<String> = candidates.iter().map(|(_, label)| label.clone()).collect();

    let selection = Select::new("Several analysts match, select one:", options.clone()).prompt()?;

    let index = options
        .iter()
        .position(|o| o == &selection)
        .ok_or_else(|| anyhow::anyhow!("Selection not found"))?;
    Ok(candidates[index].0)
}

/// Prompts for interaction notes when not given on the command line
pub fn prompt_notes() -> Result<String> {
    Ok(inquire::Editor::new("Notes:").prompt()?)
}

/// Prompts for a report title when not given on the command line
pub fn prompt_report_title() -> Result<String> {
    Ok(Text::new("Report title:").prompt()?)
}
