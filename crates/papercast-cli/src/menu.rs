//! The interactive input menu.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use owo_colors::OwoColorize;
use papercast_core::PipelineRequest;

use crate::output::ColorMode;

pub enum MenuOutcome {
    Exit,
    Run(PipelineRequest),
}

/// Split a comma-separated answer, trimming entries and dropping empty ones.
pub fn parse_list(answer: &str) -> Vec<String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<Option<String>> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Show the menu and collect one request. End of input counts as exit.
pub fn run_menu<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    color: ColorMode,
) -> io::Result<MenuOutcome> {
    let title = "=== RESEARCH PAPER PODCAST SYSTEM ===";
    if color.enabled() {
        writeln!(out, "{}", title.bold().cyan())?;
    } else {
        writeln!(out, "{}", title)?;
    }
    writeln!(out, "Select input method(s):")?;
    writeln!(out, "1. Upload multiple PDFs")?;
    writeln!(out, "2. Enter multiple DOIs")?;
    writeln!(out, "3. Enter paper URLs")?;
    writeln!(out, "4. Exit")?;
    writeln!(out)?;

    let Some(choice) = ask(input, out, "Enter your choice(s) separated by commas (e.g., 1,2): ")? else {
        return Ok(MenuOutcome::Exit);
    };
    let choices = parse_list(&choice);
    if choices.iter().any(|c| c == "4") {
        writeln!(out, "Exiting...")?;
        return Ok(MenuOutcome::Exit);
    }

    let mut request = PipelineRequest::default();
    let Some(topics) = ask(
        input,
        out,
        "(Optional) Enter topics for classification, separated by commas (or leave blank): ",
    )?
    else {
        return Ok(MenuOutcome::Exit);
    };
    request.topic_list = parse_list(&topics);

    let prompts = [
        ("1", "Enter PDF file paths separated by commas: "),
        ("2", "Enter DOIs separated by commas: "),
        ("3", "Enter paper URLs separated by commas: "),
    ];
    for (key, prompt) in prompts {
        if !choices.iter().any(|c| c == key) {
            continue;
        }
        let Some(answer) = ask(input, out, prompt)? else {
            return Ok(MenuOutcome::Exit);
        };
        let entries = parse_list(&answer);
        match key {
            "1" => request.pdf_files = entries.into_iter().map(PathBuf::from).collect(),
            "2" => request.doi_list = entries,
            _ => request.urls = entries,
        }
    }

    Ok(MenuOutcome::Run(request))
}
