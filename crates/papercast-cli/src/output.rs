use std::io::Write;

use owo_colors::OwoColorize;
use papercast_core::{AudioFile, InputItem, PipelineResult, ProgressEvent};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn describe(item: &InputItem) -> String {
    let locator = item.locator();
    let short = if locator.chars().count() > 60 {
        format!("{}...", locator.chars().take(60).collect::<String>())
    } else {
        locator
    };
    format!("{} {}", item.kind(), short)
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::ItemStarted { index, total, item } => {
            writeln!(w, "[{}/{}] Processing {}", index + 1, total, describe(item))?;
        }
        ProgressEvent::ItemSkipped {
            index,
            total,
            item,
            reason,
        } => {
            if color.enabled() {
                writeln!(
                    w,
                    "[{}/{}] -> {} {} ({})",
                    index + 1,
                    total,
                    "SKIPPED".yellow(),
                    describe(item),
                    reason
                )?;
            } else {
                writeln!(
                    w,
                    "[{}/{}] -> SKIPPED {} ({})",
                    index + 1,
                    total,
                    describe(item),
                    reason
                )?;
            }
        }
        ProgressEvent::ItemCompleted {
            index,
            total,
            citation,
        } => {
            if color.enabled() {
                writeln!(
                    w,
                    "[{}/{}] -> {} {} [{}]",
                    index + 1,
                    total,
                    "DONE".green(),
                    citation.audio,
                    citation.topic.dimmed()
                )?;
            } else {
                writeln!(
                    w,
                    "[{}/{}] -> DONE {} [{}]",
                    index + 1,
                    total,
                    citation.audio,
                    citation.topic
                )?;
            }
        }
        ProgressEvent::Synthesizing { summaries } => {
            writeln!(w, "Synthesizing final summary from {} item(s)...", summaries)?;
        }
        ProgressEvent::Finished { .. } => {
            // The final report follows.
        }
    }
    Ok(())
}

/// Print the synthesis, its audio path and the citation list.
pub fn print_result(
    w: &mut dyn Write,
    result: &PipelineResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let heading = |w: &mut dyn Write, text: &str| -> std::io::Result<()> {
        if color.enabled() {
            writeln!(w, "{}", text.bold().cyan())
        } else {
            writeln!(w, "{}", text)
        }
    };

    writeln!(w)?;
    heading(w, "=== SUMMARY ===")?;
    writeln!(w)?;
    if result.synthesis.is_empty() {
        writeln!(w, "No synthesis available.")?;
    } else {
        writeln!(w, "{}", result.synthesis)?;
    }

    if let Some(ref audio) = result.synthesis_audio {
        writeln!(w)?;
        writeln!(w, "Audio file saved at: {}", audio)?;
    }

    writeln!(w)?;
    heading(w, "=== CITATIONS ===")?;
    writeln!(w)?;
    for citation in &result.citations {
        writeln!(w, "- Source: {}", citation.source)?;
        writeln!(w, "  Topic: {}", citation.topic)?;
        writeln!(w, "  Audio: {}", citation.audio)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Print the audio files in the output directory.
pub fn print_files(w: &mut dyn Write, files: &[AudioFile], color: ColorMode) -> std::io::Result<()> {
    if files.is_empty() {
        writeln!(w, "No audio files.")?;
        return Ok(());
    }
    for file in files {
        if color.enabled() {
            writeln!(w, "{:<40} {}", file.filename, format!("{:.2} MB", file.size_mb).dimmed())?;
        } else {
            writeln!(w, "{:<40} {:.2} MB", file.filename, file.size_mb)?;
        }
    }
    writeln!(w, "Total: {} file(s)", files.len())?;
    Ok(())
}
